mod common;

use common::{ImageBehavior, MockImage, MockText, call_log, png_bytes};
use std::sync::Arc;
use std::time::Duration;
use storybot_core::{
    BookId, Chapter, ChapterId, IllustrationRef, NewBook, NewChapter, NewCharacter, SessionId,
    UserSettings,
};
use storybot_error::{AggregateErrorKind, ProviderError, ProviderErrorKind, StorybotError};
use storybot_generation::{
    BatchOutcome, CachingTranslator, ChapterPipeline, FallbackChain, IllustrationBatch,
    ReferencePipeline, parse_chapter, parse_scene_list, prompts::FALLBACK_SCENE,
};
use storybot_interface::{ContentStore, ImageProvider, TextProvider};
use storybot_storage::{IllustrationArchive, InMemoryContentStore};

const CHAPTER_TEXT: &str = "Murka woke up early.\n\n[ILLUSTRATION: Murka stretching on a sunny windowsill]\n\nShe ran outside to find Rex.";

struct Fixture {
    pipeline: ChapterPipeline,
    store: Arc<InMemoryContentStore>,
    image: Arc<MockImage>,
    _dir: tempfile::TempDir,
}

fn fixture(text: MockText, image: MockImage) -> Fixture {
    let dir = tempfile::tempdir().expect("Temp dir");
    let store = Arc::new(InMemoryContentStore::new());
    let image = Arc::new(image);
    let text_chain = Arc::new(FallbackChain::text(
        vec![Arc::new(text) as Arc<dyn TextProvider>],
        Duration::from_secs(5),
    ));
    let image_chain = Arc::new(FallbackChain::image(
        vec![Arc::clone(&image) as Arc<dyn ImageProvider>],
        Duration::from_secs(5),
    ));
    let references = Arc::new(ReferencePipeline::new(
        image_chain,
        CachingTranslator::disabled(),
        IllustrationArchive::new(dir.path()),
        512,
    ));
    let pipeline = ChapterPipeline::new(
        text_chain,
        references,
        Arc::clone(&store) as Arc<dyn ContentStore>,
    );
    Fixture {
        pipeline,
        store,
        image,
        _dir: dir,
    }
}

async fn seed_book(store: &InMemoryContentStore, chapters: u32) -> BookId {
    let book_id = store
        .create_book(
            NewBook::builder()
                .owner(SessionId::new("alice"))
                .title("Murka and Rex")
                .description("A cat and a dog become friends")
                .build()
                .expect("Valid book"),
        )
        .await
        .expect("Stored");
    store
        .create_character(
            NewCharacter::builder()
                .book_id(book_id)
                .name("Murka")
                .full_description("A small grey cat, curious and kind")
                .build()
                .expect("Valid character"),
        )
        .await
        .expect("Stored");
    for number in 1..=chapters {
        store
            .create_chapter(
                NewChapter::builder()
                    .book_id(book_id)
                    .number(number)
                    .title(format!("Chapter {}", number))
                    .content(format!("Things happened in chapter {}.", number))
                    .word_count(4usize)
                    .build()
                    .expect("Valid chapter"),
            )
            .await
            .expect("Stored");
    }
    book_id
}

#[test]
fn test_chapter_number_follows_existing_chapters() {
    assert_eq!(parse_chapter(CHAPTER_TEXT, 3).number, 4);
    assert_eq!(parse_chapter(CHAPTER_TEXT, 3).title, "Chapter 4");
    assert_eq!(parse_chapter(CHAPTER_TEXT, 0).number, 1);
}

#[test]
fn test_marker_is_extracted_and_stripped() {
    let chapter = parse_chapter(CHAPTER_TEXT, 0);
    assert_eq!(chapter.scene, "Murka stretching on a sunny windowsill");
    assert!(!chapter.content.contains("ILLUSTRATION"));
    assert_eq!(
        chapter.content,
        "Murka woke up early.\n\nShe ran outside to find Rex."
    );
    assert_eq!(chapter.word_count, 10);
}

#[test]
fn test_original_language_marker_and_multiple_markers() {
    let raw = "Начало. [иллюстрация: кошка на окне] Середина. [ILLUSTRATION: second scene] Конец.";
    let chapter = parse_chapter(raw, 1);
    assert_eq!(chapter.scene, "кошка на окне");
    assert!(!chapter.content.contains('['));
    assert_eq!(chapter.word_count, 3);
}

#[test]
fn test_missing_marker_uses_fallback_scene() {
    let chapter = parse_chapter("Just a story without pictures.", 0);
    assert_eq!(chapter.scene, FALLBACK_SCENE);
    assert_eq!(chapter.word_count, 5);
}

#[test]
fn test_scene_list_parsing_tolerates_prose() {
    assert_eq!(
        parse_scene_list("Sure! [\"a cat\", \"a dog\"] Enjoy."),
        vec!["a cat", "a dog"]
    );
    assert!(parse_scene_list("no json here").is_empty());
    assert!(parse_scene_list("[1, 2]").is_empty());
}

#[tokio::test]
async fn test_derive_scene_prompts_pads_short_answers() {
    let log = call_log();
    let fx = fixture(
        MockText::reply("writer", "[\"first\", \"second\"]", &log),
        MockImage::png("painter", &log),
    );

    let scenes = fx
        .pipeline
        .derive_scene_prompts("text", &[], "marker scene", 3)
        .await;
    assert_eq!(scenes, vec!["first", "second", "marker scene"]);

    let single = fx
        .pipeline
        .derive_scene_prompts("text", &[], "marker scene", 1)
        .await;
    assert_eq!(single, vec!["marker scene"]);
    assert_eq!(log.lock().expect("Log lock").len(), 1);
}

#[tokio::test]
async fn test_partial_illustration_batch_keeps_request_order() {
    let log = call_log();
    let fx = fixture(
        MockText::reply("writer", CHAPTER_TEXT, &log),
        MockImage::new(
            "painter",
            ImageBehavior::FailWhenPromptContains("scene two".to_string()),
            &log,
        ),
    );
    let book_id = seed_book(&fx.store, 0).await;
    let book = fx
        .store
        .get_book(book_id)
        .await
        .expect("Read")
        .expect("Exists");
    let characters = fx.store.get_book_characters(book_id).await.expect("Read");

    let chapter = Chapter::from_new(
        ChapterId::new(),
        NewChapter::builder()
            .book_id(book_id)
            .number(1u32)
            .title("Chapter 1")
            .content("Text")
            .illustration_prompts(vec![
                "scene one".to_string(),
                "scene two".to_string(),
                "scene three".to_string(),
            ])
            .word_count(1usize)
            .build()
            .expect("Valid chapter"),
    );

    let batch = fx
        .pipeline
        .generate_illustrations(&book, &chapter, &characters, 3)
        .await;

    assert_eq!(
        batch.outcome(),
        BatchOutcome::Partial {
            succeeded: 2,
            failed: 1
        }
    );
    assert!(batch.results()[0].is_ok());
    assert!(batch.results()[1].is_err());
    assert!(batch.results()[2].is_ok());
    assert_eq!(batch.successes().len(), 2);
    assert_eq!(batch.first_success(), batch.results()[0].as_ref().ok());
}

#[tokio::test]
async fn test_write_chapter_persists_text_and_canonical_illustration() {
    let log = call_log();
    let fx = fixture(
        MockText::reply("writer", CHAPTER_TEXT, &log),
        MockImage::new("painter", ImageBehavior::Bytes(png_bytes(16, 16)), &log),
    );
    let book_id = seed_book(&fx.store, 3).await;

    let outcome = fx
        .pipeline
        .write_chapter(book_id, "", &UserSettings::default())
        .await
        .expect("Chapter written");

    assert_eq!(*outcome.chapter.number(), 4);
    assert_eq!(outcome.batch.outcome(), BatchOutcome::Complete);
    assert_eq!(
        outcome.chapter.illustration_prompts(),
        &vec!["Murka stretching on a sunny windowsill".to_string()]
    );

    let chapters = fx.store.get_book_chapters(book_id).await.expect("Read");
    assert_eq!(chapters.len(), 4);
    let stored = &chapters[3];
    assert_eq!(*stored.number(), 4);
    assert!(stored.illustration().is_some());
    assert_eq!(stored.illustration(), outcome.chapter.illustration());

    let image_requests = fx.image.requests.lock().expect("Request lock");
    assert_eq!(image_requests.len(), 1);
    assert!(image_requests[0].prompt().contains("Murka: A small grey cat"));
}

#[tokio::test]
async fn test_write_chapter_survives_failed_illustrations() {
    let log = call_log();
    let fx = fixture(
        MockText::reply("writer", CHAPTER_TEXT, &log),
        MockImage::new("painter", ImageBehavior::Fail, &log),
    );
    let book_id = seed_book(&fx.store, 0).await;

    let outcome = fx
        .pipeline
        .write_chapter(book_id, "Rex finds a bone", &UserSettings::default())
        .await
        .expect("Text still stored");

    assert_eq!(*outcome.chapter.number(), 1);
    assert_eq!(outcome.batch.outcome(), BatchOutcome::Failed);
    let chapters = fx.store.get_book_chapters(book_id).await.expect("Read");
    assert_eq!(chapters.len(), 1);
    assert!(chapters[0].illustration().is_none());
}

#[tokio::test]
async fn test_write_chapter_for_missing_book_is_not_found() {
    let log = call_log();
    let fx = fixture(
        MockText::reply("writer", CHAPTER_TEXT, &log),
        MockImage::png("painter", &log),
    );

    let err = fx
        .pipeline
        .write_chapter(BookId::new(), "", &UserSettings::default())
        .await
        .expect_err("Book does not exist");
    assert!(err.is_not_found());
    assert!(log.lock().expect("Log lock").is_empty());
}

#[tokio::test]
async fn test_hint_reaches_the_chapter_prompt() {
    let log = call_log();
    let text = MockText::reply("writer", CHAPTER_TEXT, &log);
    let prompts = Arc::clone(&text.prompts);
    let fx = fixture(text, MockImage::png("painter", &log));
    let book_id = seed_book(&fx.store, 1).await;

    fx.pipeline
        .write_chapter(book_id, "Rex finds a bone", &UserSettings::default())
        .await
        .expect("Chapter written");

    let prompts = prompts.lock().expect("Prompt lock");
    assert!(prompts[0].contains("Rex finds a bone"));
    assert!(prompts[0].contains("Chapter 1: Things happened in chapter 1."));
    assert!(prompts[0].contains("Write chapter 2"));
}

#[test]
fn test_batch_without_successes_is_failed() {
    let empty = IllustrationBatch::new(Vec::new());
    assert_eq!(empty.outcome(), BatchOutcome::Failed);
    let err = empty.canonical().expect_err("Nothing to keep");
    assert_eq!(err.kind, AggregateErrorKind::AllIllustrationsFailed(0));

    let failure = || -> Result<IllustrationRef, StorybotError> {
        Err(ProviderError::new(ProviderErrorKind::MissingOutput).into())
    };
    let failed = IllustrationBatch::new(vec![failure(), failure()]);
    assert_eq!(failed.outcome(), BatchOutcome::Failed);
    let err = failed.canonical().expect_err("Nothing to keep");
    assert_eq!(err.kind, AggregateErrorKind::AllIllustrationsFailed(2));
}

#[test]
fn test_canonical_is_first_success_by_request_index() {
    let batch = IllustrationBatch::new(vec![
        Err(ProviderError::new(ProviderErrorKind::MissingOutput).into()),
        Ok(IllustrationRef::Path("second.png".into())),
        Ok(IllustrationRef::Path("third.png".into())),
    ]);
    assert_eq!(
        batch.canonical().expect("One succeeded"),
        &IllustrationRef::Path("second.png".into())
    );
}
