mod common;

use common::{MockImage, MockText, call_log, character, png_bytes};
use std::sync::Arc;
use storybot_core::{BookId, IllustrationRef, NewBook, NewChapter, SessionId};
use storybot_generation::{GenerationServices, GenerationSettings, JobInput, JobOutput, JobRunner};
use storybot_interface::{ContentStore, ImageProvider, TextProvider};
use storybot_storage::{IllustrationArchive, InMemoryContentStore};

const CHAPTER_TEXT: &str =
    "Rex dug a hole.\n\n[ILLUSTRATION: Rex digging under the apple tree]\n\nMurka watched.";

struct Fixture {
    services: GenerationServices,
    store: Arc<InMemoryContentStore>,
    image: Arc<MockImage>,
    dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("Temp dir");
    let log = call_log();
    let store = Arc::new(InMemoryContentStore::new());
    let image = Arc::new(MockImage::png("painter", &log));
    let settings = GenerationSettings::builder().translate(false).build();
    let services = GenerationServices::new(
        settings,
        vec![Arc::new(MockText::reply("writer", CHAPTER_TEXT, &log)) as Arc<dyn TextProvider>],
        vec![Arc::clone(&image) as Arc<dyn ImageProvider>],
        Arc::clone(&store) as Arc<dyn ContentStore>,
        IllustrationArchive::new(dir.path().join("illustrations")),
    );
    Fixture {
        services,
        store,
        image,
        dir,
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
    for number in 1..=chapters {
        store
            .create_chapter(
                NewChapter::builder()
                    .book_id(book_id)
                    .number(number)
                    .title(format!("Chapter {}", number))
                    .content("Earlier adventures.")
                    .word_count(2usize)
                    .build()
                    .expect("Valid chapter"),
            )
            .await
            .expect("Stored");
    }
    book_id
}

#[tokio::test]
async fn test_chapter_text_job_numbers_after_stored_chapters() {
    let fx = fixture();
    let book_id = seed_book(&fx.store, 2).await;

    let output = fx
        .services
        .run(JobInput::ChapterText {
            book_id,
            hint: "Rex finds a bone".to_string(),
            target_words: 300,
        })
        .await
        .expect("Chapter generated");

    match output {
        JobOutput::Chapter(chapter) => {
            assert_eq!(chapter.number, 3);
            assert_eq!(chapter.title, "Chapter 3");
            assert_eq!(chapter.scene, "Rex digging under the apple tree");
            assert!(!chapter.content.contains("[ILLUSTRATION"));
        }
        other => panic!("Expected chapter text, got {:?}", other),
    }

    let stored = fx.store.get_book_chapters(book_id).await.expect("Read");
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_chapter_text_job_for_missing_book_is_not_found() {
    let fx = fixture();

    let err = fx
        .services
        .run(JobInput::ChapterText {
            book_id: BookId::new(),
            hint: String::new(),
            target_words: 300,
        })
        .await
        .expect_err("Book does not exist");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_illustration_job_lands_in_archive() {
    let fx = fixture();
    let reference = png_bytes(4, 4);

    let output = fx
        .services
        .run(JobInput::Illustration {
            scene: "Picnic by the river".to_string(),
            title: "Murka and Rex".to_string(),
            characters: vec![character("Murka", "a grey cat", Some(reference.clone()))],
        })
        .await
        .expect("Illustration generated");

    let path = match output {
        JobOutput::Illustration(IllustrationRef::Path(path)) => path,
        other => panic!("Expected an archived illustration, got {:?}", other),
    };
    assert!(path.starts_with(fx.dir.path().join("illustrations")));
    let written = tokio::fs::read(&path).await.expect("Archived file");
    assert_eq!(written, png_bytes(8, 8));

    let requests = fx.image.requests.lock().expect("Request lock");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].references(), &vec![reference]);
}

#[tokio::test]
async fn test_reference_job_returns_portrait() {
    let fx = fixture();

    let output = fx
        .services
        .run(JobInput::CharacterReference {
            name: "Murka".to_string(),
            description: "A small grey cat, curious and kind".to_string(),
        })
        .await
        .expect("Reference generated");

    match output {
        JobOutput::Reference(reference) => {
            assert!(image::load_from_memory(&reference.image).is_ok());
            assert!(reference.prompt.contains("Murka"));
        }
        other => panic!("Expected a reference, got {:?}", other),
    }
}
