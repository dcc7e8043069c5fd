mod common;

use common::{ImageBehavior, MockImage, MockText, call_log, character, png_bytes};
use std::sync::Arc;
use std::time::Duration;
use storybot_core::IllustrationRef;
use storybot_generation::{CachingTranslator, FallbackChain, ReferencePipeline, downscale};
use storybot_interface::{ImageProvider, TextProvider};
use storybot_storage::IllustrationArchive;

fn pipeline(provider: Arc<MockImage>, dir: &std::path::Path) -> ReferencePipeline {
    chain_pipeline(vec![provider], CachingTranslator::disabled(), dir)
}

fn chain_pipeline(
    providers: Vec<Arc<MockImage>>,
    translator: CachingTranslator,
    dir: &std::path::Path,
) -> ReferencePipeline {
    let chain = Arc::new(FallbackChain::image(
        providers
            .into_iter()
            .map(|p| p as Arc<dyn ImageProvider>)
            .collect(),
        Duration::from_secs(5),
    ));
    ReferencePipeline::new(chain, translator, IllustrationArchive::new(dir), 512)
}

#[test]
fn test_downscale_limits_longest_edge() {
    let big = png_bytes(1024, 768);
    let small = downscale(&big, 512);
    let decoded = image::load_from_memory(&small).expect("Decodable");
    assert_eq!(decoded.width(), 512);
    assert_eq!(decoded.height(), 384);
}

#[test]
fn test_downscale_keeps_small_and_undecodable_images() {
    let small = png_bytes(100, 50);
    assert_eq!(downscale(&small, 512), small);

    let garbage = b"definitely not an image".to_vec();
    assert_eq!(downscale(&garbage, 512), garbage);
}

#[tokio::test]
async fn test_generate_reference_downscales_and_keeps_prompt() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let log = call_log();
    let provider = Arc::new(MockImage::new(
        "painter",
        ImageBehavior::Bytes(png_bytes(1024, 1024)),
        &log,
    ));
    let pipeline = pipeline(provider, dir.path());

    let reference = pipeline
        .generate_reference("Murka", "A small grey cat with green eyes")
        .await
        .expect("Reference generated");

    let decoded = image::load_from_memory(&reference.image).expect("Decodable");
    assert!(decoded.width() <= 512 && decoded.height() <= 512);
    assert!(reference.prompt.contains("Murka"));
    assert!(reference.prompt.contains("A small grey cat with green eyes"));
    assert!(reference.prompt.contains("White background"));
}

#[tokio::test]
async fn test_scene_attaches_references_in_index_order() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let log = call_log();
    let provider = Arc::new(MockImage::png("painter", &log));
    let requests = Arc::clone(&provider.requests);
    let pipeline = pipeline(provider, dir.path());

    let murka_ref = png_bytes(4, 4);
    let rex_ref = png_bytes(6, 6);
    let characters = vec![
        character("Murka", "a grey cat", Some(murka_ref.clone())),
        character("Owl", "a wise owl", None),
        character("Rex", "a brown dog", Some(rex_ref.clone())),
    ];

    let illustration = pipeline
        .generate_scene_with_references("Picnic by the river", &characters, "Friends")
        .await
        .expect("Illustration generated");
    assert!(matches!(illustration, IllustrationRef::Path(_)));

    let requests = requests.lock().expect("Request lock");
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.references(), &vec![murka_ref, rex_ref]);
    assert!(request.prompt().contains("1. Murka: Reference image 1"));
    assert!(request.prompt().contains("2. Rex: Reference image 2"));
    assert!(request.prompt().contains("Owl: a wise owl"));
}

#[tokio::test]
async fn test_scene_without_references_uses_prompt_only_path() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let log = call_log();
    let provider = Arc::new(MockImage::png("painter", &log));
    let requests = Arc::clone(&provider.requests);
    let pipeline = pipeline(provider, dir.path());

    let characters = vec![character("Murka", "a grey cat", None)];
    pipeline
        .generate_scene_with_references("Picnic", &characters, "Friends")
        .await
        .expect("Illustration generated");

    let requests = requests.lock().expect("Request lock");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].references().is_empty());
    assert!(
        requests[0]
            .prompt()
            .contains("Characters should look like: Murka: a grey cat")
    );
}

#[tokio::test]
async fn test_failed_reference_attempt_falls_back_to_prompt_only() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let log = call_log();
    let provider = Arc::new(MockImage::new(
        "picky",
        ImageBehavior::FailWithReferences,
        &log,
    ));
    let requests = Arc::clone(&provider.requests);
    let pipeline = pipeline(provider, dir.path());

    let characters = vec![character("Murka", "a grey cat", Some(png_bytes(4, 4)))];
    let illustration = pipeline
        .generate_scene_with_references("Picnic", &characters, "Friends")
        .await
        .expect("Fallback succeeds");
    assert!(matches!(illustration, IllustrationRef::Path(_)));

    let requests = requests.lock().expect("Request lock");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].references().len(), 1);
    assert!(requests[1].references().is_empty());
}

#[tokio::test]
async fn test_prompt_only_provider_never_receives_reference_request() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let log = call_log();
    let gemini = Arc::new(MockImage::new("gemini", ImageBehavior::Fail, &log));
    let dalle = Arc::new(MockImage::prompt_only("dalle", &log));
    let gemini_requests = Arc::clone(&gemini.requests);
    let dalle_requests = Arc::clone(&dalle.requests);
    let pipeline = chain_pipeline(vec![gemini, dalle], CachingTranslator::disabled(), dir.path());

    let characters = vec![character(
        "Murka",
        "a grey cat with green eyes",
        Some(png_bytes(4, 4)),
    )];
    let illustration = pipeline
        .generate_scene_with_references("Picnic", &characters, "The Cat")
        .await
        .expect("Prompt-only fallback succeeds");
    assert!(matches!(illustration, IllustrationRef::Path(_)));

    let gemini_requests = gemini_requests.lock().expect("Request lock");
    assert_eq!(gemini_requests.len(), 2);
    assert_eq!(gemini_requests[0].references().len(), 1);
    assert!(gemini_requests[1].references().is_empty());

    let dalle_requests = dalle_requests.lock().expect("Request lock");
    assert_eq!(dalle_requests.len(), 1);
    assert!(dalle_requests[0].references().is_empty());
    assert!(!dalle_requests[0].prompt().contains("Reference image"));
    assert!(dalle_requests[0].prompt().contains("a grey cat with green eyes"));
}

#[tokio::test]
async fn test_chain_without_reference_support_goes_straight_to_prompt_only() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let log = call_log();
    let dalle = Arc::new(MockImage::prompt_only("dalle", &log));
    let requests = Arc::clone(&dalle.requests);
    let pipeline = pipeline(dalle, dir.path());

    let characters = vec![character("Murka", "a grey cat", Some(png_bytes(4, 4)))];
    pipeline
        .generate_scene_with_references("Picnic", &characters, "Friends")
        .await
        .expect("Illustration generated");

    let requests = requests.lock().expect("Request lock");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].references().is_empty());
    assert!(
        requests[0]
            .prompt()
            .contains("Characters should look like: Murka: a grey cat")
    );
}

#[tokio::test]
async fn test_book_title_is_translated_for_image_prompts() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let log = call_log();
    let text_chain = Arc::new(FallbackChain::text(
        vec![Arc::new(MockText::reply("translator", "EN", &log)) as Arc<dyn TextProvider>],
        Duration::from_secs(5),
    ));
    let provider = Arc::new(MockImage::png("painter", &log));
    let requests = Arc::clone(&provider.requests);
    let pipeline = chain_pipeline(
        vec![provider],
        CachingTranslator::new(text_chain, "English"),
        dir.path(),
    );

    let characters = vec![
        character("Murka", "серая кошка", Some(png_bytes(4, 4))),
        character("Owl", "мудрая сова", None),
    ];
    pipeline
        .generate_scene_with_references("Пикник", &characters, "Кошкин дом")
        .await
        .expect("Illustration generated");

    let requests = requests.lock().expect("Request lock");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt().contains("children's book 'EN'"));
    assert!(!requests[0].prompt().contains("Кошкин дом"));
}
