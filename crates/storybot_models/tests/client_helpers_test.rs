use std::time::{Duration, Instant};
use storybot_interface::ImageRequest;
use storybot_models::{ProviderThrottle, image_request_body, truncate_dalle_prompt};

#[test]
fn test_dalle_prompt_is_truncated_to_limit() {
    let short = "A cat in a hat";
    assert_eq!(truncate_dalle_prompt(short), short);

    let long = "x".repeat(1500);
    let truncated = truncate_dalle_prompt(&long);
    assert_eq!(truncated.chars().count(), 1000);
    assert!(truncated.ends_with("..."));
}

#[test]
fn test_dalle_truncation_counts_characters_not_bytes() {
    let long = "кот".repeat(400);
    let truncated = truncate_dalle_prompt(&long);
    assert_eq!(truncated.chars().count(), 1000);
}

#[test]
fn test_gemini_image_body_attaches_references_in_order() {
    let png_signature = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    let jpeg_signature = vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1];
    let request = ImageRequest::new("Two friends at the beach")
        .with_references(vec![png_signature, jpeg_signature]);

    let body = image_request_body(&request);
    let parts = &body.contents[0].parts;
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].text.as_deref(), Some("Two friends at the beach"));
    assert_eq!(
        parts[1].inline_data.as_ref().map(|d| d.mime_type.as_str()),
        Some("image/png")
    );
    assert_eq!(
        parts[2].inline_data.as_ref().map(|d| d.mime_type.as_str()),
        Some("image/jpeg")
    );
}

#[tokio::test]
async fn test_unlimited_throttle_does_not_wait() {
    let throttle = ProviderThrottle::unlimited();
    let start = Instant::now();
    for _ in 0..50 {
        let _guard = throttle.acquire().await;
    }
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_concurrency_limit_blocks_second_request() {
    let throttle = ProviderThrottle::new(None, Some(1));
    let held = throttle.acquire().await;

    let blocked = tokio::time::timeout(Duration::from_millis(50), throttle.acquire()).await;
    assert!(blocked.is_err(), "Second request should wait for the slot");

    drop(held);
    let acquired = tokio::time::timeout(Duration::from_millis(500), throttle.acquire()).await;
    assert!(acquired.is_ok());
}
