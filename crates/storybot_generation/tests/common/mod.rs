//! Test doubles for generation tests.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storybot_core::{BookId, Character, CharacterId, NewCharacter};
use storybot_error::{ProviderError, ProviderErrorKind};
use storybot_interface::{ImageProvider, ImageRequest, TextProvider, TextRequest};

/// Shared record of which providers were called, in order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Encodes a solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 120, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("PNG encoding");
    out.into_inner()
}

/// Builds a stored-looking character, optionally with a reference image.
pub fn character(name: &str, description: &str, reference: Option<Vec<u8>>) -> Character {
    let new = NewCharacter::builder()
        .book_id(BookId::new())
        .name(name)
        .full_description(description)
        .build()
        .expect("Valid character");
    let mut character = Character::from_new(CharacterId::new(), new);
    if let Some(image) = reference {
        character.set_reference(image, format!("portrait of {}", name));
    }
    character
}

#[derive(Debug, Clone)]
pub enum TextBehavior {
    Reply(String),
    Fail,
    Blank,
    Sleep(Duration),
}

/// Text provider with fixed behaviour.
pub struct MockText {
    pub name: String,
    pub behavior: TextBehavior,
    pub calls: Arc<AtomicUsize>,
    pub log: CallLog,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockText {
    pub fn new(name: &str, behavior: TextBehavior, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            log: Arc::clone(log),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reply(name: &str, text: &str, log: &CallLog) -> Self {
        Self::new(name, TextBehavior::Reply(text.to_string()), log)
    }

    pub fn failing(name: &str, log: &CallLog) -> Self {
        Self::new(name, TextBehavior::Fail, log)
    }
}

#[async_trait]
impl TextProvider for MockText {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().expect("Log lock").push(self.name.clone());
        self.prompts
            .lock()
            .expect("Prompt lock")
            .push(request.prompt().clone());

        match &self.behavior {
            TextBehavior::Reply(text) => Ok(text.clone()),
            TextBehavior::Fail => Err(ProviderError::new(ProviderErrorKind::Api {
                status: 500,
                message: "internal error".to_string(),
            })),
            TextBehavior::Blank => Ok("   ".to_string()),
            TextBehavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok("too late".to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum ImageBehavior {
    /// Always return these bytes
    Bytes(Vec<u8>),
    /// Always fail
    Fail,
    /// Fail when the prompt contains the text, otherwise return a PNG
    FailWhenPromptContains(String),
    /// Fail when any reference image is attached, otherwise return a PNG
    FailWithReferences,
}

/// Image provider with fixed behaviour that records what it was sent.
pub struct MockImage {
    pub name: String,
    pub behavior: ImageBehavior,
    pub calls: Arc<AtomicUsize>,
    pub log: CallLog,
    pub requests: Arc<Mutex<Vec<ImageRequest>>>,
    pub accepts_references: bool,
}

impl MockImage {
    pub fn new(name: &str, behavior: ImageBehavior, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            log: Arc::clone(log),
            requests: Arc::new(Mutex::new(Vec::new())),
            accepts_references: true,
        }
    }

    pub fn png(name: &str, log: &CallLog) -> Self {
        Self::new(name, ImageBehavior::Bytes(png_bytes(8, 8)), log)
    }

    /// A PNG provider that ignores reference images, like DALL-E.
    pub fn prompt_only(name: &str, log: &CallLog) -> Self {
        Self {
            accepts_references: false,
            ..Self::png(name, log)
        }
    }
}

#[async_trait]
impl ImageProvider for MockImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_references(&self) -> bool {
        self.accepts_references
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().expect("Log lock").push(self.name.clone());
        self.requests
            .lock()
            .expect("Request lock")
            .push(request.clone());

        let error = || {
            Err(ProviderError::new(ProviderErrorKind::Api {
                status: 503,
                message: "overloaded".to_string(),
            }))
        };

        match &self.behavior {
            ImageBehavior::Bytes(bytes) => Ok(bytes.clone()),
            ImageBehavior::Fail => error(),
            ImageBehavior::FailWhenPromptContains(needle) => {
                if request.prompt().contains(needle.as_str()) {
                    error()
                } else {
                    Ok(png_bytes(8, 8))
                }
            }
            ImageBehavior::FailWithReferences => {
                if request.references().is_empty() {
                    Ok(png_bytes(8, 8))
                } else {
                    error()
                }
            }
        }
    }
}
