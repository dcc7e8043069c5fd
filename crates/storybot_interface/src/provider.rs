//! Text and image generation provider traits.

use async_trait::async_trait;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use storybot_error::ProviderError;

/// A single text generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct TextRequest {
    /// Instruction framing the task, if any
    #[builder(default, setter(into, strip_option))]
    system: Option<String>,
    /// User prompt
    prompt: String,
    /// Sampling temperature
    #[builder(default, setter(strip_option))]
    temperature: Option<f32>,
    /// Maximum tokens to generate
    #[builder(default, setter(strip_option))]
    max_tokens: Option<u32>,
}

impl TextRequest {
    /// Returns a builder for constructing a TextRequest.
    pub fn builder() -> TextRequestBuilder {
        TextRequestBuilder::default()
    }

    /// A request with a system instruction and a prompt.
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// A request with only a prompt.
    pub fn prompt_only(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the output token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A single image generation request.
#[derive(Debug, Clone, PartialEq, Default, Getters)]
pub struct ImageRequest {
    /// Prompt describing the image
    prompt: String,
    /// Reference images, in the order the prompt enumerates them
    references: Vec<Vec<u8>>,
}

impl ImageRequest {
    /// A prompt-only request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            references: Vec::new(),
        }
    }

    /// Attaches reference images.
    pub fn with_references(mut self, references: Vec<Vec<u8>>) -> Self {
        self.references = references;
        self
    }
}

/// Backend capable of producing text.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name used in logs and aggregate errors.
    fn name(&self) -> &str;

    /// Generates text for the request.
    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError>;
}

/// Backend capable of producing an image.
///
/// Returned bytes are an encoded image (PNG, JPEG or WebP).
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name used in logs and aggregate errors.
    fn name(&self) -> &str;

    /// Whether reference images in the request are honoured.
    fn supports_references(&self) -> bool {
        false
    }

    /// Generates an image for the request.
    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<u8>, ProviderError>;
}
