//! Data transfer objects for the OpenAI chat and image APIs.

use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A message in the OpenAI chat format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,
    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// System instruction message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// OpenAI chat completion request.
#[derive(Debug, Clone, Serialize, Builder, Getters)]
#[builder(setter(into))]
pub struct ChatRequest {
    /// Model identifier
    model: String,
    /// Conversation messages
    messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl ChatRequest {
    /// Creates a new builder for ChatRequest.
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }
}

/// A choice in the OpenAI response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// The message content
    pub message: ChatMessage,
    /// Reason for finishing
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// OpenAI chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Response choices
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    /// Text of the first choice, if it is non-empty.
    pub fn first_text(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|c| c.message.content.trim())
            .filter(|s| !s.is_empty())
    }
}

/// OpenAI image generation request.
#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest {
    /// Model identifier, e.g. "dall-e-3"
    pub model: String,
    /// Image prompt
    pub prompt: String,
    /// Number of images
    pub n: u32,
    /// Output size, e.g. "1024x1024"
    pub size: String,
}

/// One generated image, either hosted or inline.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageData {
    /// Hosted image URL
    #[serde(default)]
    pub url: Option<String>,
    /// Base64 encoded image
    #[serde(default)]
    pub b64_json: Option<String>,
}

/// OpenAI image generation response.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationResponse {
    /// Generated images
    #[serde(default)]
    pub data: Vec<ImageData>,
}
