//! Clients for OpenAI chat completions and DALL-E image generation.

use crate::http::{ensure_success, read_json, transport_error};
use crate::openai::{ChatMessage, ChatRequest, ChatResponse, ImageGenerationRequest, ImageGenerationResponse};
use crate::ProviderThrottle;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use storybot_error::{ProviderError, ProviderErrorKind};
use storybot_interface::{ImageProvider, ImageRequest, TextProvider, TextRequest};
use tracing::{debug, instrument};

/// Default endpoint for the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// DALL-E rejects prompts longer than this many characters.
const DALLE_PROMPT_LIMIT: usize = 1000;

/// Text client for OpenAI-compatible chat completions.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    throttle: ProviderThrottle,
}

impl OpenAiClient {
    /// Creates a new chat client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key for authentication
    /// * `model` - Model identifier
    /// * `base_url` - API root, e.g. [`OPENAI_BASE_URL`]
    #[instrument(skip(api_key), fields(model = %model))]
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        debug!(model = %model, url = %base_url, "Created OpenAI client");

        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            throttle: ProviderThrottle::unlimited(),
        }
    }

    /// Applies a request throttle.
    pub fn with_throttle(mut self, throttle: ProviderThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Returns the model name.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    fn chat_request(&self, req: &TextRequest) -> Result<ChatRequest, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = req.system() {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(req.prompt().clone()));

        ChatRequest::builder()
            .model(self.model.clone())
            .messages(messages)
            .max_tokens(*req.max_tokens())
            .temperature(*req.temperature())
            .build()
            .map_err(|e| ProviderError::new(ProviderErrorKind::Unsupported(e.to_string())))
    }
}

#[async_trait]
impl TextProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, req), fields(provider = "openai", model = %self.model))]
    async fn generate_text(&self, req: &TextRequest) -> Result<String, ProviderError> {
        let chat_request = self.chat_request(req)?;
        let _guard = self.throttle.acquire().await;

        debug!(
            message_count = chat_request.messages().len(),
            "Sending request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let response = ensure_success(self.name(), response).await?;
        let chat_response: ChatResponse = read_json(self.name(), response).await?;

        debug!(choices = chat_response.choices.len(), "Received response");

        chat_response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new(ProviderErrorKind::MissingOutput))
    }
}

/// Image client for DALL-E.
///
/// DALL-E ignores reference images; only the prompt is sent.
#[derive(Debug, Clone)]
pub struct DalleClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    size: String,
    throttle: ProviderThrottle,
}

impl DalleClient {
    /// Creates a new image client producing 1024x1024 images.
    #[instrument(skip(api_key), fields(model = %model))]
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        debug!(model = %model, url = %base_url, "Created DALL-E client");

        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            size: "1024x1024".to_string(),
            throttle: ProviderThrottle::unlimited(),
        }
    }

    /// Applies a request throttle.
    pub fn with_throttle(mut self, throttle: ProviderThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        let response = ensure_success(self.name(), response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(self.name(), e))?;
        Ok(bytes.to_vec())
    }
}

/// Shortens a prompt to the DALL-E limit, marking the cut with an ellipsis.
pub fn truncate_dalle_prompt(prompt: &str) -> String {
    if prompt.chars().count() <= DALLE_PROMPT_LIMIT {
        return prompt.to_string();
    }
    let kept: String = prompt.chars().take(DALLE_PROMPT_LIMIT - 3).collect();
    format!("{}...", kept)
}

#[async_trait]
impl ImageProvider for DalleClient {
    fn name(&self) -> &str {
        "dalle"
    }

    #[instrument(skip(self, req), fields(provider = "dalle", model = %self.model))]
    async fn generate_image(&self, req: &ImageRequest) -> Result<Vec<u8>, ProviderError> {
        let body = ImageGenerationRequest {
            model: self.model.clone(),
            prompt: truncate_dalle_prompt(req.prompt()),
            n: 1,
            size: self.size.clone(),
        };
        let _guard = self.throttle.acquire().await;

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let response = ensure_success(self.name(), response).await?;
        let images: ImageGenerationResponse = read_json(self.name(), response).await?;
        let first = images
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new(ProviderErrorKind::MissingOutput))?;

        if let Some(b64) = first.b64_json {
            return base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| ProviderError::new(ProviderErrorKind::MalformedOutput(e.to_string())));
        }

        match first.url {
            Some(url) => {
                debug!(url = %url, "Downloading generated image");
                self.download(&url).await
            }
            None => Err(ProviderError::new(ProviderErrorKind::MissingOutput)),
        }
    }
}
