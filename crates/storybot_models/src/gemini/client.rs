//! Client for the Gemini `generateContent` endpoint, for text and images.

use crate::gemini::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};
use crate::http::{ensure_success, read_json, transport_error};
use crate::ProviderThrottle;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use storybot_error::{ProviderError, ProviderErrorKind};
use storybot_interface::{ImageProvider, ImageRequest, TextProvider, TextRequest};
use tracing::{debug, instrument};

/// Default endpoint for the Gemini API.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client bound to one model.
///
/// Build one instance with a text model and another with an image model;
/// both implement either provider trait.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    throttle: ProviderThrottle,
}

impl GeminiClient {
    /// Creates a new client.
    #[instrument(skip(api_key), fields(model = %model))]
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        debug!(model = %model, url = %base_url, "Created Gemini client");

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

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let _guard = self.throttle.acquire().await;

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error("gemini", e))?;

        let response = ensure_success("gemini", response).await?;
        read_json("gemini", response).await
    }
}

/// Builds a request with the prompt first and each reference as an inline part.
pub fn image_request_body(req: &ImageRequest) -> GenerateContentRequest {
    let mut parts = vec![Part::text(req.prompt().clone())];
    for reference in req.references() {
        let mime = image::guess_format(reference)
            .map(|f| f.to_mime_type())
            .unwrap_or("image/png");
        parts.push(Part::inline(mime, STANDARD.encode(reference)));
    }

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            ..Default::default()
        }),
    }
}

#[async_trait]
impl TextProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, req), fields(provider = "gemini", model = %self.model))]
    async fn generate_text(&self, req: &TextRequest) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(req.prompt().clone())],
            }],
            system_instruction: req.system().as_ref().map(|s| Content {
                role: None,
                parts: vec![Part::text(s.clone())],
            }),
            generation_config: Some(GenerationConfig {
                temperature: *req.temperature(),
                max_output_tokens: *req.max_tokens(),
                response_modalities: None,
            }),
        };

        let response = self.generate_content(&request).await?;
        debug!(candidates = response.candidates.len(), "Received response");

        response
            .text()
            .ok_or_else(|| ProviderError::new(ProviderErrorKind::MissingOutput))
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_references(&self) -> bool {
        true
    }

    #[instrument(skip(self, req), fields(provider = "gemini", model = %self.model, references = req.references().len()))]
    async fn generate_image(&self, req: &ImageRequest) -> Result<Vec<u8>, ProviderError> {
        let response = self.generate_content(&image_request_body(req)).await?;

        let inline = response
            .first_image()
            .ok_or_else(|| ProviderError::new(ProviderErrorKind::MissingOutput))?;

        let bytes = STANDARD
            .decode(&inline.data)
            .map_err(|e| ProviderError::new(ProviderErrorKind::MalformedOutput(e.to_string())))?;

        debug!(bytes = bytes.len(), mime = %inline.mime_type, "Received image");
        Ok(bytes)
    }
}
