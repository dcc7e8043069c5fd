//! Builds the ordered provider lists of both fallback chains from configuration.

use crate::config::{ChainsConfig, ProviderConfig, ProvidersConfig};
use std::sync::Arc;
use storybot_error::{ConfigError, ConfigErrorKind};
use storybot_interface::{ImageProvider, TextProvider};
use storybot_models::{
    DalleClient, GEMINI_BASE_URL, GeminiClient, OPENAI_BASE_URL, OpenAiClient, ProviderThrottle,
};
use tracing::{info, warn};

/// Default OpenAI chat model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
/// Default OpenAI image model.
pub const DEFAULT_DALLE_MODEL: &str = "dall-e-3";
/// Default Gemini text model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
/// Default Gemini image model.
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Provider lists in fallback order.
pub struct ProviderSet {
    /// Text chain members
    pub text: Vec<Arc<dyn TextProvider>>,
    /// Image chain members
    pub image: Vec<Arc<dyn ImageProvider>>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("text", &self.text.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("image", &self.image.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderSet {
    /// Instantiates every provider named in the chains.
    ///
    /// Providers without an API key are skipped with a warning. Unknown names
    /// and chains left empty are configuration errors.
    pub fn from_config(
        providers: &ProvidersConfig,
        chains: &ChainsConfig,
    ) -> Result<Self, ConfigError> {
        let mut text: Vec<Arc<dyn TextProvider>> = Vec::new();
        for name in chains.text() {
            match name.trim().to_lowercase().as_str() {
                "openai" => {
                    if let Some(client) = openai(providers.openai()) {
                        text.push(Arc::new(client));
                    }
                }
                "gemini" => {
                    if let Some(client) = gemini(providers.gemini(), false) {
                        text.push(Arc::new(client));
                    }
                }
                other => {
                    return Err(ConfigError::new(ConfigErrorKind::UnknownProvider {
                        capability: "text",
                        name: other.to_string(),
                        expected: "openai or gemini",
                    }));
                }
            }
        }

        let mut image: Vec<Arc<dyn ImageProvider>> = Vec::new();
        for name in chains.image() {
            match name.trim().to_lowercase().as_str() {
                "gemini" => {
                    if let Some(client) = gemini(providers.gemini(), true) {
                        image.push(Arc::new(client));
                    }
                }
                "dalle" => {
                    if let Some(client) = dalle(providers.openai()) {
                        image.push(Arc::new(client));
                    }
                }
                other => {
                    return Err(ConfigError::new(ConfigErrorKind::UnknownProvider {
                        capability: "image",
                        name: other.to_string(),
                        expected: "gemini or dalle",
                    }));
                }
            }
        }

        if text.is_empty() {
            return Err(ConfigError::new(ConfigErrorKind::EmptyChain("text")));
        }
        if image.is_empty() {
            return Err(ConfigError::new(ConfigErrorKind::EmptyChain("image")));
        }

        let set = Self { text, image };
        info!(providers = ?set, "Providers ready");
        Ok(set)
    }
}

fn api_key(config: &ProviderConfig, provider: &str) -> Option<String> {
    if config.is_configured() {
        config.api_key().clone()
    } else {
        warn!(provider, "No API key, provider skipped");
        None
    }
}

fn throttle(config: &ProviderConfig) -> ProviderThrottle {
    ProviderThrottle::new(*config.requests_per_minute(), *config.max_concurrent())
}

fn base_url(config: &ProviderConfig, default: &str) -> String {
    config
        .base_url()
        .clone()
        .unwrap_or_else(|| default.to_string())
}

fn openai(config: &ProviderConfig) -> Option<OpenAiClient> {
    let key = api_key(config, "openai")?;
    let model = config
        .model()
        .clone()
        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
    Some(OpenAiClient::new(key, model, base_url(config, OPENAI_BASE_URL)).with_throttle(throttle(config)))
}

fn dalle(config: &ProviderConfig) -> Option<DalleClient> {
    let key = api_key(config, "dalle")?;
    let model = config
        .image_model()
        .clone()
        .unwrap_or_else(|| DEFAULT_DALLE_MODEL.to_string());
    Some(DalleClient::new(key, model, base_url(config, OPENAI_BASE_URL)).with_throttle(throttle(config)))
}

fn gemini(config: &ProviderConfig, image: bool) -> Option<GeminiClient> {
    let key = api_key(config, "gemini")?;
    let model = if image {
        config
            .image_model()
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_IMAGE_MODEL.to_string())
    } else {
        config
            .model()
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string())
    };
    Some(GeminiClient::new(key, model, base_url(config, GEMINI_BASE_URL)).with_throttle(throttle(config)))
}
