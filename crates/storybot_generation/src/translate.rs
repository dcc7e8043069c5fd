//! Prompt translation with a shared cache.

use crate::prompts;
use crate::TextChain;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use storybot_interface::TextRequest;
use tracing::{debug, instrument, warn};

/// Translates prompt text into the working language of the image providers.
///
/// Successful translations are cached by exact source text; failures pass
/// the source through unchanged and are not cached. Clones share the cache.
#[derive(Clone)]
pub struct CachingTranslator {
    chain: Option<Arc<TextChain>>,
    target_language: String,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl std::fmt::Debug for CachingTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingTranslator")
            .field("enabled", &self.chain.is_some())
            .field("target_language", &self.target_language)
            .field("cached", &self.cached_len())
            .finish()
    }
}

impl CachingTranslator {
    /// Creates a translator backed by a text chain.
    pub fn new(chain: Arc<TextChain>, target_language: impl Into<String>) -> Self {
        Self {
            chain: Some(chain),
            target_language: target_language.into(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A translator that returns its input.
    pub fn disabled() -> Self {
        Self {
            chain: None,
            target_language: String::new(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Translates `text`, consulting the cache first.
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn translate(&self, text: &str) -> String {
        let Some(chain) = &self.chain else {
            return text.to_string();
        };
        if text.trim().is_empty() {
            return text.to_string();
        }

        let cached = self.cache.read().get(text).cloned();
        if let Some(hit) = cached {
            debug!("Translation cache hit");
            return hit;
        }

        let request = TextRequest::new(
            prompts::translation_system_prompt(&self.target_language),
            text,
        )
        .with_temperature(0.0);

        match chain.generate_text(&request).await {
            Ok(translated) => {
                let translated = translated.trim().to_string();
                self.cache
                    .write()
                    .insert(text.to_string(), translated.clone());
                translated
            }
            Err(e) => {
                warn!(error = %e, "Translation failed, using source text");
                text.to_string()
            }
        }
    }

    /// Number of cached translations.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Empties the cache.
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}
