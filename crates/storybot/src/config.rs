//! Layered configuration: `storybot.toml`, then `STORYBOT__*` environment
//! variables.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use storybot_core::UserSettings;
use storybot_error::{ConfigError, ConfigErrorKind};
use storybot_generation::GenerationSettings;
use storybot_session::{KeywordTable, ValidationRules};
use tracing::{debug, instrument};

/// Configuration file read when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "storybot.toml";
/// Prefix of environment overrides, e.g. `STORYBOT__LOG__LEVEL`.
pub const ENV_PREFIX: &str = "STORYBOT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct StorybotConfig {
    log: LogConfig,
    providers: ProvidersConfig,
    chains: ChainsConfig,
    generation: GenerationConfig,
    session: SessionConfig,
    validation: ValidationRules,
    keywords: KeywordTable,
}

impl StorybotConfig {
    /// Loads the configuration file (optional when `path` is `None`) and
    /// applies environment overrides.
    ///
    /// API keys missing from both fall back to `OPENAI_API_KEY` and
    /// `GEMINI_API_KEY`.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let mut config = Self::build(config::Config::builder().add_source(file))?;
        config.providers.apply_env_fallbacks();
        debug!(chains = ?config.chains, "Configuration loaded");
        Ok(config)
    }

    /// Parses TOML text, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let source = config::File::from_str(toml, config::FileFormat::Toml);
        Self::finish(config::Config::builder().add_source(source))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("chains.text")
            .with_list_parse_key("chains.image")
            .try_parsing(true);
        Self::finish(builder.add_source(environment))
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let parsed: Self = builder
            .build()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Load(e.to_string())))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Invalid(e.to_string())))?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.generation.user_settings()?;
        if self.generation.job_timeout_secs < self.generation.provider_timeout_secs {
            return Err(ConfigError::new(ConfigErrorKind::TimeoutOrder {
                job_secs: self.generation.job_timeout_secs,
                provider_secs: self.generation.provider_timeout_secs,
            }));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    level: String,
    /// Output format
    format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Connection settings of one provider account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key; the provider is skipped when absent
    api_key: Option<String>,
    /// Override of the public API endpoint
    base_url: Option<String>,
    /// Text model
    model: Option<String>,
    /// Image model
    image_model: Option<String>,
    /// Request rate limit
    requests_per_minute: Option<u32>,
    /// Concurrent request limit
    max_concurrent: Option<u32>,
}

impl ProviderConfig {
    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    fn fill_key_from_env(&mut self, variable: &str) {
        if self.is_configured() {
            return;
        }
        if let Ok(key) = std::env::var(variable) {
            self.api_key = Some(key);
        }
    }
}

/// `[providers]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenAI account, used by `openai` and `dalle`
    openai: ProviderConfig,
    /// Gemini account, used by `gemini`
    gemini: ProviderConfig,
}

impl ProvidersConfig {
    fn apply_env_fallbacks(&mut self) {
        self.openai.fill_key_from_env("OPENAI_API_KEY");
        self.gemini.fill_key_from_env("GEMINI_API_KEY");
    }
}

/// `[chains]` section: provider names in fallback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct ChainsConfig {
    /// Text providers: `openai`, `gemini`
    text: Vec<String>,
    /// Image providers: `gemini`, `dalle`
    image: Vec<String>,
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            text: vec!["openai".to_string(), "gemini".to_string()],
            image: vec!["gemini".to_string(), "dalle".to_string()],
        }
    }
}

/// `[generation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct GenerationConfig {
    chapter_words: usize,
    illustrations_per_chapter: usize,
    reference_max_edge: u32,
    provider_timeout_secs: u64,
    job_timeout_secs: u64,
    illustration_dir: PathBuf,
    working_language: String,
    translate: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            chapter_words: 600,
            illustrations_per_chapter: 1,
            reference_max_edge: 512,
            provider_timeout_secs: 120,
            job_timeout_secs: 300,
            illustration_dir: PathBuf::from("illustrations"),
            working_language: "English".to_string(),
            translate: true,
        }
    }
}

impl GenerationConfig {
    /// Settings handed to the generation pipelines.
    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings::builder()
            .provider_timeout(Duration::from_secs(self.provider_timeout_secs))
            .job_timeout(Duration::from_secs(self.job_timeout_secs))
            .reference_max_edge(self.reference_max_edge)
            .working_language(self.working_language.clone())
            .translate(self.translate)
            .build()
    }

    /// Settings new sessions start with.
    pub fn user_settings(&self) -> Result<UserSettings, ConfigError> {
        UserSettings::new(self.chapter_words, self.illustrations_per_chapter)
            .map_err(|e| ConfigError::new(ConfigErrorKind::InvalidDefaults(e.kind)))
    }
}

/// `[session]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct SessionConfig {
    idle_timeout_secs: u64,
    eviction_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            eviction_interval_secs: 300,
        }
    }
}

impl SessionConfig {
    /// How long a session may stay idle before eviction.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// How often idle sessions are swept.
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs.max(1))
    }
}
