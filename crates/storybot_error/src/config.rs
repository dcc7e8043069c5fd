//! Configuration and startup error types.

use crate::ValidationErrorKind;

/// Ways configuration or provider wiring can fail at startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A configuration source could not be read or merged
    #[display("Failed to load config: {}", _0)]
    Load(String),
    /// Merged configuration did not match the expected shape
    #[display("Invalid config: {}", _0)]
    Invalid(String),
    /// Default chapter settings fall outside the per-user ranges
    #[display("Invalid generation defaults: {}", _0)]
    InvalidDefaults(ValidationErrorKind),
    /// Jobs would be cancelled before a single provider attempt could finish
    #[display(
        "generation.job_timeout_secs ({}) must not be shorter than provider_timeout_secs ({})",
        job_secs,
        provider_secs
    )]
    TimeoutOrder {
        /// Configured job timeout
        job_secs: u64,
        /// Configured provider attempt timeout
        provider_secs: u64,
    },
    /// A chain names a provider that does not exist for its capability
    #[display("Unknown {} provider '{}' (expected {})", capability, name, expected)]
    UnknownProvider {
        /// "text" or "image"
        capability: &'static str,
        /// Name as written in the chain
        name: String,
        /// Accepted names
        expected: &'static str,
    },
    /// Every provider in a chain was skipped for lack of an API key
    #[display(
        "No {} provider is configured; set an API key for one of chains.{}",
        _0,
        _0
    )]
    EmptyChain(&'static str),
    /// The tracing subscriber could not be installed
    #[display("Logging setup failed: {}", _0)]
    Logging(String),
}

/// Configuration error with location tracking.
///
/// # Examples
///
/// ```
/// use storybot_error::{ConfigError, ConfigErrorKind};
///
/// let err = ConfigError::new(ConfigErrorKind::EmptyChain("image"));
/// assert!(format!("{}", err).contains("No image provider"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    /// What went wrong
    pub kind: ConfigErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
