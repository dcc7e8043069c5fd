//! Tracing subscriber setup.

use crate::config::{LogConfig, LogFormat};
use storybot_error::{ConfigError, ConfigErrorKind};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.level()).map_err(|e| {
            ConfigError::new(ConfigErrorKind::Logging(format!(
                "invalid log level '{}': {}",
                config.level(),
                e
            )))
        })?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format() {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ConfigError::new(ConfigErrorKind::Logging(e.to_string())))
}
