//! Error types for the StoryBot workspace.
//!
//! Every error carries the source line and file where it was created. The
//! crate-level [`StorybotError`] wraps any of them so that library code can use
//! a single `?`-friendly result type.

mod aggregate;
mod config;
mod gateway;
mod provider;
mod store;
mod validation;

pub use aggregate::{AggregateError, AggregateErrorKind, ProviderAttempt};
pub use config::{ConfigError, ConfigErrorKind};
pub use gateway::GatewayError;
pub use provider::{ProviderError, ProviderErrorKind};
pub use store::{StoreError, StoreErrorKind};
pub use validation::{ValidationError, ValidationErrorKind};

/// Crate-level error variants.
#[derive(Debug, Clone, derive_more::From, derive_more::Display)]
pub enum StorybotErrorKind {
    /// Configuration error
    #[display("{}", _0)]
    Config(ConfigError),
    /// Single provider failure
    #[display("{}", _0)]
    Provider(ProviderError),
    /// Fallback chain or batch failure
    #[display("{}", _0)]
    Aggregate(AggregateError),
    /// User input validation failure
    #[display("{}", _0)]
    Validation(ValidationError),
    /// Content store failure
    #[display("{}", _0)]
    Store(StoreError),
    /// Messaging transport failure
    #[display("{}", _0)]
    Gateway(GatewayError),
}

/// StoryBot error with kind discrimination.
#[derive(Debug, Clone)]
pub struct StorybotError(Box<StorybotErrorKind>);

impl StorybotError {
    /// Create a new error from a kind.
    pub fn new(kind: StorybotErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StorybotErrorKind {
        &self.0
    }

    /// True when the error reports a missing store record.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind(),
            StorybotErrorKind::Store(StoreError {
                kind: StoreErrorKind::NotFound { .. },
                ..
            })
        )
    }
}

impl std::fmt::Display for StorybotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Storybot Error: {}", self.0)
    }
}

impl std::error::Error for StorybotError {}

// Generic From implementation for any type that converts to StorybotErrorKind
impl<T> From<T> for StorybotError
where
    T: Into<StorybotErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for StoryBot operations.
pub type StorybotResult<T> = std::result::Result<T, StorybotError>;
