//! Generation provider error types.

/// Kinds of failures a single text or image provider can report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ProviderErrorKind {
    /// Network or transport failure
    #[display("HTTP error: {}", _0)]
    Http(String),
    /// The provider answered with a non-success status
    #[display("API error (status {}): {}", status, message)]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body returned by the provider
        message: String,
    },
    /// The attempt exceeded its time budget
    #[display("Timed out after {} seconds", _0)]
    Timeout(u64),
    /// The response contained no usable text or image
    #[display("Provider returned no output")]
    MissingOutput,
    /// The response body could not be interpreted
    #[display("Malformed provider output: {}", _0)]
    MalformedOutput(String),
    /// Image bytes did not start with a known image signature
    #[display("Image output has no recognised signature")]
    InvalidSignature,
    /// The provider cannot serve this kind of request
    #[display("Unsupported request: {}", _0)]
    Unsupported(String),
}

/// Provider error with location tracking.
///
/// # Examples
///
/// ```
/// use storybot_error::{ProviderError, ProviderErrorKind};
///
/// let err = ProviderError::new(ProviderErrorKind::MissingOutput);
/// assert!(format!("{}", err).contains("no output"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Provider Error: {} at line {} in {}", kind, line, file)]
pub struct ProviderError {
    /// The kind of error that occurred
    pub kind: ProviderErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ProviderError {
    /// Create a new provider error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
