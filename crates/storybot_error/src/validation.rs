//! User input validation errors.

/// Ways a user's text can fail a length rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ValidationErrorKind {
    /// Input shorter than the minimum
    #[display("{} must be at least {} characters (got {})", field, min, actual)]
    TooShort {
        /// Field being validated
        field: String,
        /// Minimum character count
        min: usize,
        /// Character count received
        actual: usize,
    },
    /// Input longer than the maximum
    #[display("{} must be at most {} characters (got {})", field, max, actual)]
    TooLong {
        /// Field being validated
        field: String,
        /// Maximum character count
        max: usize,
        /// Character count received
        actual: usize,
    },
    /// Numeric setting outside its allowed range
    #[display("{} must be between {} and {} (got {})", field, min, max, actual)]
    OutOfRange {
        /// Setting being validated
        field: String,
        /// Lower bound, inclusive
        min: usize,
        /// Upper bound, inclusive
        max: usize,
        /// Value received
        actual: usize,
    },
}

/// Validation error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Validation Error: {} at line {} in {}", kind, line, file)]
pub struct ValidationError {
    /// The rule that was violated
    pub kind: ValidationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new validation error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ValidationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
