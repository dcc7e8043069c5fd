//! Content store error types.

/// Kinds of content store errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum StoreErrorKind {
    /// Referenced record does not exist
    #[display("{} not found: {}", entity, id)]
    NotFound {
        /// Record type, e.g. "book"
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },
    /// The backing store rejected a read or write
    #[display("Persistence failure: {}", _0)]
    Persistence(String),
    /// I/O error while writing media to disk
    #[display("I/O error: {}", _0)]
    Io(String),
}

/// Store error with location tracking.
///
/// # Examples
///
/// ```
/// use storybot_error::{StoreError, StoreErrorKind};
///
/// let err = StoreError::new(StoreErrorKind::NotFound { entity: "book", id: "42".into() });
/// assert!(format!("{}", err).contains("book not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Store Error: {} at line {} in {}", kind, line, file)]
pub struct StoreError {
    /// The kind of error that occurred
    pub kind: StoreErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StoreError {
    /// Create a new store error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StoreErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a missing record.
    #[track_caller]
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::new(StoreErrorKind::NotFound {
            entity,
            id: id.to_string(),
        })
    }
}
