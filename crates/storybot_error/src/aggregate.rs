//! Errors that summarise several underlying failures.

/// One failed provider attempt inside a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderAttempt {
    /// Provider name as reported by the client
    pub provider: String,
    /// Rendered failure for that provider
    pub error: String,
}

impl std::fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Aggregate failure conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AggregateErrorKind {
    /// Every provider in a chain failed
    ChainExhausted {
        /// "text" or "image"
        capability: String,
        /// Attempts in the order they were made
        attempts: Vec<ProviderAttempt>,
    },
    /// A chain was built with no providers
    EmptyChain(String),
    /// Every requested illustration failed
    AllIllustrationsFailed(usize),
    /// A background job panicked or missed its deadline
    JobAborted {
        /// Job identifier
        job: String,
        /// What happened to it
        reason: String,
    },
}

impl std::fmt::Display for AggregateErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateErrorKind::ChainExhausted {
                capability,
                attempts,
            } => {
                write!(
                    f,
                    "All {} {} providers failed",
                    attempts.len(),
                    capability
                )?;
                for attempt in attempts {
                    write!(f, "; {}", attempt)?;
                }
                Ok(())
            }
            AggregateErrorKind::EmptyChain(capability) => {
                write!(f, "No {} providers configured", capability)
            }
            AggregateErrorKind::AllIllustrationsFailed(count) => {
                write!(f, "All {} illustrations failed", count)
            }
            AggregateErrorKind::JobAborted { job, reason } => {
                write!(f, "Job {} aborted: {}", job, reason)
            }
        }
    }
}

/// Aggregate error with location tracking.
#[derive(Debug, Clone)]
pub struct AggregateError {
    /// The specific error condition
    pub kind: AggregateErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl AggregateError {
    /// Create a new AggregateError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: AggregateErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Aggregate Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for AggregateError {}
