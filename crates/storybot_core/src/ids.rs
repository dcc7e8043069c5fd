//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a persisted book.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
pub struct BookId(Uuid);

impl BookId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier from callback data.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a persisted character.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
pub struct CharacterId(Uuid);

impl CharacterId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a persisted chapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
pub struct ChapterId(Uuid);

impl ChapterId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChapterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a conversation, as assigned by the messaging transport.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a transport-specific user or chat id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a background generation job, unique per process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("job-{}", _0)]
pub struct JobId(u64);

impl JobId {
    /// Wraps a raw sequence number.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw sequence number.
    pub fn value(&self) -> u64 {
        self.0
    }
}
