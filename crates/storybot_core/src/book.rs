//! Book records.

use crate::{BookId, SessionId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A book owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Book {
    /// Store-assigned identifier
    id: BookId,
    /// Session that created the book
    owner: SessionId,
    /// Title, 3 to 100 characters
    title: String,
    /// Premise or description of the story
    description: String,
    /// Creation time
    created_at: DateTime<Utc>,
}

impl Book {
    /// Materialises a new record from its draft.
    pub fn from_new(id: BookId, new: NewBook) -> Self {
        Self {
            id,
            owner: new.owner,
            title: new.title,
            description: new.description,
            created_at: Utc::now(),
        }
    }
}

/// Fields needed to create a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct NewBook {
    /// Owning session
    pub owner: SessionId,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
}

impl NewBook {
    /// Returns a builder for constructing a NewBook.
    pub fn builder() -> NewBookBuilder {
        NewBookBuilder::default()
    }
}
