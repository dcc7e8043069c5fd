//! Chapter records and illustration references.

use crate::{BookId, ChapterId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a generated illustration lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum IllustrationRef {
    /// Remote URL returned by a provider
    #[display("{}", _0)]
    Url(String),
    /// Local file written by the illustration archive
    #[display("{}", _0.display())]
    Path(PathBuf),
}

/// A numbered chapter of a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Chapter {
    id: ChapterId,
    book_id: BookId,
    /// 1-based position in the book
    number: u32,
    title: String,
    content: String,
    /// Scene prompts the illustrations were requested with
    illustration_prompts: Vec<String>,
    /// Canonical illustration, if any succeeded
    illustration: Option<IllustrationRef>,
    word_count: usize,
    created_at: DateTime<Utc>,
}

impl Chapter {
    /// Materialises a new record from its draft.
    pub fn from_new(id: ChapterId, new: NewChapter) -> Self {
        Self {
            id,
            book_id: new.book_id,
            number: new.number,
            title: new.title,
            content: new.content,
            illustration_prompts: new.illustration_prompts,
            illustration: None,
            word_count: new.word_count,
            created_at: Utc::now(),
        }
    }

    /// Records the canonical illustration.
    pub fn set_illustration(&mut self, illustration: IllustrationRef) {
        self.illustration = Some(illustration);
    }
}

/// Fields needed to create a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct NewChapter {
    /// Owning book
    pub book_id: BookId,
    /// 1-based chapter number
    pub number: u32,
    /// Display title
    pub title: String,
    /// Chapter prose with markers removed
    pub content: String,
    /// Scene prompts for illustrations
    #[builder(default)]
    pub illustration_prompts: Vec<String>,
    /// Word count of `content`
    pub word_count: usize,
}

impl NewChapter {
    /// Returns a builder for constructing a NewChapter.
    pub fn builder() -> NewChapterBuilder {
        NewChapterBuilder::default()
    }
}
