//! Per-user generation preferences.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use storybot_error::{ValidationError, ValidationErrorKind};

/// Allowed target chapter lengths, in words.
pub const CHAPTER_WORDS_RANGE: RangeInclusive<usize> = 200..=1200;
/// Allowed illustrations per chapter.
pub const ILLUSTRATIONS_RANGE: RangeInclusive<usize> = 1..=3;

/// Generation preferences a user can change from the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    chapter_words: usize,
    illustrations: usize,
}

impl UserSettings {
    /// Creates settings, rejecting out-of-range values.
    pub fn new(chapter_words: usize, illustrations: usize) -> Result<Self, ValidationError> {
        let mut settings = Self::default();
        settings.set_chapter_words(chapter_words)?;
        settings.set_illustrations(illustrations)?;
        Ok(settings)
    }

    /// Target chapter length in words.
    pub fn chapter_words(&self) -> usize {
        self.chapter_words
    }

    /// Illustrations generated per chapter.
    pub fn illustrations(&self) -> usize {
        self.illustrations
    }

    /// Changes the target chapter length.
    pub fn set_chapter_words(&mut self, words: usize) -> Result<(), ValidationError> {
        check_range("chapter size", words, &CHAPTER_WORDS_RANGE)?;
        self.chapter_words = words;
        Ok(())
    }

    /// Changes the number of illustrations per chapter.
    pub fn set_illustrations(&mut self, count: usize) -> Result<(), ValidationError> {
        check_range("illustrations per chapter", count, &ILLUSTRATIONS_RANGE)?;
        self.illustrations = count;
        Ok(())
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            chapter_words: 600,
            illustrations: 1,
        }
    }
}

fn check_range(
    field: &str,
    value: usize,
    range: &RangeInclusive<usize>,
) -> Result<(), ValidationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(ValidationErrorKind::OutOfRange {
            field: field.to_string(),
            min: *range.start(),
            max: *range.end(),
            actual: value,
        }))
    }
}
