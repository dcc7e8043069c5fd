//! Length rules for free-text answers.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use storybot_error::{ValidationError, ValidationErrorKind};

/// Minimum and maximum character counts per prompt, measured on trimmed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct ValidationRules {
    title_min: usize,
    title_max: usize,
    book_description_min: usize,
    character_name_min: usize,
    character_description_min: usize,
    clarification_min: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            title_min: 3,
            title_max: 100,
            book_description_min: 10,
            character_name_min: 2,
            character_description_min: 10,
            clarification_min: 5,
        }
    }
}

impl ValidationRules {
    /// Book title.
    pub fn check_title(&self, input: &str) -> Result<(), ValidationError> {
        check_length("title", input, self.title_min, Some(self.title_max))
    }

    /// Book description.
    pub fn check_book_description(&self, input: &str) -> Result<(), ValidationError> {
        check_length("description", input, self.book_description_min, None)
    }

    /// Character name.
    pub fn check_character_name(&self, input: &str) -> Result<(), ValidationError> {
        check_length("name", input, self.character_name_min, None)
    }

    /// Character description.
    pub fn check_character_description(&self, input: &str) -> Result<(), ValidationError> {
        check_length(
            "character description",
            input,
            self.character_description_min,
            None,
        )
    }

    /// Answer to the clarification question.
    pub fn check_clarification(&self, input: &str) -> Result<(), ValidationError> {
        check_length("answer", input, self.clarification_min, None)
    }
}

fn check_length(
    field: &str,
    input: &str,
    min: usize,
    max: Option<usize>,
) -> Result<(), ValidationError> {
    let actual = input.trim().chars().count();
    if actual < min {
        return Err(ValidationError::new(ValidationErrorKind::TooShort {
            field: field.to_string(),
            min,
            actual,
        }));
    }
    match max {
        Some(max) if actual > max => Err(ValidationError::new(ValidationErrorKind::TooLong {
            field: field.to_string(),
            max,
            actual,
        })),
        _ => Ok(()),
    }
}
