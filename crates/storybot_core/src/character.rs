//! Characters, both persisted and in-progress drafts.

use crate::{BookId, CharacterId, JobId};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A character attached to a persisted book.
///
/// Records created before free-form descriptions existed carry the
/// `description` / `appearance` / `personality` triple instead of
/// `full_description`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Character {
    id: CharacterId,
    book_id: BookId,
    name: String,
    full_description: Option<String>,
    description: Option<String>,
    appearance: Option<String>,
    personality: Option<String>,
    reference_image: Option<Vec<u8>>,
    reference_prompt: Option<String>,
}

impl Character {
    /// Materialises a new record from its draft.
    pub fn from_new(id: CharacterId, new: NewCharacter) -> Self {
        Self {
            id,
            book_id: new.book_id,
            name: new.name,
            full_description: new.full_description,
            description: new.description,
            appearance: new.appearance,
            personality: new.personality,
            reference_image: None,
            reference_prompt: None,
        }
    }

    /// Whether a visual reference has been stored for this character.
    pub fn has_reference(&self) -> bool {
        self.reference_image.is_some()
    }

    /// Attaches a reference image and the prompt that produced it.
    pub fn set_reference(&mut self, image: Vec<u8>, prompt: impl Into<String>) {
        self.reference_image = Some(image);
        self.reference_prompt = Some(prompt.into());
    }

    /// Description used in prompts: the free-form text when present,
    /// otherwise the legacy fields joined together.
    pub fn prompt_description(&self) -> String {
        if let Some(full) = self.full_description.as_deref().filter(|s| !s.trim().is_empty()) {
            return full.to_string();
        }

        let mut parts = Vec::new();
        if let Some(d) = self.description.as_deref().filter(|s| !s.is_empty()) {
            parts.push(d.to_string());
        }
        if let Some(a) = self.appearance.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("Appearance: {}", a));
        }
        if let Some(p) = self.personality.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("Personality: {}", p));
        }
        parts.join(". ")
    }
}

/// Fields needed to create a character.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into), default)]
pub struct NewCharacter {
    /// Book the character belongs to
    pub book_id: BookId,
    /// Display name
    pub name: String,
    /// Merged free-form description
    #[builder(setter(into, strip_option))]
    pub full_description: Option<String>,
    /// Legacy short description
    #[builder(setter(into, strip_option))]
    pub description: Option<String>,
    /// Legacy appearance field
    #[builder(setter(into, strip_option))]
    pub appearance: Option<String>,
    /// Legacy personality field
    #[builder(setter(into, strip_option))]
    pub personality: Option<String>,
}

impl NewCharacter {
    /// Returns a builder for constructing a NewCharacter.
    pub fn builder() -> NewCharacterBuilder {
        NewCharacterBuilder::default()
    }
}

/// Progress of a character's reference image generation.
///
/// Moves forward only: `NotStarted -> Pending -> {Ready, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReferenceStatus {
    /// No job launched yet
    #[default]
    NotStarted,
    /// Job launched, not yet joined
    Pending,
    /// Reference image available
    Ready,
    /// Generation failed; the character has no reference
    Failed,
}

impl ReferenceStatus {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ReferenceStatus) -> bool {
        use ReferenceStatus::*;
        matches!(
            (self, next),
            (NotStarted, Pending) | (Pending, Ready) | (Pending, Failed)
        )
    }
}

/// A character being defined inside a session, before the book is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftCharacter {
    /// Display name
    pub name: String,
    /// Text the user typed first
    pub original_description: String,
    /// Answer to the clarification question, if one was asked
    pub clarification_answer: Option<String>,
    /// Description used for generation
    pub full_description: String,
    reference_status: ReferenceStatus,
    /// Job producing the reference image
    pub reference_job: Option<JobId>,
}

impl DraftCharacter {
    /// Starts a draft with a name and its first description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            name: name.into(),
            full_description: description.clone(),
            original_description: description,
            clarification_answer: None,
            reference_status: ReferenceStatus::NotStarted,
            reference_job: None,
        }
    }

    /// Merges a clarification answer into the full description.
    pub fn apply_clarification(&mut self, answer: impl Into<String>) {
        let answer = answer.into();
        self.full_description = format!("{}. {}", self.original_description, answer);
        self.clarification_answer = Some(answer);
    }

    /// Current reference status.
    pub fn reference_status(&self) -> ReferenceStatus {
        self.reference_status
    }

    /// Advances the reference status, rejecting backward or skipping moves.
    ///
    /// Returns `false` and leaves the status unchanged when the move is illegal.
    pub fn advance_reference(&mut self, next: ReferenceStatus) -> bool {
        if self.reference_status.can_transition_to(next) {
            self.reference_status = next;
            true
        } else {
            warn!(
                character = %self.name,
                from = %self.reference_status,
                to = %next,
                "Rejected reference status transition"
            );
            false
        }
    }
}

/// Draft book fields collected before commit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DraftBook {
    /// Title
    pub title: String,
    /// Description, empty until entered
    pub description: String,
}
