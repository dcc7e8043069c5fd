//! Core data types for StoryBot.
//!
//! Books, characters and chapters as persisted by a content store, the draft
//! types a session builds up before committing, and the transport-neutral
//! message types exchanged with a messaging gateway.

mod book;
mod chapter;
mod character;
mod ids;
mod message;
mod settings;

pub use book::{Book, NewBook, NewBookBuilder};
pub use chapter::{Chapter, IllustrationRef, NewChapter, NewChapterBuilder};
pub use character::{
    Character, DraftBook, DraftCharacter, NewCharacter, NewCharacterBuilder, ReferenceStatus,
};
pub use ids::{BookId, ChapterId, CharacterId, JobId, SessionId};
pub use message::{Choice, InboundEvent, InboundPayload, OutboundMessage};
pub use settings::{CHAPTER_WORDS_RANGE, ILLUSTRATIONS_RANGE, UserSettings};
