//! Per-user conversation state.

use std::time::Duration;
use storybot_core::{BookId, DraftBook, DraftCharacter, SessionId, UserSettings};
use storybot_generation::JobRegistry;
use tokio::time::Instant;

/// Where a user is in the conversation. One state is active per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Idle; every flow starts and ends here
    #[default]
    MainMenu,
    /// Waiting for the new book's title
    AwaitingBookTitle,
    /// Waiting for the new book's description
    AwaitingBookDescription,
    /// Waiting for a character name
    AwaitingCharacterName,
    /// Waiting for a character description
    AwaitingCharacterDescription,
    /// Waiting for the answer to a clarification question
    AwaitingCharacterClarification,
    /// Offering to add another character or finish the book
    CharacterMenu,
    /// Offering automatic or hinted chapter generation
    AwaitingChapterChoice,
    /// Waiting for a chapter hint
    AwaitingChapterHint,
}

/// Conversation state of one user.
///
/// Owned by the session store and only touched while its lock is held.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    /// Book being created
    pub draft_book: Option<DraftBook>,
    /// Characters completed in this flow, in creation order
    pub draft_characters: Vec<DraftCharacter>,
    /// Character currently being described
    pub current_character: Option<DraftCharacter>,
    /// Book targeted by the chapter flow
    pub active_book: Option<BookId>,
    /// Background jobs launched for this session
    pub pending_jobs: JobRegistry,
    /// Generation preferences, kept across flows
    pub settings: UserSettings,
    last_active: Instant,
}

impl Session {
    /// Creates a session in [`SessionState::MainMenu`] with default settings.
    pub fn new(id: SessionId) -> Self {
        Self::with_settings(id, UserSettings::default())
    }

    /// Creates a session with the given starting settings.
    pub fn with_settings(id: SessionId, settings: UserSettings) -> Self {
        Self {
            id,
            state: SessionState::MainMenu,
            draft_book: None,
            draft_characters: Vec::new(),
            current_character: None,
            active_book: None,
            pending_jobs: JobRegistry::new(),
            settings,
            last_active: Instant::now(),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Records activity now.
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Drops every draft and returns to the main menu.
    ///
    /// Tracked jobs are left alone; the caller decides whether to join or
    /// cancel them first. Settings survive.
    pub fn clear_flow(&mut self) {
        self.draft_book = None;
        self.draft_characters.clear();
        self.current_character = None;
        self.active_book = None;
        self.state = SessionState::MainMenu;
    }
}
