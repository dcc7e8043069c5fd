//! The conversation state machine.
//!
//! [`SessionMachine::handle_input`] consumes one user turn for a locked
//! [`Session`] and returns the next state plus the effects the turn
//! produced. Invalid input is answered in the same state; any failure that
//! cannot be recovered inside the turn drops the flow and returns the user to
//! the main menu.

use crate::completeness::{KeywordTable, check_completeness, clarification_question};
use crate::{Session, SessionState, ValidationRules};
use std::collections::HashMap;
use std::sync::Arc;
use storybot_core::{
    Book, BookId, CHAPTER_WORDS_RANGE, ChapterId, Choice, DraftBook, DraftCharacter,
    ILLUSTRATIONS_RANGE, IllustrationRef, InboundPayload, JobId, NewBook, NewCharacter,
    OutboundMessage, ReferenceStatus, SessionId, UserSettings,
};
use storybot_error::{StoreError, StorybotResult, ValidationError};
use storybot_generation::{
    BatchOutcome, ChapterPipeline, GenerationCoordinator, JobInput, JobKind, JobOutput,
};
use storybot_interface::ContentStore;
use tracing::{debug, error, info, instrument, warn};

/// Callback tokens attached to choices.
pub mod tokens {
    use storybot_core::BookId;

    /// Start the book creation flow
    pub const CREATE_BOOK: &str = "create_book";
    /// Describe another character
    pub const ADD_CHARACTER: &str = "add_character";
    /// Commit the book and its characters
    pub const FINISH_CHARACTERS: &str = "finish_characters";
    /// Write the next chapter of the most recent book
    pub const CONTINUE_BOOK: &str = "continue_book";
    /// Write the chapter without a hint
    pub const AUTO_GENERATE: &str = "auto_generate";
    /// Give a hint before the chapter is written
    pub const GIVE_HINT: &str = "give_hint";
    /// Abandon the current flow
    pub const MAIN_MENU: &str = "main_menu";
    /// List the user's books
    pub const MY_BOOKS: &str = "my_books";

    const CREATE_CHAPTER_PREFIX: &str = "create_chapter:";
    const BOOK_PREFIX: &str = "book:";

    /// Token starting the chapter flow for a book.
    pub fn create_chapter(book: BookId) -> String {
        format!("{}{}", CREATE_CHAPTER_PREFIX, book)
    }

    /// Token opening a book's overview.
    pub fn open_book(book: BookId) -> String {
        format!("{}{}", BOOK_PREFIX, book)
    }

    pub(crate) fn parse_create_chapter(token: &str) -> Option<BookId> {
        token.strip_prefix(CREATE_CHAPTER_PREFIX).and_then(BookId::parse)
    }

    pub(crate) fn parse_open_book(token: &str) -> Option<BookId> {
        token.strip_prefix(BOOK_PREFIX).and_then(BookId::parse)
    }
}

const WELCOME: &str = "Welcome to StoryBot! Let's write an illustrated story together.";
const MAIN_MENU_LEAD: &str = "What would you like to do?";
const CANCELLED: &str = "Cancelled. Nothing from that flow was saved.";
const NOTHING_TO_CANCEL: &str = "There is nothing to cancel.";
const UNAVAILABLE: &str = "That option is not available right now.";
const FINISH_FIRST: &str = "Please finish the current step or send /cancel first.";
const UNKNOWN_COMMAND: &str = "Unknown command. Send /help to see what I understand.";
const NO_BOOKS: &str = "You have no books yet.";
const NOT_FOUND: &str = "I couldn't find that book any more.";
const GENERIC_FAILURE: &str = "Something went wrong on my side. Let's start again from the menu.";
const HELP: &str = "I help you write illustrated stories.\n\n\
    Create a book, describe its characters and I will draw a reference portrait of each one. \
    Then ask for chapters, with or without a hint about what happens next.\n\n\
    Commands:\n\
    /start - main menu\n\
    /cancel - abandon the current step\n\
    /settings - show chapter settings\n\
    /chapter_size N - target words per chapter\n\
    /chapter_pics N - illustrations per chapter\n\
    /reset_settings - restore default settings\n\
    /help - this message";

/// A message to show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message body
    pub text: String,
    /// Buttons, possibly empty
    pub choices: Vec<Choice>,
    /// Attached images
    pub media: Vec<IllustrationRef>,
}

impl Reply {
    /// Plain text reply.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
            media: Vec::new(),
        }
    }

    /// Sets the buttons.
    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    /// Sets the attached images.
    pub fn with_media(mut self, media: Vec<IllustrationRef>) -> Self {
        self.media = media;
        self
    }

    /// Addresses the reply to a session.
    pub fn into_outbound(self, session: SessionId) -> OutboundMessage {
        OutboundMessage {
            session,
            text: self.text,
            choices: self.choices,
            media: self.media,
        }
    }
}

/// Something a turn did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Message for the user
    Reply(Reply),
    /// Background job started
    JobLaunched {
        /// Job identifier
        id: JobId,
        /// Job kind
        kind: JobKind,
    },
    /// Draft book and characters written to the content store
    BookCommitted(BookId),
    /// Chapter written to the content store
    ChapterCreated(ChapterId),
}

/// Outcome of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the turn
    pub next: SessionState,
    /// Effects in the order they happened
    pub effects: Vec<Effect>,
}

impl Transition {
    /// Replies produced by the turn.
    pub fn replies(&self) -> impl Iterator<Item = &Reply> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Reply(reply) => Some(reply),
            _ => None,
        })
    }

    /// Jobs launched by the turn.
    pub fn launched(&self) -> Vec<JobId> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::JobLaunched { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Start,
    Cancel,
    Help,
    Settings,
    ChapterSize(Option<usize>),
    ChapterPics(Option<usize>),
    ResetSettings,
    Unknown(String),
}

impl Command {
    fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default().to_lowercase();
        // Telegram-style "/start@botname"
        let name = name.split('@').next().unwrap_or_default();
        let number = words.next().and_then(|w| w.parse::<usize>().ok());

        Some(match name {
            "start" => Command::Start,
            "cancel" => Command::Cancel,
            "help" => Command::Help,
            "settings" => Command::Settings,
            "chapter_size" => Command::ChapterSize(number),
            "chapter_pics" => Command::ChapterPics(number),
            "reset_settings" => Command::ResetSettings,
            other => Command::Unknown(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    CreateBook,
    AddCharacter,
    FinishCharacters,
    ContinueBook,
    AutoGenerate,
    GiveHint,
    MainMenu,
    MyBooks,
    CreateChapter(BookId),
    OpenBook(BookId),
}

impl Action {
    fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let action = match token {
            tokens::CREATE_BOOK => Action::CreateBook,
            tokens::ADD_CHARACTER => Action::AddCharacter,
            tokens::FINISH_CHARACTERS => Action::FinishCharacters,
            tokens::CONTINUE_BOOK => Action::ContinueBook,
            tokens::AUTO_GENERATE => Action::AutoGenerate,
            tokens::GIVE_HINT => Action::GiveHint,
            tokens::MAIN_MENU => Action::MainMenu,
            tokens::MY_BOOKS => Action::MyBooks,
            other => {
                if let Some(book) = tokens::parse_create_chapter(other) {
                    Action::CreateChapter(book)
                } else if let Some(book) = tokens::parse_open_book(other) {
                    Action::OpenBook(book)
                } else {
                    return None;
                }
            }
        };
        Some(action)
    }

    /// Typed menu entries such as "create book" act like the button.
    fn from_text(text: &str) -> Option<Self> {
        let normalized = text
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        Self::parse(&normalized)
    }
}

/// Drives sessions through the book, character and chapter flows.
pub struct SessionMachine {
    store: Arc<dyn ContentStore>,
    coordinator: GenerationCoordinator,
    chapters: Arc<ChapterPipeline>,
    rules: ValidationRules,
    keywords: KeywordTable,
    defaults: UserSettings,
}

impl std::fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine")
            .field("coordinator", &self.coordinator)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl SessionMachine {
    /// Creates a machine with default validation rules and keywords.
    pub fn new(
        store: Arc<dyn ContentStore>,
        coordinator: GenerationCoordinator,
        chapters: Arc<ChapterPipeline>,
    ) -> Self {
        Self {
            store,
            coordinator,
            chapters,
            rules: ValidationRules::default(),
            keywords: KeywordTable::default(),
            defaults: UserSettings::default(),
        }
    }

    /// Replaces the validation rules.
    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Replaces the completeness keywords.
    pub fn with_keywords(mut self, keywords: KeywordTable) -> Self {
        self.keywords = keywords;
        self
    }

    /// Replaces the settings restored by `/reset_settings`.
    pub fn with_default_settings(mut self, defaults: UserSettings) -> Self {
        self.defaults = defaults;
        self
    }

    /// Coordinator used for background jobs.
    pub fn coordinator(&self) -> &GenerationCoordinator {
        &self.coordinator
    }

    /// Handles one turn.
    ///
    /// Never fails: unrecoverable errors reset the flow and produce a
    /// failure reply with a way back to the menu.
    #[instrument(skip_all, fields(session = %session.id(), state = %session.state()))]
    pub async fn handle_input(
        &self,
        session: &mut Session,
        payload: InboundPayload,
    ) -> Transition {
        session.touch();
        let mut effects = Vec::new();

        if let Err(e) = self.step(session, payload, &mut effects).await {
            error!(error = %e, "Turn failed, returning to main menu");
            self.abandon(session);
            let lead = if e.is_not_found() {
                NOT_FOUND
            } else {
                GENERIC_FAILURE
            };
            let reply = self.menu_reply(session, lead).await;
            effects.push(Effect::Reply(reply));
        }

        let next = session.state();
        debug!(next = %next, effects = effects.len(), "Turn handled");
        Transition { next, effects }
    }

    async fn step(
        &self,
        session: &mut Session,
        payload: InboundPayload,
        effects: &mut Vec<Effect>,
    ) -> StorybotResult<()> {
        match payload {
            InboundPayload::Text(text) => {
                let text = text.trim();
                match Command::parse(text) {
                    Some(command) => self.command(session, command, effects).await,
                    None => self.text(session, text, effects).await,
                }
            }
            InboundPayload::Callback(token) => match Action::parse(&token) {
                Some(action) => self.action(session, action, effects).await,
                None => {
                    warn!(token = %token, "Unknown callback token");
                    self.reprompt(session, UNAVAILABLE, effects).await;
                    Ok(())
                }
            },
        }
    }

    async fn command(
        &self,
        session: &mut Session,
        command: Command,
        effects: &mut Vec<Effect>,
    ) -> StorybotResult<()> {
        debug!(?command, "Command");
        match command {
            Command::Start => {
                self.abandon(session);
                effects.push(Effect::Reply(self.menu_reply(session, WELCOME).await));
            }
            Command::Cancel => {
                let lead = if session.state() == SessionState::MainMenu {
                    NOTHING_TO_CANCEL
                } else {
                    self.abandon(session);
                    CANCELLED
                };
                effects.push(Effect::Reply(self.menu_reply(session, lead).await));
            }
            Command::Help => effects.push(Effect::Reply(Reply::new(HELP))),
            Command::Settings => {
                effects.push(Effect::Reply(Reply::new(settings_summary(&session.settings))))
            }
            Command::Unknown(name) => {
                debug!(command = %name, "Unknown command");
                effects.push(Effect::Reply(Reply::new(UNKNOWN_COMMAND)));
            }
            _ if session.state() != SessionState::MainMenu => {
                self.reprompt(session, FINISH_FIRST, effects).await;
            }
            Command::ChapterSize(words) => {
                let text = match words {
                    None => format!(
                        "Usage: /chapter_size N, where N is between {} and {} words.",
                        CHAPTER_WORDS_RANGE.start(),
                        CHAPTER_WORDS_RANGE.end()
                    ),
                    Some(words) => match session.settings.set_chapter_words(words) {
                        Ok(()) => format!("Chapters will be about {} words long.", words),
                        Err(e) => rejection(&e),
                    },
                };
                effects.push(Effect::Reply(Reply::new(text)));
            }
            Command::ChapterPics(count) => {
                let text = match count {
                    None => format!(
                        "Usage: /chapter_pics N, where N is between {} and {}.",
                        ILLUSTRATIONS_RANGE.start(),
                        ILLUSTRATIONS_RANGE.end()
                    ),
                    Some(count) => match session.settings.set_illustrations(count) {
                        Ok(()) => format!("Each chapter will get {} illustration(s).", count),
                        Err(e) => rejection(&e),
                    },
                };
                effects.push(Effect::Reply(Reply::new(text)));
            }
            Command::ResetSettings => {
                session.settings = self.defaults;
                effects.push(Effect::Reply(Reply::new(format!(
                    "Settings restored.\n{}",
                    settings_summary(&session.settings)
                ))));
            }
        }
        Ok(())
    }

    async fn action(
        &self,
        session: &mut Session,
        action: Action,
        effects: &mut Vec<Effect>,
    ) -> StorybotResult<()> {
        debug!(?action, "Action");
        match (session.state(), action) {
            (_, Action::MainMenu) => {
                self.abandon(session);
                effects.push(Effect::Reply(self.menu_reply(session, MAIN_MENU_LEAD).await));
            }
            (SessionState::MainMenu, Action::CreateBook) => {
                session.draft_book = Some(DraftBook::default());
                self.enter(session, SessionState::AwaitingBookTitle, effects);
            }
            (SessionState::MainMenu, Action::MyBooks) => self.list_books(session, effects).await?,
            (SessionState::MainMenu, Action::OpenBook(book)) => {
                self.show_book(session, book, effects).await?
            }
            (SessionState::MainMenu, Action::CreateChapter(book)) => {
                self.start_chapter(session, book, effects).await?
            }
            (SessionState::MainMenu, Action::ContinueBook) => {
                let books = self.store.get_user_books(session.id()).await?;
                match books.iter().max_by_key(|b| *b.created_at()) {
                    Some(latest) => self.start_chapter(session, *latest.id(), effects).await?,
                    None => effects.push(Effect::Reply(self.menu_reply(session, NO_BOOKS).await)),
                }
            }
            (SessionState::CharacterMenu, Action::AddCharacter) => {
                self.enter(session, SessionState::AwaitingCharacterName, effects);
            }
            (SessionState::CharacterMenu, Action::FinishCharacters) => {
                self.finish_book(session, effects).await?
            }
            (SessionState::AwaitingChapterChoice, Action::AutoGenerate) => {
                self.write_chapter(session, "", effects).await?
            }
            (SessionState::AwaitingChapterChoice, Action::GiveHint) => {
                self.enter(session, SessionState::AwaitingChapterHint, effects);
            }
            (state, action) => {
                debug!(%state, ?action, "Action not available in this state");
                self.reprompt(session, UNAVAILABLE, effects).await;
            }
        }
        Ok(())
    }

    async fn text(
        &self,
        session: &mut Session,
        text: &str,
        effects: &mut Vec<Effect>,
    ) -> StorybotResult<()> {
        match session.state() {
            SessionState::MainMenu => match Action::from_text(text) {
                Some(action) => return self.action(session, action, effects).await,
                None => effects.push(Effect::Reply(self.menu_reply(session, MAIN_MENU_LEAD).await)),
            },
            SessionState::AwaitingBookTitle => {
                if let Err(e) = self.rules.check_title(text) {
                    reject(e, effects);
                    return Ok(());
                }
                session.draft_book.get_or_insert_with(DraftBook::default).title = text.to_string();
                self.enter(session, SessionState::AwaitingBookDescription, effects);
            }
            SessionState::AwaitingBookDescription => {
                if let Err(e) = self.rules.check_book_description(text) {
                    reject(e, effects);
                    return Ok(());
                }
                session
                    .draft_book
                    .get_or_insert_with(DraftBook::default)
                    .description = text.to_string();
                self.enter(session, SessionState::AwaitingCharacterName, effects);
            }
            SessionState::AwaitingCharacterName => {
                if let Err(e) = self.rules.check_character_name(text) {
                    reject(e, effects);
                    return Ok(());
                }
                session.current_character = Some(DraftCharacter::new(text, ""));
                self.enter(session, SessionState::AwaitingCharacterDescription, effects);
            }
            SessionState::AwaitingCharacterDescription => {
                if let Err(e) = self.rules.check_character_description(text) {
                    reject(e, effects);
                    return Ok(());
                }
                let name = session
                    .current_character
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                let draft = DraftCharacter::new(name, text);
                let completeness = check_completeness(&self.keywords, text);

                if completeness.is_complete() {
                    self.complete_character(session, draft, effects);
                } else {
                    debug!(missing = ?completeness.missing, "Description incomplete");
                    let question = clarification_question(&draft.name, &completeness.missing);
                    session.current_character = Some(draft);
                    session.set_state(SessionState::AwaitingCharacterClarification);
                    effects.push(Effect::Reply(Reply::new(question)));
                }
            }
            SessionState::AwaitingCharacterClarification => {
                if let Err(e) = self.rules.check_clarification(text) {
                    reject(e, effects);
                    return Ok(());
                }
                match session.current_character.take() {
                    Some(mut draft) => {
                        draft.apply_clarification(text);
                        self.complete_character(session, draft, effects);
                    }
                    None => {
                        warn!("Clarification without a character, asking for a name");
                        self.enter(session, SessionState::AwaitingCharacterName, effects);
                    }
                }
            }
            SessionState::AwaitingChapterHint => self.write_chapter(session, text, effects).await?,
            SessionState::CharacterMenu | SessionState::AwaitingChapterChoice => {
                effects.push(Effect::Reply(self.prompt(session)));
            }
        }
        Ok(())
    }

    /// Appends the character, launches its reference job and offers the menu.
    fn complete_character(
        &self,
        session: &mut Session,
        draft: DraftCharacter,
        effects: &mut Vec<Effect>,
    ) {
        let name = draft.name.clone();
        let input = JobInput::CharacterReference {
            name: draft.name.clone(),
            description: draft.full_description.clone(),
        };

        session.current_character = None;
        session.draft_characters.push(draft);
        let id = self.coordinator.launch(&mut session.pending_jobs, input);
        if let Some(added) = session.draft_characters.last_mut() {
            added.reference_job = Some(id);
            added.advance_reference(ReferenceStatus::Pending);
        }
        effects.push(Effect::JobLaunched {
            id,
            kind: JobKind::CharacterReference,
        });

        info!(character = %name, job = %id, "Character added");
        session.set_state(SessionState::CharacterMenu);
        effects.push(Effect::Reply(
            Reply::new(format!(
                "{} has joined the story. I'm drawing a reference portrait in the background.\n\n\
                 Add another character or finish the book?",
                name
            ))
            .with_choices(character_menu_choices()),
        ));
    }

    /// Commits the draft, joins every reference job and stores the portraits.
    #[instrument(skip_all, fields(characters = session.draft_characters.len()))]
    async fn finish_book(
        &self,
        session: &mut Session,
        effects: &mut Vec<Effect>,
    ) -> StorybotResult<()> {
        let Some(draft) = session.draft_book.clone() else {
            warn!("Finish without a draft book");
            self.abandon(session);
            effects.push(Effect::Reply(self.menu_reply(session, GENERIC_FAILURE).await));
            return Ok(());
        };

        let book_id = self
            .store
            .create_book(NewBook {
                owner: session.id().clone(),
                title: draft.title.clone(),
                description: draft.description.clone(),
            })
            .await?;
        effects.push(Effect::BookCommitted(book_id));

        let mut committed = Vec::with_capacity(session.draft_characters.len());
        for character in &session.draft_characters {
            let new = NewCharacter {
                book_id,
                name: character.name.clone(),
                full_description: Some(character.full_description.clone()),
                ..NewCharacter::default()
            };
            committed.push(self.store.create_character(new).await?);
        }

        let mut outcomes: HashMap<JobId, _> = self
            .coordinator
            .await_all(&mut session.pending_jobs)
            .await
            .into_iter()
            .map(|result| (result.id, result.outcome))
            .collect();

        let mut ready = 0;
        for (character, character_id) in session.draft_characters.iter_mut().zip(&committed) {
            let outcome = character.reference_job.and_then(|job| outcomes.remove(&job));
            match outcome {
                Some(Ok(JobOutput::Reference(reference))) => {
                    self.store
                        .save_character_reference(*character_id, reference.image, reference.prompt)
                        .await?;
                    character.advance_reference(ReferenceStatus::Ready);
                    ready += 1;
                }
                Some(Ok(other)) => {
                    warn!(character = %character.name, output = ?other, "Unexpected reference output");
                    character.advance_reference(ReferenceStatus::Failed);
                }
                Some(Err(e)) => {
                    warn!(character = %character.name, error = %e, "Reference generation failed");
                    character.advance_reference(ReferenceStatus::Failed);
                }
                None => {
                    warn!(character = %character.name, "No reference job result");
                    character.advance_reference(ReferenceStatus::Failed);
                }
            }
        }

        let total = committed.len();
        info!(book = %book_id, characters = total, references = ready, "Book committed");
        session.clear_flow();

        effects.push(Effect::Reply(
            Reply::new(format!(
                "Your book \"{}\" is ready with {} character(s).\nReference portraits ready: {}/{}",
                draft.title, total, ready, total
            ))
            .with_choices(vec![
                Choice::new("Write the first chapter", tokens::create_chapter(book_id)),
                Choice::new("Main menu", tokens::MAIN_MENU),
            ]),
        ));
        Ok(())
    }

    async fn start_chapter(
        &self,
        session: &mut Session,
        book_id: BookId,
        effects: &mut Vec<Effect>,
    ) -> StorybotResult<()> {
        self.owned_book(session, book_id).await?;
        session.active_book = Some(book_id);
        self.enter(session, SessionState::AwaitingChapterChoice, effects);
        Ok(())
    }

    /// Runs the chapter pipeline and ends the flow, whatever the illustrations did.
    #[instrument(skip_all, fields(book = ?session.active_book, hinted = !hint.is_empty()))]
    async fn write_chapter(
        &self,
        session: &mut Session,
        hint: &str,
        effects: &mut Vec<Effect>,
    ) -> StorybotResult<()> {
        let book_id = session
            .active_book
            .ok_or_else(|| StoreError::not_found("book", "active"))?;

        let outcome = self
            .chapters
            .write_chapter(book_id, hint, &session.settings)
            .await?;
        let chapter = &outcome.chapter;
        effects.push(Effect::ChapterCreated(*chapter.id()));

        let mut text = format!("{}\n\n{}", chapter.title(), chapter.content());
        match outcome.batch.outcome() {
            BatchOutcome::Complete => {}
            BatchOutcome::Partial { succeeded, failed } => text.push_str(&format!(
                "\n\n({} of {} illustrations could not be drawn.)",
                failed,
                succeeded + failed
            )),
            BatchOutcome::Failed => {
                text.push_str("\n\n(The illustrations could not be drawn this time.)")
            }
        }
        let media = outcome.batch.successes().into_iter().cloned().collect();

        session.clear_flow();
        effects.push(Effect::Reply(
            Reply::new(text).with_media(media).with_choices(vec![
                Choice::new("Next chapter", tokens::create_chapter(book_id)),
                Choice::new("Main menu", tokens::MAIN_MENU),
            ]),
        ));
        Ok(())
    }

    async fn list_books(&self, session: &Session, effects: &mut Vec<Effect>) -> StorybotResult<()> {
        let mut books = self.store.get_user_books(session.id()).await?;
        if books.is_empty() {
            effects.push(Effect::Reply(self.menu_reply(session, NO_BOOKS).await));
            return Ok(());
        }

        books.sort_by_key(|b| *b.created_at());
        let mut choices: Vec<Choice> = books
            .iter()
            .map(|b| Choice::new(b.title().clone(), tokens::open_book(*b.id())))
            .collect();
        choices.push(Choice::new("Main menu", tokens::MAIN_MENU));
        effects.push(Effect::Reply(Reply::new("Your books:").with_choices(choices)));
        Ok(())
    }

    async fn show_book(
        &self,
        session: &Session,
        book_id: BookId,
        effects: &mut Vec<Effect>,
    ) -> StorybotResult<()> {
        let book = self.owned_book(session, book_id).await?;
        let characters = self.store.get_book_characters(book_id).await?;
        let chapters = self.store.get_book_chapters(book_id).await?;

        let names = characters
            .iter()
            .map(|c| c.name().as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!(
            "\"{}\"\n{}\n\nCharacters: {}\nChapters: {}",
            book.title(),
            book.description(),
            names,
            chapters.len()
        );
        effects.push(Effect::Reply(Reply::new(text).with_choices(vec![
            Choice::new(
                format!("Write chapter {}", chapters.len() + 1),
                tokens::create_chapter(book_id),
            ),
            Choice::new("Main menu", tokens::MAIN_MENU),
        ])));
        Ok(())
    }

    /// Loads a book the session owns; anyone else's book is reported missing.
    async fn owned_book(
        &self,
        session: &Session,
        book_id: BookId,
    ) -> StorybotResult<Book> {
        match self.store.get_book(book_id).await? {
            Some(book) if book.owner() == session.id() => Ok(book),
            _ => Err(StoreError::not_found("book", book_id).into()),
        }
    }

    /// Drops tracked jobs and drafts.
    fn abandon(&self, session: &mut Session) {
        let dropped = self.coordinator.cancel(&mut session.pending_jobs);
        if dropped > 0 || session.state() != SessionState::MainMenu {
            debug!(dropped, from = %session.state(), "Flow abandoned");
        }
        session.clear_flow();
    }

    fn enter(&self, session: &mut Session, state: SessionState, effects: &mut Vec<Effect>) {
        session.set_state(state);
        effects.push(Effect::Reply(self.prompt(session)));
    }

    async fn reprompt(&self, session: &Session, lead: &str, effects: &mut Vec<Effect>) {
        let reply = if session.state() == SessionState::MainMenu {
            self.menu_reply(session, lead).await
        } else {
            let prompt = self.prompt(session);
            Reply {
                text: format!("{}\n\n{}", lead, prompt.text),
                ..prompt
            }
        };
        effects.push(Effect::Reply(reply));
    }

    /// Question for the current non-menu state.
    fn prompt(&self, session: &Session) -> Reply {
        match session.state() {
            SessionState::MainMenu => Reply::new(MAIN_MENU_LEAD).with_choices(vec![Choice::new(
                "Create a new book",
                tokens::CREATE_BOOK,
            )]),
            SessionState::AwaitingBookTitle => Reply::new("What is the title of your book?"),
            SessionState::AwaitingBookDescription => {
                Reply::new("What is the book about? Describe the story in a few sentences.")
            }
            SessionState::AwaitingCharacterName => {
                if session.draft_characters.is_empty() {
                    Reply::new("Now let's meet the characters. What is the first character's name?")
                } else {
                    Reply::new("What is the next character's name?")
                }
            }
            SessionState::AwaitingCharacterDescription => {
                let name = session
                    .current_character
                    .as_ref()
                    .map(|c| c.name.as_str())
                    .unwrap_or("the character");
                Reply::new(format!(
                    "Describe {}: what do they look like and what are they like?",
                    name
                ))
            }
            SessionState::AwaitingCharacterClarification => match &session.current_character {
                Some(draft) => {
                    let missing =
                        check_completeness(&self.keywords, &draft.original_description).missing;
                    Reply::new(clarification_question(&draft.name, &missing))
                }
                None => Reply::new("Tell me a little more about the character."),
            },
            SessionState::CharacterMenu => Reply::new("Add another character or finish the book?")
                .with_choices(character_menu_choices()),
            SessionState::AwaitingChapterChoice => Reply::new(
                "Shall I write the next chapter on my own, or would you like to give me a hint?",
            )
            .with_choices(vec![
                Choice::new("Write it yourself", tokens::AUTO_GENERATE),
                Choice::new("I'll give a hint", tokens::GIVE_HINT),
                Choice::new("Main menu", tokens::MAIN_MENU),
            ]),
            SessionState::AwaitingChapterHint => {
                Reply::new("What should happen in the next chapter?")
            }
        }
    }

    /// Main menu, offering to continue when the user already has books.
    async fn menu_reply(&self, session: &Session, lead: &str) -> Reply {
        let has_books = match self.store.get_user_books(session.id()).await {
            Ok(books) => !books.is_empty(),
            Err(e) => {
                warn!(error = %e, "Could not list books for the menu");
                false
            }
        };

        let mut choices = vec![Choice::new("Create a new book", tokens::CREATE_BOOK)];
        if has_books {
            choices.push(Choice::new("Continue latest book", tokens::CONTINUE_BOOK));
            choices.push(Choice::new("My books", tokens::MY_BOOKS));
        }
        Reply::new(lead).with_choices(choices)
    }
}

fn character_menu_choices() -> Vec<Choice> {
    vec![
        Choice::new("Add another character", tokens::ADD_CHARACTER),
        Choice::new("Finish the book", tokens::FINISH_CHARACTERS),
    ]
}

fn settings_summary(settings: &UserSettings) -> String {
    format!(
        "Chapter size: {} words\nIllustrations per chapter: {}",
        settings.chapter_words(),
        settings.illustrations()
    )
}

fn rejection(error: &ValidationError) -> String {
    format!("Sorry, the {}. Please try again.", error.kind)
}

fn reject(error: ValidationError, effects: &mut Vec<Effect>) {
    debug!(error = %error, "Input rejected");
    effects.push(Effect::Reply(Reply::new(rejection(&error))));
}
