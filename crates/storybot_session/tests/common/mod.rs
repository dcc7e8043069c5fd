//! Test doubles for conversation tests.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storybot_core::{
    Book, BookId, Chapter, ChapterId, Character, CharacterId, IllustrationRef, InboundPayload,
    NewBook, NewChapter, NewCharacter, OutboundMessage, SessionId,
};
use storybot_error::{
    GatewayError, ProviderError, ProviderErrorKind, StoreError, StoreErrorKind, StorybotResult,
};
use storybot_generation::{
    GeneratedReference, GenerationCoordinator, GenerationServices, GenerationSettings, JobInput,
    JobOutput, JobRunner,
};
use storybot_interface::{
    ContentStore, ImageProvider, ImageRequest, MessagingGateway, TextProvider, TextRequest,
};
use storybot_session::{Session, SessionMachine, Transition};
use storybot_storage::{IllustrationArchive, InMemoryContentStore};
use tokio::sync::Semaphore;

pub const CHAPTER_TEXT: &str =
    "Murka climbed the old oak.\n\n[ILLUSTRATION: Murka on a high branch at sunset]\n\nRex barked below.";

pub const COMPLETE_DESCRIPTION: &str = "A small ginger cat with green eyes who is brave and curious";

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([30, 144, 255, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("PNG encoding");
    out.into_inner()
}

/// Text provider that always answers with the same text.
pub struct StaticText {
    pub reply: String,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl StaticText {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl TextProvider for StaticText {
    fn name(&self) -> &str {
        "static-text"
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .expect("Prompt lock")
            .push(request.prompt().clone());
        Ok(self.reply.clone())
    }
}

/// Image provider that returns a PNG, or fails every call.
pub struct StaticImage {
    pub fail: bool,
    pub calls: Arc<AtomicUsize>,
}

impl StaticImage {
    pub fn working() -> Self {
        Self {
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ImageProvider for StaticImage {
    fn name(&self) -> &str {
        "static-image"
    }

    fn supports_references(&self) -> bool {
        true
    }

    async fn generate_image(&self, _request: &ImageRequest) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ProviderError::new(ProviderErrorKind::Api {
                status: 503,
                message: "overloaded".to_string(),
            }))
        } else {
            Ok(png_bytes(16, 16))
        }
    }
}

/// Job runner that holds every job until a permit is added to its gate.
pub struct GatedRunner {
    pub gate: Arc<Semaphore>,
    pub finished: Arc<AtomicUsize>,
}

impl GatedRunner {
    pub fn closed() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl JobRunner for GatedRunner {
    async fn run(&self, input: JobInput) -> StorybotResult<JobOutput> {
        let _permit = self.gate.acquire().await.expect("Gate open");
        self.finished.fetch_add(1, Ordering::SeqCst);
        let prompt = match input {
            JobInput::CharacterReference { name, .. } => format!("portrait of {}", name),
            other => format!("{:?}", other.kind()),
        };
        Ok(JobOutput::Reference(GeneratedReference {
            image: png_bytes(4, 4),
            prompt,
        }))
    }
}

/// Gateway that records every delivered message.
#[derive(Default)]
pub struct RecordingGateway {
    pub delivered: Mutex<Vec<OutboundMessage>>,
}

impl RecordingGateway {
    pub fn texts(&self) -> Vec<String> {
        self.delivered
            .lock()
            .expect("Delivery lock")
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), GatewayError> {
        self.delivered.lock().expect("Delivery lock").push(message);
        Ok(())
    }
}

/// In-memory store whose book writes fail, as a broken database would.
pub struct RejectingStore {
    pub inner: Arc<InMemoryContentStore>,
}

#[async_trait]
impl ContentStore for RejectingStore {
    async fn create_book(&self, _book: NewBook) -> StorybotResult<BookId> {
        Err(StoreError::new(StoreErrorKind::Persistence("disk full".to_string())).into())
    }

    async fn create_character(&self, character: NewCharacter) -> StorybotResult<CharacterId> {
        self.inner.create_character(character).await
    }

    async fn create_chapter(&self, chapter: NewChapter) -> StorybotResult<ChapterId> {
        self.inner.create_chapter(chapter).await
    }

    async fn get_book(&self, id: BookId) -> StorybotResult<Option<Book>> {
        self.inner.get_book(id).await
    }

    async fn get_user_books(&self, owner: &SessionId) -> StorybotResult<Vec<Book>> {
        self.inner.get_user_books(owner).await
    }

    async fn get_book_characters(&self, id: BookId) -> StorybotResult<Vec<Character>> {
        self.inner.get_book_characters(id).await
    }

    async fn get_book_chapters(&self, id: BookId) -> StorybotResult<Vec<Chapter>> {
        self.inner.get_book_chapters(id).await
    }

    async fn save_character_reference(
        &self,
        id: CharacterId,
        image: Vec<u8>,
        prompt: String,
    ) -> StorybotResult<()> {
        self.inner.save_character_reference(id, image, prompt).await
    }

    async fn get_character_reference(&self, id: CharacterId) -> StorybotResult<Option<Vec<u8>>> {
        self.inner.get_character_reference(id).await
    }

    async fn update_chapter_illustration(
        &self,
        id: ChapterId,
        illustration: IllustrationRef,
    ) -> StorybotResult<()> {
        self.inner.update_chapter_illustration(id, illustration).await
    }
}

/// A machine wired to an in-memory store and static providers.
pub struct Harness {
    pub machine: SessionMachine,
    pub store: Arc<InMemoryContentStore>,
    pub session: Session,
    pub image: Arc<StaticImage>,
    pub text: Arc<StaticText>,
    _dir: tempfile::TempDir,
}

impl Harness {
    /// Harness whose jobs run through the real generation services.
    pub fn new() -> Self {
        Self::build(StaticImage::working(), None, false)
    }

    /// Harness whose image provider always fails.
    pub fn with_failing_images() -> Self {
        Self::build(StaticImage::failing(), None, false)
    }

    /// Harness whose jobs run through `runner` instead of the services.
    pub fn with_runner(runner: Arc<dyn JobRunner>) -> Self {
        Self::build(StaticImage::working(), Some(runner), false)
    }

    /// Harness whose machine cannot commit books.
    pub fn with_rejecting_store() -> Self {
        Self::build(StaticImage::working(), None, true)
    }

    fn build(image: StaticImage, runner: Option<Arc<dyn JobRunner>>, reject_books: bool) -> Self {
        let dir = tempfile::tempdir().expect("Temp dir");
        let store = Arc::new(InMemoryContentStore::new());
        let content: Arc<dyn ContentStore> = if reject_books {
            Arc::new(RejectingStore {
                inner: Arc::clone(&store),
            })
        } else {
            Arc::clone(&store) as Arc<dyn ContentStore>
        };
        let text = Arc::new(StaticText::new(CHAPTER_TEXT));
        let image = Arc::new(image);

        let settings = GenerationSettings::builder()
            .provider_timeout(Duration::from_secs(5))
            .job_timeout(Duration::from_secs(10))
            .translate(false)
            .build();
        let services = GenerationServices::new(
            settings,
            vec![Arc::clone(&text) as Arc<dyn TextProvider>],
            vec![Arc::clone(&image) as Arc<dyn ImageProvider>],
            Arc::clone(&store) as Arc<dyn ContentStore>,
            IllustrationArchive::new(dir.path()),
        );

        let runner = runner.unwrap_or_else(|| Arc::new(services.clone()) as Arc<dyn JobRunner>);
        let coordinator = GenerationCoordinator::new(runner, Duration::from_secs(10));
        let machine = SessionMachine::new(
            content,
            coordinator,
            Arc::clone(services.chapters()),
        );

        Self {
            machine,
            store,
            session: Session::new(SessionId::new("user-1")),
            image,
            text,
            _dir: dir,
        }
    }

    pub async fn text(&mut self, text: &str) -> Transition {
        self.machine
            .handle_input(&mut self.session, InboundPayload::Text(text.to_string()))
            .await
    }

    pub async fn press(&mut self, token: &str) -> Transition {
        self.machine
            .handle_input(&mut self.session, InboundPayload::Callback(token.to_string()))
            .await
    }

    /// Walks the creation flow up to the character menu with one character.
    pub async fn up_to_character_menu(&mut self, title: &str) -> Transition {
        self.text("/start").await;
        self.press(storybot_session::tokens::CREATE_BOOK).await;
        self.text(title).await;
        self.text("A cat and a dog explore the forest").await;
        self.text("Murka").await;
        self.text(COMPLETE_DESCRIPTION).await
    }
}

/// Concatenated text of every reply in a transition.
pub fn reply_text(transition: &Transition) -> String {
    transition
        .replies()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every choice token offered in a transition.
pub fn tokens_offered(transition: &Transition) -> Vec<String> {
    transition
        .replies()
        .flat_map(|r| r.choices.iter().map(|c| c.token.clone()))
        .collect()
}
