//! In-memory implementation of ContentStore.
//!
//! Stores records in HashMaps protected by an RwLock. All data is lost when
//! the store is dropped.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use storybot_core::{
    Book, BookId, Chapter, ChapterId, Character, CharacterId, IllustrationRef, NewBook,
    NewChapter, NewCharacter, SessionId,
};
use storybot_error::{StoreError, StorybotResult};
use storybot_interface::ContentStore;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct Tables {
    books: HashMap<BookId, Book>,
    characters: HashMap<CharacterId, Character>,
    /// Character ids per book in creation order
    book_characters: HashMap<BookId, Vec<CharacterId>>,
    chapters: HashMap<ChapterId, Chapter>,
    book_chapters: HashMap<BookId, Vec<ChapterId>>,
}

/// Content store backed by process memory.
///
/// # Example
/// ```no_run
/// use storybot_storage::InMemoryContentStore;
///
/// let store = InMemoryContentStore::new();
/// // Use store.create_book(), get_book_chapters(), etc.
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryContentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored books (for testing).
    pub async fn book_count(&self) -> usize {
        self.tables.read().await.books.len()
    }

    /// Number of stored chapters across all books (for testing).
    pub async fn chapter_count(&self) -> usize {
        self.tables.read().await.chapters.len()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    #[instrument(skip(self, book), fields(title = %book.title))]
    async fn create_book(&self, book: NewBook) -> StorybotResult<BookId> {
        let id = BookId::new();
        let mut tables = self.tables.write().await;
        tables.books.insert(id, Book::from_new(id, book));
        tables.book_characters.entry(id).or_default();
        tables.book_chapters.entry(id).or_default();
        debug!(book = %id, "Stored book");
        Ok(id)
    }

    #[instrument(skip(self, character), fields(name = %character.name))]
    async fn create_character(&self, character: NewCharacter) -> StorybotResult<CharacterId> {
        let mut tables = self.tables.write().await;
        let book_id = character.book_id;
        if !tables.books.contains_key(&book_id) {
            return Err(StoreError::not_found("book", book_id).into());
        }

        let id = CharacterId::new();
        tables
            .characters
            .insert(id, Character::from_new(id, character));
        tables.book_characters.entry(book_id).or_default().push(id);
        debug!(book = %book_id, character = %id, "Stored character");
        Ok(id)
    }

    #[instrument(skip(self, chapter), fields(number = chapter.number))]
    async fn create_chapter(&self, chapter: NewChapter) -> StorybotResult<ChapterId> {
        let mut tables = self.tables.write().await;
        let book_id = chapter.book_id;
        if !tables.books.contains_key(&book_id) {
            return Err(StoreError::not_found("book", book_id).into());
        }

        let id = ChapterId::new();
        tables.chapters.insert(id, Chapter::from_new(id, chapter));
        tables.book_chapters.entry(book_id).or_default().push(id);
        debug!(book = %book_id, chapter = %id, "Stored chapter");
        Ok(id)
    }

    async fn get_book(&self, id: BookId) -> StorybotResult<Option<Book>> {
        Ok(self.tables.read().await.books.get(&id).cloned())
    }

    async fn get_user_books(&self, owner: &SessionId) -> StorybotResult<Vec<Book>> {
        let tables = self.tables.read().await;
        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| b.owner() == owner)
            .cloned()
            .collect();
        books.sort_by(|a, b| b.created_at().cmp(a.created_at()));
        Ok(books)
    }

    async fn get_book_characters(&self, id: BookId) -> StorybotResult<Vec<Character>> {
        let tables = self.tables.read().await;
        Ok(tables
            .book_characters
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|c| tables.characters.get(c).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_book_chapters(&self, id: BookId) -> StorybotResult<Vec<Chapter>> {
        let tables = self.tables.read().await;
        let mut chapters: Vec<Chapter> = tables
            .book_chapters
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|c| tables.chapters.get(c).cloned())
                    .collect()
            })
            .unwrap_or_default();
        chapters.sort_by_key(|c| *c.number());
        Ok(chapters)
    }

    #[instrument(skip(self, image, prompt), fields(bytes = image.len()))]
    async fn save_character_reference(
        &self,
        id: CharacterId,
        image: Vec<u8>,
        prompt: String,
    ) -> StorybotResult<()> {
        let mut tables = self.tables.write().await;
        let character = tables
            .characters
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("character", id))?;
        character.set_reference(image, prompt);
        debug!(character = %id, "Stored reference image");
        Ok(())
    }

    async fn get_character_reference(&self, id: CharacterId) -> StorybotResult<Option<Vec<u8>>> {
        let tables = self.tables.read().await;
        let character = tables
            .characters
            .get(&id)
            .ok_or_else(|| StoreError::not_found("character", id))?;
        Ok(character.reference_image().clone())
    }

    #[instrument(skip(self))]
    async fn update_chapter_illustration(
        &self,
        id: ChapterId,
        illustration: IllustrationRef,
    ) -> StorybotResult<()> {
        let mut tables = self.tables.write().await;
        let chapter = tables
            .chapters
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("chapter", id))?;
        chapter.set_illustration(illustration);
        Ok(())
    }
}
