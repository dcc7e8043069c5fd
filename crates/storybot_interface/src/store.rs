//! Persistent content store trait.

use async_trait::async_trait;
use storybot_core::{
    Book, BookId, Chapter, ChapterId, Character, CharacterId, IllustrationRef, NewBook,
    NewChapter, NewCharacter, SessionId,
};
use storybot_error::StorybotResult;

/// Persistence for books, characters and chapters.
///
/// Each operation is atomic for the single record it touches. Callers must
/// not assume transactions spanning several calls.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persists a new book and returns its id.
    async fn create_book(&self, book: NewBook) -> StorybotResult<BookId>;

    /// Persists a new character and returns its id.
    async fn create_character(&self, character: NewCharacter) -> StorybotResult<CharacterId>;

    /// Persists a new chapter and returns its id.
    async fn create_chapter(&self, chapter: NewChapter) -> StorybotResult<ChapterId>;

    /// Loads a book, `None` if it does not exist.
    async fn get_book(&self, id: BookId) -> StorybotResult<Option<Book>>;

    /// Books owned by a session, newest first.
    async fn get_user_books(&self, owner: &SessionId) -> StorybotResult<Vec<Book>>;

    /// Characters of a book in creation order.
    async fn get_book_characters(&self, id: BookId) -> StorybotResult<Vec<Character>>;

    /// Chapters of a book ordered by number.
    async fn get_book_chapters(&self, id: BookId) -> StorybotResult<Vec<Chapter>>;

    /// Attaches a reference image and its prompt to a character.
    async fn save_character_reference(
        &self,
        id: CharacterId,
        image: Vec<u8>,
        prompt: String,
    ) -> StorybotResult<()>;

    /// Reference image of a character, `None` if it has none.
    async fn get_character_reference(&self, id: CharacterId) -> StorybotResult<Option<Vec<u8>>>;

    /// Sets the canonical illustration of a chapter.
    async fn update_chapter_illustration(
        &self,
        id: ChapterId,
        illustration: IllustrationRef,
    ) -> StorybotResult<()>;
}
