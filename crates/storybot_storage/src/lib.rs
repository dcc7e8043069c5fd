//! Storage for StoryBot: an in-memory content store and an on-disk
//! illustration archive.

mod archive;
mod memory;

pub use archive::IllustrationArchive;
pub use memory::InMemoryContentStore;
