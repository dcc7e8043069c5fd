//! Trait seams between the StoryBot core and its collaborators.

mod gateway;
mod provider;
mod store;

pub use gateway::MessagingGateway;
pub use provider::{ImageProvider, ImageRequest, TextProvider, TextRequest, TextRequestBuilder};
pub use store::ContentStore;
