//! Generation provider clients for StoryBot.
//!
//! Each client implements [`storybot_interface::TextProvider`] or
//! [`storybot_interface::ImageProvider`] (Gemini implements both) so it can
//! be placed in a fallback chain.

mod gemini;
mod http;
mod openai;
mod throttle;

pub use gemini::{
    Candidate, Content, GEMINI_BASE_URL, GeminiClient, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, InlineData, Part, image_request_body,
};
pub use openai::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, DalleClient, ImageData,
    ImageGenerationRequest, ImageGenerationResponse, OPENAI_BASE_URL, OpenAiClient,
    truncate_dalle_prompt,
};
pub use throttle::{ProviderThrottle, ThrottleGuard};
