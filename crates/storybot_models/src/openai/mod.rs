//! OpenAI chat completions and image generation.

mod client;
mod dto;

pub use client::{DalleClient, OPENAI_BASE_URL, OpenAiClient, truncate_dalle_prompt};
pub use dto::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, ImageData, ImageGenerationRequest,
    ImageGenerationResponse,
};
