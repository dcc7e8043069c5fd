//! Google Gemini text and image generation.

mod client;
mod dto;

pub use client::{GEMINI_BASE_URL, GeminiClient, image_request_body};
pub use dto::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    InlineData, Part,
};
