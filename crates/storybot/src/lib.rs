//! StoryBot: a conversational bot that writes illustrated stories.
//!
//! This crate wires the workspace together. It loads [`StorybotConfig`],
//! instantiates the providers named in the fallback chains, and exposes a
//! [`StoryBot`] whose dispatcher accepts inbound turns from any transport.
//! A [`ConsoleGateway`] is included for local runs.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storybot::{ConsoleGateway, StoryBot, StorybotConfig};
//! use storybot_core::InboundEvent;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorybotConfig::load(None)?;
//! let bot = StoryBot::from_config(config, Arc::new(ConsoleGateway::stdout()))?;
//! bot.dispatcher().dispatch(InboundEvent::text("me", "/start")).await;
//! # Ok(())
//! # }
//! ```

mod app;
pub mod config;
mod console;
mod logging;
mod providers;

pub use app::StoryBot;
pub use config::{
    ChainsConfig, GenerationConfig, LogConfig, LogFormat, ProviderConfig, ProvidersConfig,
    SessionConfig, StorybotConfig,
};
pub use console::{ConsoleGateway, parse_line, render, run_console};
pub use logging::init_logging;
pub use providers::ProviderSet;
