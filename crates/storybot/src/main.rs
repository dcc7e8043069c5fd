//! StoryBot console runner.
//!
//! Reads turns from standard input and prints replies to standard output.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use storybot::{ConsoleGateway, StoryBot, StorybotConfig, init_logging, run_console};
use storybot_core::SessionId;
use tracing::info;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "storybot")]
#[command(about = "Write illustrated stories in a conversation")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to ./storybot.toml when present)
    #[arg(short, long, env = "STORYBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Conversation id used for console turns
    #[arg(long, default_value = "console")]
    session: String,

    /// Validate configuration and providers, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = StorybotConfig::load(args.config.as_deref())?;
    init_logging(config.log())?;
    info!(config_file = ?args.config, "Starting StoryBot");

    let bot = StoryBot::from_config(config, Arc::new(ConsoleGateway::stdout()))?;
    if args.check {
        info!("Configuration is valid");
        return Ok(());
    }

    let eviction = bot.spawn_eviction();
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let turns = run_console(bot.dispatcher(), SessionId::new(args.session), input).await?;
    eviction.abort();

    info!(turns, "StoryBot stopped");
    Ok(())
}
