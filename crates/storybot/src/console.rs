//! Line-oriented terminal transport for local runs.
//!
//! Each input line is one turn. A line starting with `!` presses the button
//! whose token follows, e.g. `!create_book`.

use async_trait::async_trait;
use storybot_core::{InboundEvent, OutboundMessage, SessionId};
use storybot_error::{GatewayError, StorybotResult};
use storybot_interface::MessagingGateway;
use storybot_session::Dispatcher;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Writes outbound messages as plain text.
pub struct ConsoleGateway<W> {
    out: Mutex<W>,
}

impl ConsoleGateway<tokio::io::Stdout> {
    /// Gateway writing to standard output.
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleGateway<W> {
    /// Gateway writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> MessagingGateway for ConsoleGateway<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn deliver(&self, message: OutboundMessage) -> Result<(), GatewayError> {
        let rendered = render(&message);
        let mut out = self.out.lock().await;
        out.write_all(rendered.as_bytes())
            .await
            .map_err(|e| GatewayError::new(format!("Failed to write message: {}", e)))?;
        out.flush()
            .await
            .map_err(|e| GatewayError::new(format!("Failed to flush output: {}", e)))
    }
}

/// Text form of a message: body, attached images, then buttons.
pub fn render(message: &OutboundMessage) -> String {
    let mut text = format!("{}\n", message.text);
    for media in &message.media {
        text.push_str(&format!("[image] {}\n", media));
    }
    for choice in &message.choices {
        text.push_str(&format!("  !{}  {}\n", choice.token, choice.label));
    }
    text.push('\n');
    text
}

/// Turns an input line into an event; blank lines are ignored.
pub fn parse_line(session: &SessionId, line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.strip_prefix('!') {
        Some(token) => Some(InboundEvent::callback(session.clone(), token.trim())),
        None => Some(InboundEvent::text(session.clone(), line)),
    }
}

/// Feeds every line of `input` to the dispatcher until end of input.
///
/// Returns the number of turns handled.
#[instrument(skip(dispatcher, input), fields(session = %session))]
pub async fn run_console<R>(
    dispatcher: &Dispatcher,
    session: SessionId,
    input: R,
) -> StorybotResult<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut turns = 0;
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| GatewayError::new(format!("Failed to read input: {}", e)))?
    {
        let Some(event) = parse_line(&session, &line) else {
            continue;
        };
        dispatcher.dispatch(event).await;
        turns += 1;
    }
    debug!(turns, "Input closed");
    Ok(turns)
}
