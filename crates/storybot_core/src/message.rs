//! Transport-neutral conversation messages.

use crate::{IllustrationRef, SessionId};
use serde::{Deserialize, Serialize};

/// What the user sent in one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundPayload {
    /// Free text or a slash command
    Text(String),
    /// Opaque token attached to a button the user pressed
    Callback(String),
}

/// One inbound user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Conversation the turn belongs to
    pub session: SessionId,
    /// Turn content
    pub payload: InboundPayload,
}

impl InboundEvent {
    /// Convenience constructor for a text turn.
    pub fn text(session: impl Into<SessionId>, text: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            payload: InboundPayload::Text(text.into()),
        }
    }

    /// Convenience constructor for a button press.
    pub fn callback(session: impl Into<SessionId>, token: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            payload: InboundPayload::Callback(token.into()),
        }
    }
}

/// A selectable option rendered under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Text shown to the user
    pub label: String,
    /// Token returned as [`InboundPayload::Callback`]
    pub token: String,
}

impl Choice {
    /// Creates a choice.
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// One message sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Recipient conversation
    pub session: SessionId,
    /// Message body
    pub text: String,
    /// Buttons, possibly empty
    pub choices: Vec<Choice>,
    /// Attached images
    pub media: Vec<IllustrationRef>,
}
