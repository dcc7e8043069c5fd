//! Messaging transport trait.

use async_trait::async_trait;
use storybot_core::OutboundMessage;
use storybot_error::GatewayError;

/// Delivers outbound messages to users.
///
/// Inbound turns are fed to the dispatcher by whatever owns the transport.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Sends one message.
    async fn deliver(&self, message: OutboundMessage) -> Result<(), GatewayError>;
}
