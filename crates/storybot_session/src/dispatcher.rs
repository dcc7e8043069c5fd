//! Routes inbound turns to their session and delivers the replies.

use crate::{SessionMachine, SessionStore, Transition};
use std::sync::Arc;
use std::time::Duration;
use storybot_core::InboundEvent;
use storybot_interface::MessagingGateway;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

/// Runs each turn under its session's lock, so turns of one user never
/// overlap while different users proceed concurrently.
#[derive(Clone)]
pub struct Dispatcher {
    sessions: Arc<SessionStore>,
    machine: Arc<SessionMachine>,
    gateway: Arc<dyn MessagingGateway>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sessions", &self.sessions)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher.
    pub fn new(
        sessions: Arc<SessionStore>,
        machine: Arc<SessionMachine>,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Self {
        Self {
            sessions,
            machine,
            gateway,
        }
    }

    /// Session store backing this dispatcher.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handles one turn and delivers its replies in order.
    ///
    /// Delivery failures are logged; the turn's state change stands.
    #[instrument(skip_all, fields(session = %event.session))]
    pub async fn dispatch(&self, event: InboundEvent) -> Transition {
        let handle = self.sessions.session(&event.session).await;
        let mut session = handle.lock().await;

        let transition = self.machine.handle_input(&mut session, event.payload).await;

        for reply in transition.replies() {
            let message = reply.clone().into_outbound(event.session.clone());
            if let Err(e) = self.gateway.deliver(message).await {
                error!(error = %e, "Failed to deliver reply");
            }
        }

        debug!(next = %transition.next, "Turn dispatched");
        transition
    }

    /// Spawns a task that evicts idle sessions every `interval`.
    pub fn spawn_eviction(&self, interval: Duration) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sessions.evict_idle().await;
            }
        })
    }
}
