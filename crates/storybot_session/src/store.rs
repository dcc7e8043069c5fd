//! Process-wide map of live sessions.

use crate::Session;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use storybot_core::{SessionId, UserSettings};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Shared handle to one session. Holding its lock serialises that user's turns.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Live sessions keyed by id, created on first contact and evicted when idle.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    idle_timeout: Duration,
    defaults: UserSettings,
}

impl SessionStore {
    /// Creates an empty store.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            defaults: UserSettings::default(),
        }
    }

    /// Settings given to newly created sessions.
    pub fn with_defaults(mut self, defaults: UserSettings) -> Self {
        self.defaults = defaults;
        self
    }

    /// Returns the session for `id`, creating it on first contact.
    pub async fn session(&self, id: &SessionId) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(id) {
            return Arc::clone(handle);
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions.entry(id.clone()).or_insert_with(|| {
            debug!(session = %id, "Created session");
            Arc::new(Mutex::new(Session::with_settings(id.clone(), self.defaults)))
        });
        Arc::clone(handle)
    }

    /// Whether a session exists for `id`.
    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Removes sessions idle for at least the configured timeout.
    ///
    /// Sessions in the middle of a turn are locked and therefore kept.
    /// Returns how many sessions were removed.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.idle_for() < self.idle_timeout,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }
}
