//! In-memory per-visitor session storage
//!
//! Nothing survives a restart. Sessions are dropped once they have been
//! idle longer than the configured time-to-live.

use crate::session::Session;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

struct Entry {
    session: Session,
    last_active: Instant,
}

/// Session map guarded by an async lock
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).map(|e| e.session.clone())
    }

    /// Fetch a session, creating an empty one on first visit
    pub async fn get_or_create(&self, id: &str) -> Session {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id = %id, "Creating session");
            Entry {
                session: Session::new(id),
                last_active: Instant::now(),
            }
        });
        entry.last_active = Instant::now();
        entry.session.clone()
    }

    /// Overwrite a session. Fails if it has been removed in the meantime.
    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&session.id)
            .ok_or_else(|| StoreError::SessionNotFound(session.id.clone()))?;
        entry.session = session.clone();
        entry.last_active = Instant::now();
        Ok(())
    }

    /// Drop a session only if it is still idle for longer than `ttl`.
    /// Activity recorded after an `idle_sessions` scan keeps it alive.
    pub async fn remove_if_idle(&self, id: &str, ttl: Duration) -> bool {
        let mut sessions = self.sessions.write().await;
        let idle = sessions
            .get(id)
            .is_some_and(|e| e.last_active.elapsed() > ttl);
        if idle {
            sessions.remove(id);
        }
        idle
    }

    /// IDs of sessions untouched for longer than `ttl`
    pub async fn idle_sessions(&self, ttl: Duration) -> Vec<String> {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_active) > ttl)
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
