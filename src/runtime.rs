//! Runtime for executing conversations
//!
//! One actor per visitor session. Each actor owns its session state and is
//! the only writer to it, so exchanges within a session never overlap.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{build_generation_request, ChatRuntime, SubmitRequest};
pub use traits::*;

use crate::persona::Persona;
use crate::session::{SessionFlags, SessionView};
use crate::state_machine::{ChatContext, TransitionError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

/// Settings shared by every session runtime
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub persona: Arc<Persona>,
    pub context_turns: usize,
    pub show_error_detail: bool,
}

/// Manager for all session runtimes
pub struct RuntimeManager {
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn GenerationClient>,
    settings: RuntimeSettings,
    runtimes: RwLock<HashMap<String, SessionHandle>>,
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub submit_tx: mpsc::Sender<SubmitRequest>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    shutdown: CancellationToken,
}

/// Why a submission was not accepted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("A reply is already in progress")]
    Busy,
    #[error("Session runtime is not available")]
    Unavailable,
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init {
        transcript_html: String,
        flags: SessionFlags,
    },
    Render {
        transcript_html: String,
        flags: SessionFlags,
    },
    Error {
        message: String,
    },
}

impl RuntimeManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        generator: Arc<dyn GenerationClient>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            store,
            generator,
            settings,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    pub fn persona(&self) -> &Arc<Persona> {
        &self.settings.persona
    }

    /// Get or create a runtime for a session
    pub async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        // Marks the session active before the handle is looked up, so a
        // concurrent sweep cannot drop a session that is about to be used
        let session = self.store.get_or_create(session_id).await;

        // Check if already running
        if let Some(handle) = self.runtimes.read().await.get(session_id) {
            return handle.clone();
        }

        let mut runtimes = self.runtimes.write().await;
        // Another request may have started it while we waited for the lock
        if let Some(handle) = runtimes.get(session_id) {
            return handle.clone();
        }

        let context = ChatContext::new(session_id, self.settings.persona.clone())
            .with_context_turns(self.settings.context_turns)
            .with_error_detail(self.settings.show_error_detail);

        let (submit_tx, submit_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(64);
        let shutdown = CancellationToken::new();

        let runtime = ChatRuntime::new(
            context,
            session,
            self.store.clone(),
            self.generator.clone(),
            submit_rx,
            event_rx,
            event_tx,
            broadcast_tx.clone(),
            shutdown.clone(),
        );

        // Start runtime in background
        let id = session_id.to_string();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(session_id = %id, "Session runtime finished");
        });

        let handle = SessionHandle {
            submit_tx,
            broadcast_tx,
            shutdown,
        };
        runtimes.insert(session_id.to_string(), handle.clone());
        handle
    }

    /// Hand a submission to the session's runtime and wait until it has
    /// been accepted or rejected
    pub async fn submit(&self, session_id: &str, text: String) -> Result<(), SubmitError> {
        let handle = self.get_or_create(session_id).await;
        let (ack, accepted) = oneshot::channel();
        handle
            .submit_tx
            .send(SubmitRequest { text, ack })
            .await
            .map_err(|_| SubmitError::Unavailable)?;

        match accepted.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(TransitionError::Busy)) => Err(SubmitError::Busy),
            Ok(Err(TransitionError::InvalidTransition(_))) | Err(_) => {
                Err(SubmitError::Unavailable)
            }
        }
    }

    /// Subscribe to session updates
    pub async fn subscribe(&self, session_id: &str) -> broadcast::Receiver<SseEvent> {
        self.get_or_create(session_id).await.broadcast_tx.subscribe()
    }

    /// Current read-only view; creates the session on first visit
    pub async fn view(&self, session_id: &str) -> SessionView {
        self.store.get_or_create(session_id).await.view()
    }

    /// Abandon sessions idle for longer than `ttl`. In-flight exchanges of
    /// those sessions are dropped with them.
    pub async fn sweep_expired(&self, ttl: Duration) -> usize {
        let candidates = self.store.idle_sessions(ttl).await;
        if candidates.is_empty() {
            return 0;
        }

        let mut runtimes = self.runtimes.write().await;
        let mut removed = 0;
        for id in &candidates {
            // Activity since the scan keeps the session
            if !self.store.remove_if_idle(id, ttl).await {
                continue;
            }
            if let Some(handle) = runtimes.remove(id) {
                handle.shutdown.cancel();
            }
            removed += 1;
        }
        if removed > 0 {
            tracing::info!(count = removed, "Expired idle sessions");
        }
        removed
    }

    #[cfg(test)]
    pub async fn active_sessions(&self) -> usize {
        self.runtimes.read().await.len()
    }
}
