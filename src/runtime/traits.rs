//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::session::Session;
use crate::store::{InMemorySessionStore, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Storage for per-visitor sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get a session if it exists
    async fn get(&self, session_id: &str) -> Option<Session>;

    /// Get a session, creating an empty one on first visit
    async fn get_or_create(&self, session_id: &str) -> Session;

    /// Write the session back
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Drop a session if it has been idle for longer than `ttl`, checked
    /// atomically; returns whether it was dropped
    async fn remove_if_idle(&self, session_id: &str, ttl: Duration) -> bool;

    /// Sessions idle for longer than `ttl`
    async fn idle_sessions(&self, ttl: Duration) -> Vec<String>;
}

/// Client for the external generation provider
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// One best-effort call: no retries, no backoff
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get(&self, session_id: &str) -> Option<Session> {
        (**self).get(session_id).await
    }

    async fn get_or_create(&self, session_id: &str) -> Session {
        (**self).get_or_create(session_id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        (**self).save(session).await
    }

    async fn remove_if_idle(&self, session_id: &str, ttl: Duration) -> bool {
        (**self).remove_if_idle(session_id, ttl).await
    }

    async fn idle_sessions(&self, ttl: Duration) -> Vec<String> {
        (**self).idle_sessions(ttl).await
    }
}

#[async_trait]
impl<T: GenerationClient + ?Sized> GenerationClient for Arc<T> {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).generate(request).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<Session> {
        InMemorySessionStore::get(self, session_id).await
    }

    async fn get_or_create(&self, session_id: &str) -> Session {
        InMemorySessionStore::get_or_create(self, session_id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        InMemorySessionStore::save(self, session).await
    }

    async fn remove_if_idle(&self, session_id: &str, ttl: Duration) -> bool {
        InMemorySessionStore::remove_if_idle(self, session_id, ttl).await
    }

    async fn idle_sessions(&self, ttl: Duration) -> Vec<String> {
        InMemorySessionStore::idle_sessions(self, ttl).await
    }
}

/// Adapter to use an `LlmService` as `GenerationClient`
pub struct ServiceGenerationClient {
    service: Option<Arc<dyn LlmService>>,
}

impl ServiceGenerationClient {
    /// `None` when no API key is configured; every call then fails as `Auth`
    pub fn new(service: Option<Arc<dyn LlmService>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl GenerationClient for ServiceGenerationClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| LlmError::auth("No generation model configured"))?;
        service.complete(request).await
    }
}
