//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

// ============================================================================
// Mock Generation Client
// ============================================================================

/// Mock generation client that returns queued responses
pub struct MockGenerationClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    requests: Mutex<Vec<LlmRequest>>,
    /// When set, each call waits for a `release()` before answering
    gate: Option<Notify>,
}

impl MockGenerationClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Calls block until `release()` is called once per call
    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::new()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(LlmResponse::text(text)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for MockGenerationClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmMessage, MessageRole};
    use crate::persona::Persona;
    use crate::runtime::{RuntimeManager, RuntimeSettings, SseEvent, SubmitError};
    use crate::session::{Session, SessionView, Turn};
    use crate::state_machine::ChatState;
    use crate::store::{InMemorySessionStore, StoreError};
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        manager: RuntimeManager,
        store: Arc<InMemorySessionStore>,
        client: Arc<MockGenerationClient>,
    }

    fn settings() -> RuntimeSettings {
        RuntimeSettings {
            persona: Arc::new(Persona::default()),
            context_turns: 5,
            show_error_detail: false,
        }
    }

    fn harness(client: MockGenerationClient) -> Harness {
        let store = Arc::new(InMemorySessionStore::new());
        let client = Arc::new(client);
        let manager = RuntimeManager::new(store.clone(), client.clone(), settings());
        Harness {
            manager,
            store,
            client,
        }
    }

    /// Poll the store until the session is idle with `turns` entries
    async fn wait_for_idle(store: &InMemorySessionStore, id: &str, turns: usize) -> SessionView {
        for _ in 0..200 {
            if let Some(session) = store.get(id).await {
                if session.state == ChatState::Idle && session.transcript.len() == turns {
                    return session.view();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session {id} did not settle with {turns} turns");
    }

    async fn wait_for_requests(client: &MockGenerationClient, count: usize) {
        for _ in 0..200 {
            if client.recorded_requests().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} generation requests");
    }

    #[tokio::test]
    async fn test_mock_generation_client() {
        let client = MockGenerationClient::new();
        client.queue_response("Hello!");

        let request = LlmRequest {
            messages: vec![LlmMessage::text(MessageRole::User, "Hi")],
        };

        let response = client.generate(&request).await.unwrap();
        assert_eq!(response.text, "Hello!");
        assert_eq!(client.recorded_requests().len(), 1);

        // Nothing queued -> error
        assert!(client.generate(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_fresh_session_single_exchange() {
        let h = harness(MockGenerationClient::new());
        h.client.queue_response("こんにちは！てらすくんだよ、てら！");

        h.manager.submit("s1", "こんにちは".to_string()).await.unwrap();
        let view = wait_for_idle(&h.store, "s1", 2).await;

        assert_eq!(
            view.turns.turns(),
            &[
                Turn::user("こんにちは"),
                Turn::model("こんにちは！てらすくんだよ、てら！")
            ]
        );
        assert!(!view.flags.sending);
        assert!(view.flags.pending_input.is_empty());

        let requests = h.client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0], Persona::default().prompt_message());
        assert_eq!(requests[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_quota_error_becomes_fixed_reply() {
        let h = harness(MockGenerationClient::new());
        h.client
            .queue_error(LlmError::rate_limit("429 RESOURCE_EXHAUSTED"));

        h.manager.submit("s1", "hello".to_string()).await.unwrap();
        let view = wait_for_idle(&h.store, "s1", 2).await;

        assert_eq!(
            view.turns.turns()[1],
            Turn::model(Persona::default().quota_message)
        );
        assert!(!view.flags.sending);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_generic_reply() {
        let h = harness(MockGenerationClient::new());
        h.client.queue_error(LlmError::network("connection refused"));

        h.manager.submit("s1", "hello".to_string()).await.unwrap();
        let view = wait_for_idle(&h.store, "s1", 2).await;

        assert_eq!(
            view.turns.turns()[1],
            Turn::model(Persona::default().error_message)
        );
        assert!(!view.flags.sending);
    }

    #[tokio::test]
    async fn test_context_window_is_last_five() {
        let h = harness(MockGenerationClient::new());
        for i in 1..=4 {
            h.client.queue_response(&format!("reply {i}"));
        }

        // Three exchanges -> 6 turns, then a 7th user message
        for i in 1..=3 {
            h.manager.submit("s1", format!("message {i}")).await.unwrap();
            wait_for_idle(&h.store, "s1", i * 2).await;
        }
        h.manager.submit("s1", "message 4".to_string()).await.unwrap();
        wait_for_idle(&h.store, "s1", 8).await;

        let requests = h.client.recorded_requests();
        let sizes: Vec<usize> = requests.iter().map(|r| r.messages.len() - 1).collect();
        assert_eq!(sizes, vec![1, 3, 5, 5]);

        // Entries 3..=7 of the transcript at the time of the call
        let last: Vec<&str> = requests[3].messages[1..]
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(
            last,
            vec!["message 2", "reply 2", "message 3", "reply 3", "message 4"]
        );
    }

    #[tokio::test]
    async fn test_second_submit_while_sending_is_rejected() {
        let h = harness(MockGenerationClient::gated());
        h.client.queue_response("first reply");
        h.client.queue_response("never used");

        let mut updates = h.manager.subscribe("s1").await;
        h.manager.submit("s1", "first".to_string()).await.unwrap();
        wait_for_requests(&h.client, 1).await;

        assert_eq!(
            h.manager.submit("s1", "second".to_string()).await,
            Err(SubmitError::Busy)
        );
        // The rejection is reported to subscribers too
        let rejected = loop {
            match tokio::time::timeout(Duration::from_secs(1), updates.recv()).await {
                Ok(Ok(SseEvent::Error { message })) => break message,
                Ok(Ok(_)) => {}
                other => panic!("no rejection observed: {other:?}"),
            }
        };
        assert!(rejected.contains("in progress"));

        let session = h.store.get("s1").await.unwrap();
        assert!(session.flags().sending);
        assert_eq!(session.flags().pending_input, "first");

        h.client.release();
        let view = wait_for_idle(&h.store, "s1", 2).await;
        assert_eq!(view.turns.turns()[0], Turn::user("first"));
        assert_eq!(view.turns.turns()[1], Turn::model("first reply"));
        assert_eq!(h.client.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_back_to_back_submit_is_busy_before_generation() {
        let h = harness(MockGenerationClient::gated());
        h.client.queue_response("only reply");

        // No waiting in between: the first submit is acknowledged only once
        // the session has left Idle
        h.manager.submit("s1", "first".to_string()).await.unwrap();
        assert_eq!(
            h.manager.submit("s1", "second".to_string()).await,
            Err(SubmitError::Busy)
        );

        h.client.release();
        let view = wait_for_idle(&h.store, "s1", 2).await;
        assert_eq!(view.turns.turns()[0], Turn::user("first"));
    }

    #[tokio::test]
    async fn test_busy_render_precedes_reply() {
        let h = harness(MockGenerationClient::new());
        h.client.queue_response("reply");

        let mut updates = h.manager.subscribe("s1").await;
        h.manager.submit("s1", "hi".to_string()).await.unwrap();

        let mut renders = Vec::new();
        while renders.len() < 2 {
            match tokio::time::timeout(Duration::from_secs(1), updates.recv()).await {
                Ok(Ok(SseEvent::Render { flags, .. })) => renders.push(flags),
                Ok(Ok(_)) => {}
                other => panic!("missing render: {other:?}"),
            }
        }

        assert!(renders[0].sending);
        assert_eq!(renders[0].pending_input, "hi");
        assert!(!renders[1].sending);
        assert!(renders[1].pending_input.is_empty());
    }

    #[tokio::test]
    async fn test_blank_submit_never_calls_provider() {
        let h = harness(MockGenerationClient::new());

        h.manager.submit("s1", "   ".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(h.client.recorded_requests().is_empty());
        let view = h.manager.view("s1").await;
        assert!(view.turns.is_empty());
        assert!(!view.flags.sending);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_transcripts() {
        let h = harness(MockGenerationClient::new());
        h.client.queue_response("for a");

        h.manager.submit("a", "from a".to_string()).await.unwrap();
        wait_for_idle(&h.store, "a", 2).await;

        let b = h.manager.view("b").await;
        assert!(b.turns.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_abandons_idle_sessions() {
        let h = harness(MockGenerationClient::new());
        h.manager.subscribe("s1").await;
        assert_eq!(h.manager.active_sessions().await, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = h.manager.sweep_expired(Duration::from_millis(5)).await;

        assert_eq!(removed, 1);
        assert_eq!(h.manager.active_sessions().await, 0);
        assert!(h.store.get("s1").await.is_none());
    }

    /// Store whose idle scan takes a while, leaving a window between the
    /// scan and the removal
    struct SlowScanStore {
        inner: Arc<InMemorySessionStore>,
        scan_delay: Duration,
    }

    #[async_trait]
    impl SessionStore for SlowScanStore {
        async fn get(&self, session_id: &str) -> Option<Session> {
            self.inner.get(session_id).await
        }

        async fn get_or_create(&self, session_id: &str) -> Session {
            self.inner.get_or_create(session_id).await
        }

        async fn save(&self, session: &Session) -> Result<(), StoreError> {
            self.inner.save(session).await
        }

        async fn remove_if_idle(&self, session_id: &str, ttl: Duration) -> bool {
            self.inner.remove_if_idle(session_id, ttl).await
        }

        async fn idle_sessions(&self, ttl: Duration) -> Vec<String> {
            let idle = self.inner.idle_sessions(ttl).await;
            tokio::time::sleep(self.scan_delay).await;
            idle
        }
    }

    #[tokio::test]
    async fn test_sweep_spares_session_used_after_scan() {
        let inner = Arc::new(InMemorySessionStore::new());
        let store = Arc::new(SlowScanStore {
            inner: inner.clone(),
            scan_delay: Duration::from_millis(40),
        });
        let client = Arc::new(MockGenerationClient::new());
        client.queue_response("reply");
        let manager = Arc::new(RuntimeManager::new(store, client.clone(), settings()));

        manager.subscribe("s1").await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        // The scan sees the session as idle, then the visitor submits
        let sweeper = manager.clone();
        let sweep =
            tokio::spawn(async move { sweeper.sweep_expired(Duration::from_millis(100)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.submit("s1", "hello".to_string()).await.unwrap();

        assert_eq!(sweep.await.unwrap(), 0);
        let view = wait_for_idle(&inner, "s1", 2).await;
        assert_eq!(view.turns.turns()[0], Turn::user("hello"));
        assert_eq!(view.turns.turns()[1], Turn::model("reply"));
        assert_eq!(manager.active_sessions().await, 1);
    }
}
