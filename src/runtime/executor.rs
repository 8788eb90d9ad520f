//! Per-session conversation runtime

use super::traits::{GenerationClient, SessionStore};
use super::SseEvent;

use crate::llm::{LlmMessage, LlmRequest};
use crate::persona::Persona;
use crate::render;
use crate::session::{Session, Turn};
use crate::state_machine::{
    transition, ChatContext, Effect, Event, GenerationFailure, TransitionError,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A visitor submission; `ack` learns whether it was accepted
#[derive(Debug)]
pub struct SubmitRequest {
    pub text: String,
    pub ack: oneshot::Sender<Result<(), TransitionError>>,
}

/// Conversation runtime for one visitor, generic over storage and provider
pub struct ChatRuntime<S, G>
where
    S: SessionStore + 'static,
    G: GenerationClient + ?Sized + 'static,
{
    context: ChatContext,
    session: Session,
    store: S,
    generator: Arc<G>,
    submit_rx: mpsc::Receiver<SubmitRequest>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    shutdown: CancellationToken,
}

impl<S, G> ChatRuntime<S, G>
where
    S: SessionStore + 'static,
    G: GenerationClient + ?Sized + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: ChatContext,
        session: Session,
        store: S,
        generator: Arc<G>,
        submit_rx: mpsc::Receiver<SubmitRequest>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context,
            session,
            store,
            generator,
            submit_rx,
            event_rx,
            event_tx,
            broadcast_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting chat runtime");

        // Process events in a loop until the session is abandoned
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(request) = self.submit_rx.recv() => {
                    let result = self.dispatch(Event::Submit { text: request.text }).await;
                    let _ = request.ack.send(result);
                }
                Some(event) = self.event_rx.recv() => {
                    let _ = self.dispatch(event).await;
                }
                else => break,
            }
        }

        tracing::info!(session_id = %self.context.session_id, "Chat runtime stopped");
    }

    /// Process an event, reporting a rejection to subscribers
    async fn dispatch(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = self.process_event(event).await;
        if let Err(e) = &result {
            let _ = self.broadcast_tx.send(SseEvent::Error {
                message: e.to_string(),
            });
        }
        result
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = match transition(&self.session.state, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                match &e {
                    TransitionError::Busy => {
                        tracing::debug!(session_id = %self.context.session_id, "Submission rejected while sending");
                    }
                    TransitionError::InvalidTransition(msg) => {
                        tracing::warn!(session_id = %self.context.session_id, error = %msg, "Ignoring event");
                    }
                }
                return Err(e);
            }
        };

        if result.new_state != self.session.state {
            tracing::debug!(
                session_id = %self.context.session_id,
                from = self.session.state.name(),
                to = result.new_state.name(),
                "State transition"
            );
        }
        self.session.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect).await;
        }

        Ok(())
    }

    /// Execute an effect. Failures are logged, never propagated: the state
    /// machine has already moved on and must not be left half-applied.
    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::SetPendingInput { text } => {
                self.session.pending_input = text;
            }

            Effect::ClearPendingInput => {
                self.session.pending_input.clear();
            }

            Effect::AppendTurn { turn } => {
                self.session.transcript.push(turn);
            }

            Effect::PersistSession => {
                if let Err(e) = self.store.save(&self.session).await {
                    tracing::warn!(session_id = %self.context.session_id, error = %e, "Failed to persist session");
                }
            }

            Effect::NotifyRender => {
                let _ = self.broadcast_tx.send(SseEvent::Render {
                    transcript_html: render::render_transcript(&self.session.transcript),
                    flags: self.session.flags(),
                });
            }

            Effect::ScheduleProcessing => {
                // Runs after everything already queued, including the render
                // that was just broadcast
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let _ = event_tx.send(Event::ProcessPending).await;
                });
            }

            Effect::RequestGeneration => {
                let request = build_generation_request(
                    &self.context.persona,
                    self.session.transcript.context_window(self.context.context_turns),
                );
                let generator = self.generator.clone();
                let event_tx = self.event_tx.clone();
                let session_id = self.context.session_id.clone();
                let transcript_turns = self.session.transcript.len();

                tokio::spawn(async move {
                    tracing::info!(
                        session_id = %session_id,
                        transcript_turns,
                        request_turns = request.messages.len(),
                        "Requesting generation (background)"
                    );

                    let outcome = match generator.generate(&request).await {
                        Ok(response) => Ok(response.text),
                        Err(e) => {
                            tracing::warn!(session_id = %session_id, kind = ?e.kind, error = %e, "Generation failed");
                            Err(GenerationFailure::from(e))
                        }
                    };
                    let _ = event_tx.send(Event::GenerationComplete { outcome }).await;
                });
            }
        }
    }
}

/// Persona prompt followed by the windowed transcript, oldest first
pub fn build_generation_request(persona: &Persona, window: &[Turn]) -> LlmRequest {
    let messages = std::iter::once(persona.prompt_message())
        .chain(
            window
                .iter()
                .map(|turn| LlmMessage::text(turn.role().into(), turn.text())),
        )
        .collect();

    LlmRequest { messages }
}
