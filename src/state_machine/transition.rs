//! Pure state transition function

use super::{ChatContext, ChatState, Effect, Event, FailureKind, GenerationFailure};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is already in progress")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
/// Every path out of `Generating` lands in `Idle`, so the sending flag
/// cannot stay set after a provider failure.
pub fn transition(
    state: &ChatState,
    context: &ChatContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Idle + blank Submit -> Idle, nothing happens
        (ChatState::Idle, Event::Submit { text }) if text.trim().is_empty() => {
            Ok(TransitionResult::new(ChatState::Idle))
        }

        // Idle + Submit -> Submitted: render busy state first, exchange later
        (ChatState::Idle, Event::Submit { text }) => {
            Ok(TransitionResult::new(ChatState::Submitted { text: text.clone() })
                .with_effect(Effect::SetPendingInput { text })
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::NotifyRender)
                .with_effect(Effect::ScheduleProcessing))
        }

        // Busy states + Submit -> Reject
        (ChatState::Submitted { .. } | ChatState::Generating, Event::Submit { .. }) => {
            Err(TransitionError::Busy)
        }

        // Submitted + ProcessPending -> Generating
        (ChatState::Submitted { text }, Event::ProcessPending) => {
            Ok(TransitionResult::new(ChatState::Generating)
                .with_effect(Effect::append_user(text.clone()))
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::RequestGeneration))
        }

        // Generating + GenerationComplete -> Idle, success or failure alike
        (ChatState::Generating, Event::GenerationComplete { outcome }) => {
            let reply = match outcome {
                Ok(text) => text,
                Err(failure) => failure_message(context, &failure),
            };
            Ok(TransitionResult::new(ChatState::Idle)
                .with_effect(Effect::append_model(reply))
                .with_effect(Effect::ClearPendingInput)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::NotifyRender))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} with event {event:?}",
            state.name()
        ))),
    }
}

/// Text of the model turn recorded for a failed exchange
fn failure_message(context: &ChatContext, failure: &GenerationFailure) -> String {
    let persona = &context.persona;
    match failure.kind {
        FailureKind::QuotaExceeded => persona.quota_message.clone(),
        FailureKind::ProviderError if context.show_error_detail && !failure.detail.is_empty() => {
            format!("{}\n({})", persona.error_message, failure.detail)
        }
        FailureKind::ProviderError => persona.error_message.clone(),
    }
}
