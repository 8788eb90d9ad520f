//! Conversation state types

use crate::persona::Persona;
use std::sync::Arc;

/// Conversation state
///
/// `Idle -> Submitted -> Generating -> Idle`. There is no cancellation path
/// once generation has started.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChatState {
    /// Ready for user input, no pending operations
    #[default]
    Idle,

    /// Submission accepted and the busy indicator rendered; the exchange
    /// runs on the next processing step
    Submitted { text: String },

    /// User turn appended, generation request in flight
    Generating,
}

impl ChatState {
    /// True between an accepted submit and the completion of its exchange
    pub fn is_sending(&self) -> bool {
        !matches!(self, ChatState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatState::Idle => "idle",
            ChatState::Submitted { .. } => "submitted",
            ChatState::Generating => "generating",
        }
    }
}

/// Default number of transcript entries sent with each request
pub const DEFAULT_CONTEXT_TURNS: usize = 5;

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub session_id: String,
    pub persona: Arc<Persona>,
    /// Most recent transcript entries sent to the provider
    pub context_turns: usize,
    /// Append provider failure details to the generic error message
    pub show_error_detail: bool,
}

impl ChatContext {
    pub fn new(session_id: impl Into<String>, persona: Arc<Persona>) -> Self {
        Self {
            session_id: session_id.into(),
            persona,
            context_turns: DEFAULT_CONTEXT_TURNS,
            show_error_detail: false,
        }
    }

    pub fn with_context_turns(mut self, turns: usize) -> Self {
        self.context_turns = turns;
        self
    }

    pub fn with_error_detail(mut self, show: bool) -> Self {
        self.show_error_detail = show;
        self
    }
}
