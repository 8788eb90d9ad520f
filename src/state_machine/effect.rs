//! Effects produced by state transitions

use crate::session::Turn;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Mirror the submitted text in the input control
    SetPendingInput { text: String },

    /// Empty the input control
    ClearPendingInput,

    /// Append a turn to the transcript
    AppendTurn { turn: Turn },

    /// Write the session back to the store
    PersistSession,

    /// Push a fresh render to connected clients
    NotifyRender,

    /// Post `ProcessPending` as the next processing step
    ScheduleProcessing,

    /// Call the generation provider with the current context window
    RequestGeneration,
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::user(text),
        }
    }

    pub fn append_model(text: impl Into<String>) -> Self {
        Effect::AppendTurn {
            turn: Turn::model(text),
        }
    }
}
