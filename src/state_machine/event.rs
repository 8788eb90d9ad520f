//! Events that can occur in a conversation

use crate::llm::LlmError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// The single inbound action from the input boundary
    Submit { text: String },

    /// Scheduled continuation of an accepted submission
    ProcessPending,

    /// The provider call finished, one way or the other
    GenerationComplete {
        outcome: Result<String, GenerationFailure>,
    },
}

/// Classified provider failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    QuotaExceeded,
    ProviderError,
}

impl GenerationFailure {
    pub fn quota(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::QuotaExceeded,
            detail: detail.into(),
        }
    }

    pub fn provider(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ProviderError,
            detail: detail.into(),
        }
    }
}

impl From<LlmError> for GenerationFailure {
    fn from(error: LlmError) -> Self {
        if error.kind.is_quota() {
            GenerationFailure::quota(error.message)
        } else {
            GenerationFailure::provider(error.message)
        }
    }
}
