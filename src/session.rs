//! Per-visitor conversation data
//!
//! A session owns the transcript, the mirrored input value and the current
//! state of the conversation state machine.

use crate::state_machine::ChatState;
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

/// One message unit in the transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Model { text: String },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Turn::Model { text: text.into() }
    }

    pub fn role(&self) -> Role {
        match self {
            Turn::User { .. } => Role::User,
            Turn::Model { .. } => Role::Model,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Turn::User { text } | Turn::Model { text } => text,
        }
    }
}

/// Append-only conversation history.
///
/// The persona prompt is never stored here; it is prepended when a request
/// is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent `size` turns, oldest first. Returns everything when
    /// the transcript is shorter than `size`.
    pub fn context_window(&self, size: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(size);
        &self.turns[start..]
    }
}

impl FromIterator<Turn> for Transcript {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

/// UI flags exposed to the renderer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFlags {
    /// Mirrors the text control; cleared once a turn completes
    pub pending_input: String,
    /// Gates duplicate submissions while an exchange is outstanding
    pub sending: bool,
}

/// One visitor's conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub transcript: Transcript,
    pub pending_input: String,
    pub state: ChatState,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transcript: Transcript::new(),
            pending_input: String::new(),
            state: ChatState::Idle,
        }
    }

    pub fn flags(&self) -> SessionFlags {
        SessionFlags {
            pending_input: self.pending_input.clone(),
            sending: self.state.is_sending(),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            turns: self.transcript.clone(),
            flags: self.flags(),
        }
    }
}

/// Read-only snapshot handed to the renderer and the JSON API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub turns: Transcript,
    pub flags: SessionFlags,
}
