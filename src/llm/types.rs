//! Common types for generation requests

/// Generation request: ordered role-tagged turns, persona first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
}

/// Message in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub text: String,
}

impl LlmMessage {
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Model,
}

impl From<crate::session::Role> for MessageRole {
    fn from(role: crate::session::Role) -> Self {
        match role {
            crate::session::Role::User => MessageRole::User,
            crate::session::Role::Model => MessageRole::Model,
        }
    }
}

/// Generation response
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: Usage::default(),
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
