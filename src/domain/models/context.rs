use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message sent to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// The growing message history of one run.
///
/// Base messages are fixed when the run starts. Feedback messages are
/// appended, one per failed attempt that is followed by another attempt.
/// Nothing is ever removed; how much of the history is actually sent is
/// decided by a [`ContextPolicy`](crate::services::ContextPolicy) at render
/// time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptContext {
    base: Vec<ChatMessage>,
    feedback: Vec<ChatMessage>,
}

impl AttemptContext {
    pub fn new(base: Vec<ChatMessage>) -> Self {
        Self {
            base,
            feedback: Vec::new(),
        }
    }

    pub fn push_feedback(&mut self, message: ChatMessage) {
        self.feedback.push(message);
    }

    pub fn base(&self) -> &[ChatMessage] {
        &self.base
    }

    pub fn feedback(&self) -> &[ChatMessage] {
        &self.feedback
    }

    /// Every stored message, base first.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.base.iter().chain(self.feedback.iter())
    }

    pub fn len(&self) -> usize {
        self.base.len() + self.feedback.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.feedback.is_empty()
    }
}
