use chrono::Local;
use serde::{Deserialize, Serialize};

/// Text shown in place of an assistant reply that has not arrived yet.
pub const PENDING_TEXT: &str = "Thinking......";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageBody {
    Pending,
    Final(String),
}

/// One entry of a conversation: the body plus the wall-clock time it was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub body: MessageBody,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { body: MessageBody::Final(text.into()), timestamp: now() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::user(text)
    }

    pub fn pending() -> Self {
        Self { body: MessageBody::Pending, timestamp: now() }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.body, MessageBody::Pending)
    }

    pub fn text(&self) -> &str {
        match &self.body {
            MessageBody::Pending => PENDING_TEXT,
            MessageBody::Final(text) => text,
        }
    }
}

/// Hours and minutes, local time.
pub fn now() -> String {
    Local::now().format("%H:%M").to_string()
}
