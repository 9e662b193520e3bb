//! Conversation types and message roles

pub mod timestamp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name given to the conversation created for a user who has none yet
pub const DEFAULT_CONVERSATION_NAME: &str = "Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged turn handed to the completion engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub role: Role,
}

impl HistoryEntry {
    pub fn new(text: impl Into<String>, role: Role) -> Self {
        Self {
            text: text.into(),
            role,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(text, Role::System)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Role::User)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, Role::Assistant)
    }
}

/// An account able to obtain a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub name: String,
    pub created: DateTime<Utc>,
}

/// A stored message.
///
/// `text` is the canonical English form the completion engine sees,
/// `chat_display_text` is what the human reads. A message without an
/// author was written by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "chat")]
    pub conversation_id: String,
    #[serde(rename = "user")]
    pub user_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub chat_display_text: String,
}

impl Message {
    pub fn role(&self) -> Role {
        match self.user_id {
            Some(_) => Role::User,
            None => Role::Assistant,
        }
    }

    /// Assistant rows still waiting for the production pipeline
    pub fn is_placeholder(&self) -> bool {
        self.user_id.is_none() && self.text.is_empty()
    }
}
