//! Completion service integrations

mod openai_compat;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::HistoryEntry;

pub use openai_compat::OpenAICompatProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response contained no answer")]
    EmptyResponse,
}

/// A chat-completion engine.
///
/// Receives the full role-tagged message list (system prompt first) and
/// returns the text of the first choice.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn chat(&self, messages: &[HistoryEntry]) -> Result<String, ProviderError>;
}
