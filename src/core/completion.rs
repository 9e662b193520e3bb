//! Completion client
//!
//! Wraps a [`CompletionProvider`] with the system prompt, the role checks
//! and the fallback policy, then translates the answer for display.

use std::sync::Arc;

use crate::conversation::{HistoryEntry, Role};
use crate::providers::{CompletionProvider, ProviderError};
use crate::translation::{TranslationError, Translator};

/// Answer stored when the completion engine cannot be reached or misbehaves
pub const FALLBACK_ANSWER: &str = "Error while building prompt";

/// Where an answer came from
#[derive(Debug)]
pub enum AnswerKind {
    Generated,
    Fallback(ProviderError),
}

/// A completion in canonical and display language
#[derive(Debug)]
pub struct Completion {
    pub raw: String,
    pub translated: String,
    pub kind: AnswerKind,
}

impl Completion {
    pub fn is_fallback(&self) -> bool {
        matches!(self.kind, AnswerKind::Fallback(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("System role is not expected in conversation history")]
    UnexpectedSystemRole,

    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),
}

pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    translator: Arc<dyn Translator>,
    system_prompt: String,
    display_language: String,
}

impl CompletionClient {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        translator: Arc<dyn Translator>,
        system_prompt: impl Into<String>,
        display_language: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            translator,
            system_prompt: system_prompt.into(),
            display_language: display_language.into(),
        }
    }

    /// Ask the engine to continue `history`.
    ///
    /// Provider failures never surface as errors: the answer becomes
    /// [`FALLBACK_ANSWER`] tagged with the cause. The answer is always
    /// translated, fallback included.
    pub async fn complete(&self, history: &[HistoryEntry]) -> Result<Completion, CompletionError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(HistoryEntry::system(self.system_prompt.as_str()));

        for entry in history {
            match entry.role {
                Role::User | Role::Assistant => messages.push(entry.clone()),
                Role::System => return Err(CompletionError::UnexpectedSystemRole),
            }
        }

        let (raw, kind) = match self.provider.chat(&messages).await {
            Ok(answer) => (answer, AnswerKind::Generated),
            Err(e) => {
                tracing::warn!(error = %e, "completion failed, using fallback answer");
                (FALLBACK_ANSWER.to_string(), AnswerKind::Fallback(e))
            }
        };

        let translated = self
            .translator
            .translate(&raw, &self.display_language)
            .await?;

        Ok(Completion {
            raw,
            translated,
            kind,
        })
    }
}
