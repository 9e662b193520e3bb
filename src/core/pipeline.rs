//! Message production pipeline
//!
//! history -> completion -> translation -> fill the placeholder row

use std::sync::Arc;

use crate::conversation::HistoryEntry;
use crate::store::{Store, StoreError};

use super::completion::{CompletionClient, CompletionError};
use super::history::build_history;

/// What a production run did to its placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionOutcome {
    Filled { fallback: bool },
    PlaceholderMissing,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),
}

pub struct Pipeline {
    store: Arc<Store>,
    completion: CompletionClient,
}

impl Pipeline {
    pub fn new(store: Arc<Store>, completion: CompletionClient) -> Self {
        Self { store, completion }
    }

    /// Produce the assistant answer for `prompt` (English) and write it into
    /// the placeholder message.
    ///
    /// A placeholder deleted in the meantime is not an error.
    pub async fn produce(
        &self,
        prompt: &str,
        conversation_id: &str,
        placeholder_id: &str,
    ) -> Result<ProductionOutcome, PipelineError> {
        let mut history = build_history(&self.store, conversation_id).await?;
        history.push(HistoryEntry::user(prompt));

        let completion = self.completion.complete(&history).await?;

        if self.store.get_message(placeholder_id).await?.is_none() {
            tracing::debug!(placeholder_id, "placeholder vanished before production finished");
            return Ok(ProductionOutcome::PlaceholderMissing);
        }

        let written = self
            .store
            .fill_message(placeholder_id, &completion.raw, &completion.translated)
            .await?;

        if !written {
            return Ok(ProductionOutcome::PlaceholderMissing);
        }

        Ok(ProductionOutcome::Filled {
            fallback: completion.is_fallback(),
        })
    }
}
