//! Conversation history for the completion engine

use crate::conversation::{HistoryEntry, Message};
use crate::store::{Store, StoreError};

/// Role-annotated canonical history of a conversation, oldest first.
///
/// Placeholders and other rows without canonical text are skipped.
pub async fn build_history(
    store: &Store,
    conversation_id: &str,
) -> Result<Vec<HistoryEntry>, StoreError> {
    let messages = store.list_messages(conversation_id, None).await?;
    Ok(annotate(messages))
}

fn annotate(messages: Vec<Message>) -> Vec<HistoryEntry> {
    messages
        .into_iter()
        .filter(|m| !m.text.is_empty())
        .map(|m| {
            let role = m.role();
            HistoryEntry::new(m.text, role)
        })
        .collect()
}
