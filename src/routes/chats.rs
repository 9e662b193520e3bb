//! Conversation endpoints

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::conversation::{Conversation, User, DEFAULT_CONVERSATION_NAME};
use crate::store::Scope;
use crate::AppState;

use super::auth::AuthUser;
use super::error::{ApiError, ApiResult};

#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub name: Option<String>,
}

fn scope_for(user: &User) -> Scope {
    if user.is_staff {
        Scope::All
    } else {
        Scope::Owner(user.id)
    }
}

/// Look up a conversation the caller is allowed to use.
///
/// Conversations owned by someone else are reported as unknown.
pub(super) async fn visible_conversation(
    state: &AppState,
    user: &User,
    conversation_id: &str,
) -> ApiResult<Conversation> {
    let conversation = state
        .store
        .get_conversation(conversation_id)
        .await?
        .filter(|c| user.is_staff || c.user_id == user.id);

    conversation.ok_or_else(|| ApiError::bad_request(format!("Unknown chat: {}", conversation_id)))
}

pub async fn list_chats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Conversation>>> {
    let mut conversations = state.store.list_conversations(scope_for(&user)).await?;

    if conversations.is_empty() && !user.is_staff {
        let created = state
            .store
            .create_conversation(user.id, DEFAULT_CONVERSATION_NAME)
            .await?;
        tracing::info!(user_id = user.id, chat_id = %created.id, "created default chat");
        conversations.push(created);
    }

    Ok(Json(conversations))
}

pub async fn create_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Option<Json<CreateChatRequest>>,
) -> ApiResult<Json<Conversation>> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let name = request
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_CONVERSATION_NAME.to_string());

    let conversation = state.store.create_conversation(user.id, &name).await?;
    Ok(Json(conversation))
}
