//! Message endpoints: listing, posting and polling for updates

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::conversation::{timestamp, Message};
use crate::core::ProductionJob;
use crate::store::NewMessage;
use crate::AppState;

use super::auth::AuthUser;
use super::chats::visible_conversation;
use super::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub chat: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatesQuery {
    #[serde(default)]
    pub chat: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub chat: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} is required", field)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let chat_id = required(query.chat, "chat")?;
    let conversation = visible_conversation(&state, &user, &chat_id).await?;

    let messages = state.store.list_messages(&conversation.id, None).await?;
    Ok(Json(messages))
}

/// Post a message.
///
/// Staff write assistant messages verbatim. Everyone else gets their text
/// stored in canonical form next to what they typed, plus an empty assistant
/// placeholder that the production queue fills in later.
pub async fn post_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let text = required(request.message, "message")?;
    let chat_id = required(request.chat, "chat")?;
    let message_id = required(request.id, "id")?;
    let conversation = visible_conversation(&state, &user, &chat_id).await?;

    if user.is_staff {
        state
            .store
            .create_message(NewMessage {
                id: message_id.clone(),
                conversation_id: conversation.id,
                user_id: None,
                text: text.clone(),
                chat_display_text: text,
            })
            .await?;
        tracing::info!(user_id = user.id, message_id = %message_id, "staff posted assistant message");
        return Ok(Json(json!({ "id": message_id })).into_response());
    }

    let canonical = state
        .translator
        .translate(&text, &state.config.canonical_language)
        .await?;

    let (_, placeholder) = state
        .store
        .create_exchange(
            NewMessage {
                id: message_id,
                conversation_id: conversation.id.clone(),
                user_id: Some(user.id),
                text: canonical.clone(),
                chat_display_text: text,
            },
            NewMessage::placeholder(&conversation.id),
        )
        .await?;

    let job = ProductionJob {
        prompt: canonical,
        conversation_id: conversation.id,
        placeholder_id: placeholder.id.clone(),
    };
    let job_id = state.queue.submit(job).map_err(|e| {
        tracing::error!(placeholder_id = %placeholder.id, error = %e, "placeholder will stay empty");
        e
    })?;
    tracing::debug!(job_id, placeholder_id = %placeholder.id, "enqueued message production");

    Ok(Json(placeholder).into_response())
}

/// Messages newer than `timestamp`, for clients polling a conversation
pub async fn get_updates(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<UpdatesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let since = query
        .timestamp
        .as_deref()
        .and_then(timestamp::parse_client)
        .ok_or_else(|| ApiError::bad_request("timestamp must be an ISO 8601 date-time"))?;
    let chat_id = required(query.chat, "chat")?;
    let conversation = visible_conversation(&state, &user, &chat_id).await?;

    let messages = state.store.list_messages(&conversation.id, Some(since)).await?;
    Ok(Json(messages))
}
