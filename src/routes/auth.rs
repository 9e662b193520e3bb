//! Token authentication

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::conversation::User;
use crate::AppState;

use super::error::{ApiError, ApiResult};

/// The caller behind a valid API token
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Extract the key from `Authorization: Bearer <key>` (or `Token <key>`)
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.trim().split_once(' ')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token") {
        Some(key)
    } else {
        None
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided"))?;

        let user = state
            .store
            .user_for_token(key)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

        Ok(AuthUser(user))
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user_id: i64,
    pub email: String,
    pub is_staff: bool,
}

pub async fn obtain_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(ApiError::bad_request("username and password are required"));
    };

    let user = state
        .store
        .verify_credentials(&username, &password)
        .await?
        .ok_or_else(|| ApiError::bad_request("Unable to log in with provided credentials"))?;

    let token = state.store.get_or_create_token(user.id).await?;
    tracing::info!(user_id = user.id, "issued API token");

    Ok(Json(TokenResponse {
        token,
        user_id: user.id,
        email: user.email,
        is_staff: user.is_staff,
    }))
}
