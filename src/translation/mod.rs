//! Translation engine client
//!
//! Speaks the LibreTranslate request/response contract:
//!
//! ```text
//! POST {endpoint}/translate  {"q": "...", "source": "auto", "target": "en", "format": "text"}
//! 200 OK                     {"translatedText": "..."}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Translates text into a destination language
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, dest_language: &str) -> Result<String, TranslationError>;
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Translator backed by a remote HTTP engine
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranslationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, dest_language: &str) -> Result<String, TranslationError> {
        if text.is_empty() {
            return Ok(String::new());
        }

        let request = TranslateRequest {
            q: text,
            source: "auto",
            target: dest_language,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(TranslationError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status, error.error
                )));
            }
            return Err(TranslationError::InvalidResponse(format!("HTTP {}: {}", status, body)));
        }

        let translated: TranslateResponse = serde_json::from_str(&body).map_err(|e| {
            TranslationError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        tracing::debug!(target_language = dest_language, "translated {} chars", text.len());
        Ok(translated.translated_text)
    }
}

/// Returns its input unchanged; used when no engine is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str, _dest_language: &str) -> Result<String, TranslationError> {
        Ok(text.to_string())
    }
}
