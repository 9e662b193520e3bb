//! OpenAI-compatible completion provider
//!
//! Targets servers exposing `POST /v1/chat/completions` (llama.cpp server,
//! llama-cpp-python, vLLM, LocalAI, ...). Every request carries the same
//! sampling policy; callers only choose the messages.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::conversation::HistoryEntry;

use super::{CompletionProvider, ProviderError};

/// Sampling parameters attached to every completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub echo: bool,
    pub max_tokens: u32,
    pub stop: &'static [&'static str],
    pub temperature: f64,
    pub repeat_penalty: f64,
    pub top_k: u32,
    pub top_p: f64,
}

pub const SAMPLING_POLICY: SamplingParams = SamplingParams {
    echo: true,
    max_tokens: 1000,
    stop: &["Assistant", "User"],
    temperature: 0.7,
    repeat_penalty: 1.0 / 0.85,
    top_k: 40,
    top_p: 0.1,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&HistoryEntry> for ChatMessage {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            role: entry.role.as_str().to_string(),
            content: entry.text.clone(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    messages: Vec<ChatMessage>,
    #[serde(flatten)]
    sampling: SamplingParams,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error response from API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Provider for an OpenAI-compatible completion server
pub struct OpenAICompatProvider {
    base_url: String,
    client: Client,
}

impl OpenAICompatProvider {
    /// The client has no request timeout: a completion may take as long as
    /// the server needs.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

fn build_request(messages: &[HistoryEntry]) -> ChatCompletionRequest {
    ChatCompletionRequest {
        messages: messages.iter().map(ChatMessage::from).collect(),
        sampling: SAMPLING_POLICY,
    }
}

fn parse_answer(body: &str) -> Result<String, ProviderError> {
    let completion: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(ProviderError::EmptyResponse)
}

/// Turn an HTTP status and body into the answer or a provider error
fn parse_response(status: StatusCode, body: &str) -> Result<String, ProviderError> {
    if !status.is_success() {
        if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(body) {
            return Err(ProviderError::InvalidResponse(format!(
                "API error: {}",
                error_resp.error.message
            )));
        }
        return Err(ProviderError::InvalidResponse(format!(
            "HTTP {}: {}",
            status, body
        )));
    }

    parse_answer(body)
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAICompatProvider {
    async fn chat(&self, messages: &[HistoryEntry]) -> Result<String, ProviderError> {
        let request = build_request(messages);

        let response = self
            .client
            .post(self.completions_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let answer = parse_response(status, &body)?;
        tracing::debug!("completion returned {} chars", answer.len());
        Ok(answer)
    }
}
