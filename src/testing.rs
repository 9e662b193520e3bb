//! Test doubles for the network-facing clients

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::conversation::HistoryEntry;
use crate::providers::{CompletionProvider, ProviderError};
use crate::translation::{TranslationError, Translator};

/// Completion provider returning a fixed answer (or failing) and recording
/// every message list it receives
pub struct ScriptedProvider {
    answer: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<Vec<HistoryEntry>>>,
}

impl ScriptedProvider {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<Vec<HistoryEntry>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn chat(&self, messages: &[HistoryEntry]) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer
            .clone()
            .ok_or_else(|| ProviderError::InvalidResponse("connection refused".to_string()))
    }
}

/// Translator that looks texts up in a table and passes unknown texts
/// through unchanged
#[derive(Default)]
pub struct DictionaryTranslator {
    entries: HashMap<String, String>,
    fail: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl DictionaryTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: &str, to: &str) -> Self {
        self.entries.insert(from.to_string(), to.to_string());
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// `(text, destination language)` pairs seen so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for DictionaryTranslator {
    async fn translate(&self, text: &str, dest_language: &str) -> Result<String, TranslationError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), dest_language.to_string()));
        if self.fail {
            return Err(TranslationError::InvalidResponse(
                "translation engine unavailable".to_string(),
            ));
        }
        Ok(self
            .entries
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}
