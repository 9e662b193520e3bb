//! Deployment configuration loaded from a TOML file
//!
//! Every field is optional; environment variables override whatever the
//! file sets.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! data_dir = "/var/lib/babel-chat"
//!
//! [completion]
//! url = "http://llm.internal:8080"
//! prompt_file = "prompts/bank_assistant.toml"
//!
//! [translation]
//! url = "http://translate.internal:5000"
//! display_language = "ru"
//!
//! [production]
//! workers = 8
//! job_timeout_secs = 600
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub completion: CompletionSection,

    #[serde(default)]
    pub translation: TranslationSection,

    #[serde(default)]
    pub production: ProductionSection,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig = toml::from_str(content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Directory holding the SQLite database
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionSection {
    /// Base URL of the OpenAI-compatible completion server
    #[serde(default)]
    pub url: Option<String>,

    /// TOML prompt template replacing the built-in system prompt
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationSection {
    /// Base URL of the translation engine; unset means no translation
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Language shown to users
    #[serde(default)]
    pub display_language: Option<String>,

    /// Language the completion engine reads and writes
    #[serde(default)]
    pub canonical_language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionSection {
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
