//! Application configuration

pub mod file;
pub mod prompts;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

pub use file::{ConfigError, FileConfig};

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub completion_url: String,
    pub prompt_file: Option<PathBuf>,
    pub translation_url: Option<String>,
    #[serde(skip_serializing)]
    pub translation_api_key: Option<String>,
    pub translation_timeout: Duration,
    pub display_language: String,
    pub canonical_language: String,
    pub workers: usize,
    pub job_timeout: Option<Duration>,
}

impl Config {
    /// Read `BABEL_CONFIG` (if set) and overlay the environment on top
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match env::var("BABEL_CONFIG") {
            Ok(path) => FileConfig::from_file(&PathBuf::from(path))?,
            Err(_) => FileConfig::default(),
        };
        Self::resolve(file, |key| env::var(key).ok())
    }

    /// Combine file settings with variables from `lookup`, which win
    pub fn resolve(
        file: FileConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Validation(format!("PORT is not a port: {}", raw)))?,
            None => file.server.port.unwrap_or(8000),
        };

        let workers = match var("BABEL_WORKERS") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::Validation(format!("BABEL_WORKERS is not a number: {}", raw))
            })?,
            None => file.production.workers.unwrap_or(4),
        };
        if workers == 0 {
            return Err(ConfigError::Validation("BABEL_WORKERS must be at least 1".into()));
        }

        let job_timeout_secs = match var("BABEL_JOB_TIMEOUT_SECS") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                ConfigError::Validation(format!("BABEL_JOB_TIMEOUT_SECS is not a number: {}", raw))
            })?),
            None => file.production.job_timeout_secs,
        };

        let translation_timeout_secs = match var("BABEL_TRANSLATION_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::Validation(format!(
                    "BABEL_TRANSLATION_TIMEOUT_SECS is not a number: {}",
                    raw
                ))
            })?,
            None => file.translation.timeout_secs.unwrap_or(30),
        };

        Ok(Self {
            host: var("HOST")
                .or(file.server.host)
                .unwrap_or_else(|| "127.0.0.1".into()),
            port,
            data_dir: var("BABEL_DATA_DIR")
                .map(PathBuf::from)
                .or(file.server.data_dir)
                .unwrap_or_else(|| PathBuf::from("./data")),
            completion_url: var("BABEL_COMPLETION_URL")
                .or(file.completion.url)
                .unwrap_or_else(|| "http://localhost:8080".into()),
            prompt_file: var("BABEL_PROMPT_FILE")
                .map(PathBuf::from)
                .or(file.completion.prompt_file),
            translation_url: var("BABEL_TRANSLATION_URL").or(file.translation.url),
            translation_api_key: var("BABEL_TRANSLATION_API_KEY").or(file.translation.api_key),
            translation_timeout: Duration::from_secs(translation_timeout_secs),
            display_language: var("BABEL_DISPLAY_LANGUAGE")
                .or(file.translation.display_language)
                .unwrap_or_else(|| "ru".into()),
            canonical_language: var("BABEL_CANONICAL_LANGUAGE")
                .or(file.translation.canonical_language)
                .unwrap_or_else(|| "en".into()),
            workers,
            job_timeout: job_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("babel.db")
    }
}
