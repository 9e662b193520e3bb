//! System prompt templates
//!
//! The completion engine is steered by a single system prompt. A deployment
//! can replace the built-in one with a TOML file.
//!
//! # Example Prompt File
//!
//! ```toml
//! [persona]
//! name = "Bank Assistant"
//! description = "Collects customer details and recommends one product"
//!
//! [system_prompt]
//! content = """
//! Act as a bank assistant...
//! """
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// System prompt file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub persona: PersonaInfo,
    pub system_prompt: SystemPrompt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaInfo {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub content: String,
}

impl PromptTemplate {
    /// Load a template from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self, PromptError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::IoError(e.to_string()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, PromptError> {
        let template: PromptTemplate =
            toml::from_str(content).map_err(|e| PromptError::ParseError(e.to_string()))?;

        if template.system_prompt.content.trim().is_empty() {
            return Err(PromptError::Empty(template.persona.name));
        }
        Ok(template)
    }
}

/// The system prompt to use: the file's when given, the built-in otherwise
pub async fn resolve_system_prompt(path: Option<&Path>) -> Result<String, PromptError> {
    match path {
        Some(path) => {
            let template = PromptTemplate::load_from_file(path).await?;
            tracing::info!(persona = %template.persona.name, "loaded system prompt from {}", path.display());
            Ok(template.system_prompt.content)
        }
        None => Ok(builtin::BANK_ASSISTANT.to_string()),
    }
}

/// Errors from prompt loading
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Prompt '{0}' has no content")]
    Empty(String),
}

/// Prompt used when no prompt file is configured
pub mod builtin {
    /// Bank assistant that profiles the customer before recommending a product
    pub const BANK_ASSISTANT: &str = r#"
Act as a bank assistant that finds out the necessary information about me to personalize the offers of bank's products. REMEMBER: you need to be polite, friendly and as brief as possible. Remember: you can ask only 1 question in 1 reply message and you can not recommend me product if you don't know all necessary information.
You task is to collect information about me step-by-step and then recommend me the best personalized product. Don't forget that you should ask me more than 3 questions (3 messages) but no more than 5 questions (5 messages).
REMEMBER: Don't let me get you off the track.
REMEMBER: If I am under 18, don't recommend anything.

Information which you need to collect from me:
1. Age
2. Occupation
3. Monthly income.
4. Financial goals.
You must recommend me one of our several products.
Our bank has online banking and includes several products such as:
1. Debit card with no fees.
2. Credit card with 7 days grace period and 1000 dollars credit limit.
3. Saving account with 12% rate and account sum from 500 dollars.
"#;
}
