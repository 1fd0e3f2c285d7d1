//! Generative text extraction.
//!
//! A [`CompletionBackend`] turns one prompt into one reply. The
//! [`CardExtractor`] builds prompts from sanitized page HTML and parses the
//! reply into validated [`ExtractedCard`](crate::models::ExtractedCard)s,
//! degrading to an empty result whenever the reply cannot be trusted.

mod client;
mod extract;
mod prompts;

pub use client::OpenAiCompatibleClient;
pub use extract::{
    find_json_array, parse_cards, parse_page_analysis, CardExtractor, ExtractionContext,
    PageAnalysis, DEFAULT_MAX_CONTENT_CHARS,
};
pub use prompts::{build_analysis_prompt, build_extraction_prompt, default_card_instruction};

use async_trait::async_trait;

use crate::rate_limit::Retryable;

/// Errors from the completion API.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model client not configured: {0}")]
    Config(String),

    #[error("network error calling {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("model API returned HTTP {status}: {body}")]
    Api {
        status: u16,
        body: String,
        retry_after: Option<String>,
    },

    #[error("unexpected model API response: {0}")]
    Parse(String),
}

impl Retryable for LlmError {
    fn status(&self) -> Option<u16> {
        match self {
            LlmError::Api { status, .. } => Some(*status),
            LlmError::Connection { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    fn retry_after_header(&self) -> Option<&str> {
        match self {
            LlmError::Api { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

/// A one-shot text completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send `prompt` and return the model's reply text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
