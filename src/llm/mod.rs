//! Text-generation backends.
//!
//! The pipeline only needs "prompt in, text out", so the seam is a single
//! async method. [`OllamaClient`] talks to a local Ollama server.

mod ollama;

pub use ollama::*;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("failed to reach model backend at {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("model backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response from model backend: {0}")]
    Malformed(String),

    #[error("model returned an empty response")]
    Empty,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, e.g. `llama3.1`.
    fn name(&self) -> &str;

    /// Run one prompt and return the raw text of the reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}
