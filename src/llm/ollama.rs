use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{LanguageModel, LlmError};

pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";

/// `[llm]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: Option<String>,
    pub host: String,
    pub temperature: f32,
    /// Per-request timeout; no limit when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            host: DEFAULT_OLLAMA_HOST.to_string(),
            temperature: 0.0,
            timeout_secs: None,
        }
    }
}

/// Client for Ollama's non-streaming `/api/chat` endpoint.
pub struct OllamaClient {
    http: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl OllamaClient {
    pub fn new(model: &str, config: &LlmConfig) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let url = format!("{}/api/chat", normalize_host(&config.host));
        let http = builder.build().map_err(|source| LlmError::Request {
            url: url.clone(),
            source,
        })?;

        Ok(Self {
            http,
            url,
            model: model.to_string(),
            temperature: config.temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "stream": false,
            "messages": [{ "role": "user", "content": prompt }],
            "options": { "temperature": self.temperature },
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "sending prompt");

        let resp = self
            .http
            .post(&self.url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|source| LlmError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let body = resp.text().await.map_err(|source| LlmError::Request {
            url: self.url.clone(),
            source,
        })?;
        parse_chat_response(&body)
    }
}

fn parse_chat_response(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Malformed(e.to_string()))?;
    if parsed.message.content.trim().is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(parsed.message.content)
}

/// Tolerate hosts written without a scheme, with a trailing slash, or as
/// `http:host:port`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return DEFAULT_OLLAMA_HOST.to_string();
    }
    if host.contains("://") {
        return host.to_string();
    }
    for scheme in ["https:", "http:"] {
        if let Some(rest) = host.strip_prefix(scheme) {
            return format!("{}//{}", scheme, rest);
        }
    }
    format!("http://{}", host)
}
