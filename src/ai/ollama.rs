//! Ollama local LLM integration.
//!
//! Implements the ChatProvider trait for Ollama (local LLM). Replies arrive
//! as newline-delimited JSON objects.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::conversation::{ChatMessage, Role};
use super::stream::{decode_lines, Decoded, TokenStream};
use super::{AIError, ChatProvider};
use crate::core::AiConfig;

/// Ollama API provider for local LLM.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default settings.
    ///
    /// Uses localhost:11434 by default.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: "llava".to_string(),
            temperature: 0.2,
        }
    }

    /// Create from the `[ai]` configuration section.
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.ollama.base_url.clone(),
            model: config.ollama.model.clone(),
            temperature: config.temperature,
        }
    }

    /// Create with a specific base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role,
                    content: m.text(),
                    images: m.image_base64().map(|data| vec![data]),
                })
                .collect(),
            stream: true,
            options: OllamaOptions { temperature: self.temperature },
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, AIError> {
        let request = self.build_request(messages);
        tracing::debug!(provider = "ollama", model = %self.model, "Opening chat stream");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AIError::Request(format!("{e} (is Ollama running at {}?)", self.base_url))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::ApiError { status, body });
        }

        Ok(decode_lines(response.bytes_stream(), decode_ndjson_line))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn decode_ndjson_line(line: &str) -> Decoded {
    match serde_json::from_str::<OllamaChunk>(line) {
        Ok(chunk) => {
            let content = chunk.message.map(|m| m.content).unwrap_or_default();
            match (content.is_empty(), chunk.done) {
                (false, _) => Decoded::Token(content),
                (true, true) => Decoded::Done,
                (true, false) => Decoded::Skip,
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable stream chunk");
            Decoded::Skip
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}
