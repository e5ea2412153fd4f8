//! OpenAI API integration.
//!
//! Implements the ChatProvider trait for OpenAI-compatible chat completion
//! endpoints, streaming the reply as server-sent events.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::conversation::{ChatMessage, MessageContent, Role};
use super::stream::{decode_lines, Decoded, TokenStream};
use super::{AIError, ChatProvider};
use crate::core::AiConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI API provider.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    ///
    /// Reads API key from OPENAI_API_KEY and an optional endpoint from
    /// OPENAI_BASE_URL.
    pub fn new() -> Result<Self, AIError> {
        let api_key = read_api_key("OPENAI_API_KEY")?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            temperature: 0.2,
        })
    }

    /// Create from the `[ai]` configuration section.
    ///
    /// The API key always comes from the environment variable named in
    /// `api_key_env`; a configured `base_url` wins over OPENAI_BASE_URL.
    pub fn from_config(config: &AiConfig) -> Result<Self, AIError> {
        let api_key = read_api_key(&config.api_key_env)?;
        let base_url = config
            .base_url
            .clone()
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model: config.model.clone(),
            base_url,
            temperature: config.temperature,
        })
    }

    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: self.temperature,
            stream: true,
        }
    }
}

fn read_api_key(var: &str) -> Result<String, AIError> {
    std::env::var(var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AIError::MissingApiKey(var.to_string()))
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, AIError> {
        let request = self.build_request(messages);
        tracing::debug!(
            provider = "openai",
            model = %self.model,
            messages = messages.len(),
            "Opening chat stream"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AIError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::ApiError { status, body });
        }

        Ok(decode_lines(response.bytes_stream(), decode_sse_line))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Decode one server-sent event line into a token.
fn decode_sse_line(line: &str) -> Decoded {
    let Some(data) = line.strip_prefix("data:") else {
        return Decoded::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Decoded::Done;
    }

    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map_or(Decoded::Skip, Decoded::Token),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable stream chunk");
            Decoded::Skip
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: WireContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImage<'a> },
}

#[derive(Debug, Serialize)]
struct WireImage<'a> {
    url: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        let content = match &message.content {
            MessageContent::Text(text) => WireContent::Text(text),
            MessageContent::TextWithImage { text, image_url } => WireContent::Parts(vec![
                WirePart::Text { text },
                WirePart::ImageUrl { image_url: WireImage { url: image_url } },
            ]),
        };
        Self { role: message.role, content }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}
