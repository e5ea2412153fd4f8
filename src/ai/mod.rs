//! Model provider integration.
//!
//! Streams chat completions from an OpenAI-compatible endpoint or a local
//! Ollama server.
//!
//! ## Features
//!
//! - Role-tagged conversations with optional image attachments
//! - Token streaming over server-sent events or newline-delimited JSON
//! - Provider selection from configuration

mod conversation;
mod ollama;
mod openai;
mod stream;

pub use conversation::{ChatMessage, Conversation, MessageContent, Role};
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use stream::{accumulate, from_tokens, TokenStream};

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AiConfig;

/// Trait for chat models that reply with a token stream.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open a streamed completion for the given messages.
    ///
    /// Errors here mean the stream could not be opened at all. Failures after
    /// the first token surface as an `Err` item inside the stream.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, AIError>;

    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the model identifier sent with each request.
    fn model(&self) -> &str;
}

/// AI error types.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("{0} not set")]
    MissingApiKey(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Stream interrupted: {0}")]
    Stream(String),
}

/// Build the provider named in the configuration.
pub fn provider_from_config(config: &AiConfig) -> Result<Arc<dyn ChatProvider>, AIError> {
    match config.provider.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAIProvider::from_config(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::from_config(config))),
        other => Err(AIError::ProviderNotAvailable(format!(
            "unknown provider '{other}' (expected openai or ollama)"
        ))),
    }
}
