//! Conversation context shared with model providers.
//!
//! A [`Conversation`] is an ordered, append-only list of role-tagged
//! messages. Workflow steps copy it before adding per-call turns, so the
//! caller's history is never mutated behind its back.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Body of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain text
    Text(String),

    /// Text with an attached image, stored as a `data:` URL
    TextWithImage { text: String, image_url: String },
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(content.into()) }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(content.into()) }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(content.into()) }
    }

    /// Create a user message carrying an image.
    pub fn user_with_image(text: impl Into<String>, image: &[u8], mime: &str) -> Self {
        let image_url = format!("data:{mime};base64,{}", STANDARD.encode(image));
        Self {
            role: Role::User,
            content: MessageContent::TextWithImage { text: text.into(), image_url },
        }
    }

    /// Text portion of the message.
    pub fn text(&self) -> &str {
        match &self.content {
            MessageContent::Text(text) | MessageContent::TextWithImage { text, .. } => text,
        }
    }

    /// Image `data:` URL, if one is attached.
    pub fn image_url(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(_) => None,
            MessageContent::TextWithImage { image_url, .. } => Some(image_url),
        }
    }

    /// Raw base64 payload of the attached image (without the `data:` prefix).
    pub fn image_base64(&self) -> Option<&str> {
        self.image_url().and_then(|url| url.split_once("base64,")).map(|(_, data)| data)
    }
}

/// Ordered conversation history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation that starts with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self { messages: vec![ChatMessage::system(prompt)] }
    }

    /// Append a message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::user(content));
    }

    /// Append an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::assistant(content));
    }

    /// Append a user message with an attached image.
    pub fn push_user_image(&mut self, text: impl Into<String>, image: &[u8], mime: &str) {
        self.push(ChatMessage::user_with_image(text, image, mime));
    }

    /// All messages in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Copy of the history with one extra turn appended.
    ///
    /// The conversation itself is left untouched.
    pub fn augmented(&self, turn: ChatMessage) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend_from_slice(&self.messages);
        messages.push(turn);
        messages
    }

    /// Text of the most recent assistant message.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant).map(ChatMessage::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_augmented_leaves_original_untouched() {
        let mut conversation = Conversation::with_system("be helpful");
        conversation.push_user("hello");

        let augmented = conversation.augmented(ChatMessage::user("one more"));

        assert_eq!(conversation.len(), 2);
        assert_eq!(augmented.len(), 3);
        assert_eq!(augmented[2].text(), "one more");
        assert_eq!(augmented[..2], conversation.messages()[..]);
    }

    #[test]
    fn test_image_message_encodes_data_url() {
        let message = ChatMessage::user_with_image("build this", b"abc", "image/png");

        assert_eq!(message.text(), "build this");
        assert_eq!(message.image_url(), Some("data:image/png;base64,YWJj"));
        assert_eq!(message.image_base64(), Some("YWJj"));
    }

    #[test]
    fn test_text_message_has_no_image() {
        let message = ChatMessage::assistant("plan");
        assert!(message.image_url().is_none());
        assert!(message.image_base64().is_none());
    }

    #[test]
    fn test_last_assistant_text() {
        let mut conversation = Conversation::new();
        assert!(conversation.last_assistant_text().is_none());

        conversation.push_assistant("first");
        conversation.push_user("question");
        conversation.push_assistant("second");

        assert_eq!(conversation.last_assistant_text(), Some("second"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }
}
