//! Code generation for a single milestone.

use std::sync::Arc;

use crate::ai::{accumulate, ChatMessage, ChatProvider, Conversation};

use super::extract::{extract_code, CodeKind};
use super::WorkflowError;

/// System prompt for the implementation conversation.
pub const IMPLEMENTATION_PROMPT: &str = r#"You are a front-end developer building a web page from a reference image.

You are given one milestone from the plan at a time. Implement only that milestone.

Reply with:
1. The HTML for the milestone in a single ```html fenced code block.
2. The CSS for the milestone in a single ```css fenced code block.

Rules:
- Keep all styling in styles.css. The page must link it with <link rel="stylesheet" href="styles.css">.
- Do not use inline styles or <style> elements.
- Match the reference image as closely as possible: layout, colors, spacing and typography.
- Use semantic HTML elements and class names that describe the content.
- Do not repeat markup or rules that earlier milestones already produced."#;

/// Code extracted from one generation reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedCode {
    pub html: String,
    pub css: String,
}

impl GeneratedCode {
    pub fn get(&self, kind: CodeKind) -> &str {
        match kind {
            CodeKind::Html => &self.html,
            CodeKind::Css => &self.css,
        }
    }
}

/// Generates markup and styling for milestones.
#[derive(Clone)]
pub struct ContentGenerator {
    provider: Arc<dyn ChatProvider>,
}

impl ContentGenerator {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Instruction appended to the conversation for one milestone.
    pub fn milestone_prompt(milestone: &str) -> String {
        format!("Implement this milestone: {milestone}")
    }

    /// Ask the model for one milestone's code.
    ///
    /// The conversation is copied; the caller's history is left as it was.
    /// A missing block of either kind comes back as empty text.
    pub async fn generate_for_milestone(
        &self,
        milestone: &str,
        context: &Conversation,
    ) -> Result<GeneratedCode, WorkflowError> {
        let messages = context.augmented(ChatMessage::user(Self::milestone_prompt(milestone)));

        tracing::debug!(milestone, model = self.provider.model(), "Generating milestone code");
        let stream = self.provider.stream_chat(&messages).await?;
        let response = accumulate(stream).await;

        let code = GeneratedCode {
            html: extract_code(&response, CodeKind::Html),
            css: extract_code(&response, CodeKind::Css),
        };
        if code.html.is_empty() && code.css.is_empty() {
            tracing::warn!(milestone, bytes = response.len(), "Reply contained no html or css block");
        }
        Ok(code)
    }
}
