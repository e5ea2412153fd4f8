//! Plan authoring.
//!
//! Turns the conversation (usually a reference image) into a checklist
//! document with an Overview and a Milestones section.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ai::{accumulate, ChatMessage, ChatProvider, Conversation, Role};

use super::checklist::{Checklist, ChecklistStore};
use super::WorkflowError;

/// System prompt for plan authoring.
pub const PLANNING_PROMPT: &str = r#"You are a software architect preparing to build the web page shown in the image the user sends.
Your role is only to plan the project. You will not implement the plan and will not write any code.

Write the plan in markdown with two sections, "Overview" and "Milestones".

In the "Overview" section, analyze the image and describe the elements on the page, their positions, and the layout of the major sections. Using vanilla HTML and CSS, discuss anything about the layout that could be implemented in more than one way, review the pros and cons, and recommend a course of action.

In the "Milestones" section, describe an ordered set of milestones for methodically building the page so that errors can be caught and corrected early. Pay close attention to the alignment of elements and state clear expectations for each milestone. Do not include testing milestones, only implementation.

Format milestones like this:

- [ ] 1. This is the first milestone
- [ ] 2. This is the second milestone
- [ ] 3. This is the third milestone

Reply with the whole plan inside a single ```markdown code block."#;

static MARKDOWN_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:markdown|md)\r?\n(.*?)```").expect("valid markdown block regex")
});

/// Produces the checklist document for a run.
#[async_trait]
pub trait PlanAuthor: Send + Sync {
    async fn author(&self, context: &Conversation) -> Result<String, WorkflowError>;
}

/// Plan body from a model reply: the first markdown block, or the whole reply.
pub fn extract_plan(reply: &str) -> String {
    MARKDOWN_BLOCK
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map_or(reply, |m| m.as_str())
        .trim()
        .to_string()
}

/// Asks the model to write the plan.
#[derive(Clone)]
pub struct GenerativePlanAuthor {
    provider: Arc<dyn ChatProvider>,
}

impl GenerativePlanAuthor {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PlanAuthor for GenerativePlanAuthor {
    async fn author(&self, context: &Conversation) -> Result<String, WorkflowError> {
        // The planning prompt replaces whatever system prompt the caller used.
        let mut messages = vec![ChatMessage::system(PLANNING_PROMPT)];
        messages.extend(context.messages().iter().filter(|m| m.role != Role::System).cloned());

        tracing::info!(model = self.provider.model(), "Authoring plan");
        let stream = self.provider.stream_chat(&messages).await?;
        let plan = extract_plan(&accumulate(stream).await);

        let milestones = Checklist::parse(&plan).milestones().len();
        if milestones == 0 {
            return Err(WorkflowError::EmptyPlan);
        }
        tracing::debug!(milestones, bytes = plan.len(), "Plan authored");
        Ok(plan)
    }
}

/// Reuses the checklist already on disk.
#[derive(Debug, Clone)]
pub struct StoredPlan {
    store: ChecklistStore,
}

impl StoredPlan {
    pub fn new(store: ChecklistStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PlanAuthor for StoredPlan {
    async fn author(&self, _context: &Conversation) -> Result<String, WorkflowError> {
        self.store.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{from_tokens, AIError, TokenStream};
    use std::sync::Mutex;

    struct Planner {
        reply: String,
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl ChatProvider for Planner {
        async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, AIError> {
            *self.seen.lock().unwrap() = messages.to_vec();
            Ok(from_tokens(vec![self.reply.clone()]))
        }
        fn name(&self) -> &str {
            "planner"
        }
        fn model(&self) -> &str {
            "planner"
        }
    }

    fn planner(reply: &str) -> Arc<Planner> {
        Arc::new(Planner { reply: reply.to_string(), seen: Mutex::new(Vec::new()) })
    }

    #[test]
    fn test_extract_plan_prefers_markdown_block() {
        let reply = "Here is the plan:\n```markdown\n# Overview\n- [ ] 1. Header\n```\nGood luck!";
        assert_eq!(extract_plan(reply), "# Overview\n- [ ] 1. Header");
        assert_eq!(extract_plan("```md\n- [ ] a\n```"), "- [ ] a");
    }

    #[test]
    fn test_extract_plan_falls_back_to_reply() {
        assert_eq!(extract_plan("\n# Milestones\n- [ ] 1. Header\n"), "# Milestones\n- [ ] 1. Header");
    }

    #[tokio::test]
    async fn test_generative_author_swaps_system_prompt() {
        let provider = planner("```markdown\n# Milestones\n- [ ] 1. Header\n- [ ] 2. Footer\n```");
        let author = GenerativePlanAuthor::new(provider.clone());
        let mut context = Conversation::with_system("old prompt");
        context.push_user_image("Build this page", b"img", "image/png");

        let plan = author.author(&context).await.unwrap();

        assert_eq!(plan, "# Milestones\n- [ ] 1. Header\n- [ ] 2. Footer");
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].text(), PLANNING_PROMPT);
        assert!(seen[1].image_url().is_some());
    }

    #[tokio::test]
    async fn test_plan_without_milestones_is_rejected() {
        let author = GenerativePlanAuthor::new(planner("I cannot see any image."));
        let result = author.author(&Conversation::new()).await;
        assert!(matches!(result, Err(WorkflowError::EmptyPlan)));
    }

    #[tokio::test]
    async fn test_stored_plan_reads_checklist() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChecklistStore::new(dir.path().join("plan.md"));
        let author = StoredPlan::new(store.clone());

        assert!(matches!(
            author.author(&Conversation::new()).await,
            Err(WorkflowError::MissingChecklist(_))
        ));

        store.save("- [ ] a\n").unwrap();
        assert_eq!(author.author(&Conversation::new()).await.unwrap(), "- [ ] a\n");
    }
}
