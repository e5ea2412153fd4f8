//! Folding generated fragments into the page artifacts.
//!
//! Merging is delegated to a [`FragmentIntegrator`]. The default one asks the
//! model to rewrite the artifact with the fragment included.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::{accumulate, ChatMessage, ChatProvider};

use super::artifacts::ArtifactStore;
use super::extract::{extract_code, CodeKind};
use super::WorkflowError;

/// What to persist when a merge comes back empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyMergePolicy {
    /// Keep the artifact as it was
    #[default]
    Preserve,

    /// Write the empty result
    Overwrite,
}

/// Combines an existing artifact with a new fragment.
#[async_trait]
pub trait FragmentIntegrator: Send + Sync {
    async fn integrate(
        &self,
        kind: CodeKind,
        existing: &str,
        fragment: &str,
    ) -> Result<String, WorkflowError>;
}

/// Integrator backed by a fresh, history-free model request.
#[derive(Clone)]
pub struct GenerativeIntegrator {
    provider: Arc<dyn ChatProvider>,
}

impl GenerativeIntegrator {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Instruction sent for one merge.
    pub fn merge_prompt(kind: CodeKind, existing: &str, fragment: &str) -> String {
        let name = match kind {
            CodeKind::Html => "HTML",
            CodeKind::Css => "CSS",
        };
        let keyword = kind.keyword();
        format!(
            "Keep the existing {name} below intact and integrate the new {name} into it.\n\
             Do not duplicate anything that is already present, and make sure every element \
             and block is properly closed.\n\
             Reply with the complete result in a single ```{keyword} code block.\n\n\
             Existing {name}:\n{existing}\n\n\
             {name} to add:\n{fragment}\n\n\
             Resulting {name}:"
        )
    }
}

#[async_trait]
impl FragmentIntegrator for GenerativeIntegrator {
    async fn integrate(
        &self,
        kind: CodeKind,
        existing: &str,
        fragment: &str,
    ) -> Result<String, WorkflowError> {
        let messages = [ChatMessage::user(Self::merge_prompt(kind, existing, fragment))];

        let stream = self.provider.stream_chat(&messages).await?;
        let response = accumulate(stream).await;
        Ok(extract_code(&response, kind))
    }
}

/// Applies merges to the artifact files.
#[derive(Clone)]
pub struct ArtifactMerger {
    integrator: Arc<dyn FragmentIntegrator>,
    artifacts: ArtifactStore,
    policy: EmptyMergePolicy,
}

impl ArtifactMerger {
    pub fn new(integrator: Arc<dyn FragmentIntegrator>, artifacts: ArtifactStore) -> Self {
        Self { integrator, artifacts, policy: EmptyMergePolicy::default() }
    }

    pub fn with_policy(mut self, policy: EmptyMergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn merge_structure(&self, existing: &str, fragment: &str) -> Result<String, WorkflowError> {
        self.integrator.integrate(CodeKind::Html, existing, fragment).await
    }

    pub async fn merge_presentation(
        &self,
        existing: &str,
        fragment: &str,
    ) -> Result<String, WorkflowError> {
        self.integrator.integrate(CodeKind::Css, existing, fragment).await
    }

    /// Merge `fragment` into the stored artifact and overwrite it.
    ///
    /// Empty fragments are merged too. Returns the text that was written.
    pub async fn update(&self, kind: CodeKind, fragment: &str) -> Result<String, WorkflowError> {
        let existing = self.artifacts.current(kind)?;
        let merged = match kind {
            CodeKind::Html => self.merge_structure(&existing, fragment).await?,
            CodeKind::Css => self.merge_presentation(&existing, fragment).await?,
        };

        let content = if merged.is_empty() && self.policy == EmptyMergePolicy::Preserve {
            if !existing.is_empty() {
                tracing::warn!(kind = %kind, "Merge produced no content, keeping previous artifact");
            }
            existing
        } else {
            merged
        };

        self.artifacts.write(kind, &content)?;
        Ok(content)
    }
}
