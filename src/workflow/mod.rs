//! Milestone workflow for building a page from a reference image.
//!
//! A plan author turns the conversation into a checklist of milestones; the
//! milestone engine then implements one milestone at a time, merging each
//! generated fragment into the page artifacts.
//!
//! ## Files
//!
//! - `plan.md` - Checklist of `- [ ]` / `- [x]` milestone lines
//! - `index.html` - Structure artifact
//! - `styles.css` - Presentation artifact
//!
//! ## Components
//!
//! - `PlanAuthor` - Produces the checklist
//! - `ContentGenerator` - Generates code for one milestone
//! - `ArtifactMerger` - Folds fragments into the artifacts
//! - `MilestoneEngine` - Drives the checklist to completion
//! - `Supervisor` - Plans, then hands milestones to the engine one by one

mod artifacts;
mod checklist;
mod engine;
mod extract;
mod generator;
mod merger;
mod planning;
mod progress;
mod supervisor;

pub use artifacts::{ArtifactPaths, ArtifactStore, HTML_SKELETON};
pub use checklist::{
    find_next_pending, mark_done, Checklist, ChecklistStore, Milestone, MilestoneId,
    MilestoneState,
};
pub use engine::{
    EngineLimits, EngineRun, EngineState, HaltReason, MilestoneEngine, RunOutcome, StepOutcome,
};
pub use extract::{extract_code, CodeKind};
pub use generator::{ContentGenerator, GeneratedCode, IMPLEMENTATION_PROMPT};
pub use merger::{ArtifactMerger, EmptyMergePolicy, FragmentIntegrator, GenerativeIntegrator};
pub use planning::{extract_plan, GenerativePlanAuthor, PlanAuthor, StoredPlan, PLANNING_PROMPT};
pub use progress::{ConsoleProgress, ProgressEvent, ProgressSink, RecordingProgress};
pub use supervisor::{Supervisor, SupervisorReport};

use std::path::PathBuf;

use crate::ai::AIError;

/// Workflow error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("No checklist found at {0} (run `pagecraft plan` first)")]
    MissingChecklist(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Provider(#[from] AIError),

    #[error("Plan contained no milestones")]
    EmptyPlan,
}

impl WorkflowError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
