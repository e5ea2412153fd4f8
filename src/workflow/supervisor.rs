//! Delegation layer: plan first, then hand milestones to the engine one by one.

use std::sync::Arc;
use std::time::Instant;

use crate::ai::Conversation;

use super::checklist::Checklist;
use super::engine::{MilestoneEngine, RunOutcome, StepOutcome};
use super::planning::PlanAuthor;
use super::progress::{ProgressEvent, ProgressSink};
use super::WorkflowError;

/// Result of a supervised run.
#[derive(Debug, Clone)]
pub struct SupervisorReport {
    /// The checklist as authored, before any milestone was done
    pub plan: String,

    pub outcome: RunOutcome,

    /// Caller's conversation plus the plan and the run summary
    pub context: Conversation,
}

/// Runs the plan author, then drives the engine milestone by milestone.
pub struct Supervisor {
    author: Arc<dyn PlanAuthor>,
    engine: MilestoneEngine,
    progress: Arc<dyn ProgressSink>,
}

impl Supervisor {
    pub fn new(
        author: Arc<dyn PlanAuthor>,
        engine: MilestoneEngine,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self { author, engine, progress }
    }

    /// Author and save the plan, then implement it.
    ///
    /// A local copy of the checklist is advanced alongside the engine so the
    /// next milestone is known without rereading the file. If the engine
    /// reports a different milestone than expected, the copy is reloaded.
    pub async fn execute(&mut self, context: &Conversation) -> Result<SupervisorReport, WorkflowError> {
        let plan = match self.author_plan(context).await {
            Ok(plan) => plan,
            Err(e) => {
                self.progress.notify(ProgressEvent::Failed { error: e.to_string() });
                return Err(e);
            }
        };

        let mut local = Checklist::parse(&plan);
        self.progress.notify(ProgressEvent::PlanAuthored { milestones: local.milestones().len() });

        let mut context = context.clone();
        context.push_assistant(plan.clone());

        let outcome = self.delegate(&mut local, &context).await?;
        self.progress.notify(outcome.to_event());
        context.push_assistant(outcome.summary());

        Ok(SupervisorReport { plan, outcome, context })
    }

    async fn author_plan(&self, context: &Conversation) -> Result<String, WorkflowError> {
        let plan = self.author.author(context).await?;
        self.engine.checklist_store().save(&plan)?;
        Ok(plan)
    }

    async fn delegate(
        &mut self,
        local: &mut Checklist,
        context: &Conversation,
    ) -> Result<RunOutcome, WorkflowError> {
        let started = Instant::now();
        let mut completed = Vec::new();
        self.engine.reset();

        if local.is_complete() {
            return Ok(RunOutcome::NothingToDo);
        }

        while let Some(expected) = local.next_pending().cloned() {
            if !self.engine.has_implemented(&expected.label) {
                if let Some(reason) = self.engine.limit_reached(completed.len(), started) {
                    return Ok(RunOutcome::Halted { milestones: completed, reason });
                }
            }

            tracing::debug!(milestone = %expected, id = %expected.id, "Delegating milestone");
            let (milestone, implemented) = match self.engine.run_next(context).await? {
                StepOutcome::Implemented(m) => (m, true),
                StepOutcome::Skipped(m) => (m, false),
                StepOutcome::Exhausted => {
                    *local = self.reload()?;
                    break;
                }
            };

            if milestone.id == expected.id {
                local.mark_done(milestone.id);
            } else {
                tracing::warn!(
                    expected = %expected,
                    actual = %milestone,
                    "Checklist changed on disk, reloading"
                );
                *local = self.reload()?;
            }
            if implemented {
                completed.push(milestone.label);
            }
        }

        Ok(RunOutcome::Completed { milestones: completed })
    }

    fn reload(&self) -> Result<Checklist, WorkflowError> {
        self.engine.checklist_store().load_checklist().map_err(|e| {
            tracing::error!(error = %e, "Checklist reload failed");
            self.progress.notify(ProgressEvent::Failed { error: e.to_string() });
            e
        })
    }
}
