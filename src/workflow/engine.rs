//! Milestone execution engine.
//!
//! Drives the checklist to completion one milestone at a time:
//!
//! ```text
//! Scanning -> no pending milestone            -> DoneAll
//! Scanning -> duplicate of one done this run  -> Skipping -> Scanning
//! Scanning -> pending milestone               -> Implementing -> Scanning
//! ```
//!
//! Implementing a milestone generates its code, merges the HTML and the CSS
//! fragments into the artifacts, then marks the milestone done and saves the
//! checklist.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ai::{ChatProvider, Conversation};
use crate::core::EngineConfig;

use super::artifacts::{ArtifactPaths, ArtifactStore};
use super::checklist::{Checklist, ChecklistStore, Milestone};
use super::extract::CodeKind;
use super::generator::ContentGenerator;
use super::merger::{ArtifactMerger, EmptyMergePolicy, GenerativeIntegrator};
use super::progress::{ProgressEvent, ProgressSink};
use super::WorkflowError;

/// Bounds on a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Milestones implemented before the run halts
    pub max_milestones: usize,

    /// Wall-clock time after which no new milestone is started
    pub time_budget: Option<Duration>,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self { max_milestones: 100, time_budget: None }
    }
}

impl EngineLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self { max_milestones: config.max_milestones, time_budget: config.time_budget() }
    }
}

/// Why a run stopped with milestones still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    MilestoneLimit(usize),
    TimeBudget(Duration),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MilestoneLimit(max) => write!(f, "limit of {max} milestones reached"),
            Self::TimeBudget(budget) => write!(f, "time budget of {}s used up", budget.as_secs()),
        }
    }
}

/// Where the engine is in its cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Scanning,
    Skipping(Milestone),
    Implementing(Milestone),
    DoneAll,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing was pending when the run started
    NothingToDo,

    /// Every milestone is done; lists those implemented by this run
    Completed { milestones: Vec<String> },

    /// A limit stopped the run early
    Halted { milestones: Vec<String>, reason: HaltReason },
}

impl RunOutcome {
    /// Milestones implemented by the run.
    pub fn milestones(&self) -> &[String] {
        match self {
            Self::NothingToDo => &[],
            Self::Completed { milestones } | Self::Halted { milestones, .. } => milestones,
        }
    }

    /// Final progress notification for this outcome.
    pub fn to_event(&self) -> ProgressEvent {
        match self {
            Self::NothingToDo => ProgressEvent::NothingToDo,
            Self::Completed { milestones } => {
                ProgressEvent::AllComplete { milestones: milestones.clone() }
            }
            Self::Halted { milestones, reason } => {
                ProgressEvent::Halted { milestones: milestones.clone(), reason: *reason }
            }
        }
    }

    /// One-line recap, also appended to the conversation.
    pub fn summary(&self) -> String {
        match self {
            Self::NothingToDo => {
                "No milestones to implement; every milestone is already complete.".to_string()
            }
            Self::Completed { milestones } if milestones.is_empty() => {
                "All milestones are complete.".to_string()
            }
            Self::Completed { milestones } => format!(
                "Completed milestones: {}. Updated files: index.html, styles.css.",
                milestones.join(", ")
            ),
            Self::Halted { milestones, reason } => format!(
                "Completed milestones: {}. Stopped early: {reason}.",
                if milestones.is_empty() { "none".to_string() } else { milestones.join(", ") }
            ),
        }
    }
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub outcome: RunOutcome,

    /// The caller's conversation with the run summary appended
    pub context: Conversation,
}

/// Result of a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Implemented(Milestone),
    Skipped(Milestone),
    Exhausted,
}

/// Implements checklist milestones one after another.
pub struct MilestoneEngine {
    checklist: ChecklistStore,
    generator: ContentGenerator,
    merger: ArtifactMerger,
    progress: Arc<dyn ProgressSink>,
    limits: EngineLimits,
    implemented: HashSet<String>,
    state: EngineState,
}

impl MilestoneEngine {
    pub fn new(
        checklist: ChecklistStore,
        generator: ContentGenerator,
        merger: ArtifactMerger,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            checklist,
            generator,
            merger,
            progress,
            limits: EngineLimits::default(),
            implemented: HashSet::new(),
            state: EngineState::Scanning,
        }
    }

    /// Engine using one provider for generation and merging.
    pub fn with_provider(
        provider: Arc<dyn ChatProvider>,
        paths: &ArtifactPaths,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let integrator = Arc::new(GenerativeIntegrator::new(Arc::clone(&provider)));
        Self::new(
            ChecklistStore::new(&paths.plan),
            ContentGenerator::new(provider),
            ArtifactMerger::new(integrator, ArtifactStore::new(paths.clone())),
            progress,
        )
    }

    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_merger(mut self, merger: ArtifactMerger) -> Self {
        self.merger = merger;
        self
    }

    pub fn with_empty_merge(mut self, policy: EmptyMergePolicy) -> Self {
        self.merger = self.merger.with_policy(policy);
        self
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn checklist_store(&self) -> &ChecklistStore {
        &self.checklist
    }

    /// Whether this session already implemented a milestone with this label.
    pub fn has_implemented(&self, label: &str) -> bool {
        self.implemented.contains(label)
    }

    /// Forget which milestones this session implemented.
    pub fn reset(&mut self) {
        self.implemented.clear();
        self.state = EngineState::Scanning;
    }

    /// Implement pending milestones until none remain or a limit is hit.
    ///
    /// `context` is not modified; the returned run carries a copy with a
    /// summary message appended.
    pub async fn run(&mut self, context: &Conversation) -> Result<EngineRun, WorkflowError> {
        self.reset();
        match self.drive(context).await {
            Ok(outcome) => {
                self.progress.notify(outcome.to_event());

                let mut context = context.clone();
                context.push_assistant(outcome.summary());
                Ok(EngineRun { outcome, context })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Like [`run`](Self::run), with the stored checklist document appended
    /// to the conversation as the plan the model is working from.
    pub async fn run_with_plan(&mut self, context: &Conversation) -> Result<EngineRun, WorkflowError> {
        let plan = self.checklist.load().map_err(|e| self.fail(e))?;

        let mut context = context.clone();
        context.push_assistant(plan);
        self.run(&context).await
    }

    /// Run exactly one scan cycle against the stored checklist.
    pub async fn run_next(&mut self, context: &Conversation) -> Result<StepOutcome, WorkflowError> {
        let result = match self.checklist.load_checklist() {
            Ok(mut checklist) => self.advance(&mut checklist, context).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| self.fail(e))
    }

    async fn drive(&mut self, context: &Conversation) -> Result<RunOutcome, WorkflowError> {
        let started = Instant::now();
        let mut checklist = self.checklist.load_checklist()?;
        let mut completed = Vec::new();
        let mut first_scan = true;

        loop {
            if let Some(next) = checklist.next_pending() {
                if !self.has_implemented(&next.label) {
                    if let Some(reason) = self.limit_reached(completed.len(), started) {
                        tracing::info!(%reason, remaining = checklist.pending_count(), "Run halted");
                        return Ok(RunOutcome::Halted { milestones: completed, reason });
                    }
                }
            }

            match self.advance(&mut checklist, context).await? {
                StepOutcome::Implemented(milestone) => completed.push(milestone.label),
                StepOutcome::Skipped(_) => {}
                StepOutcome::Exhausted if first_scan => return Ok(RunOutcome::NothingToDo),
                StepOutcome::Exhausted => return Ok(RunOutcome::Completed { milestones: completed }),
            }
            first_scan = false;
        }
    }

    pub(crate) fn limit_reached(&self, completed: usize, started: Instant) -> Option<HaltReason> {
        if completed >= self.limits.max_milestones {
            return Some(HaltReason::MilestoneLimit(self.limits.max_milestones));
        }
        self.limits
            .time_budget
            .filter(|budget| started.elapsed() >= *budget)
            .map(HaltReason::TimeBudget)
    }

    async fn advance(
        &mut self,
        checklist: &mut Checklist,
        context: &Conversation,
    ) -> Result<StepOutcome, WorkflowError> {
        self.state = EngineState::Scanning;
        let Some(milestone) = checklist.next_pending().cloned() else {
            self.state = EngineState::DoneAll;
            return Ok(StepOutcome::Exhausted);
        };

        if self.implemented.contains(&milestone.label) {
            self.state = EngineState::Skipping(milestone.clone());
            checklist.mark_done(milestone.id);
            self.checklist.save_checklist(checklist)?;
            tracing::info!(milestone = %milestone, id = %milestone.id, "Skipped duplicate milestone");
            self.progress.notify(ProgressEvent::MilestoneSkipped { milestone: milestone.label.clone() });
            self.state = EngineState::Scanning;
            return Ok(StepOutcome::Skipped(milestone));
        }

        self.state = EngineState::Implementing(milestone.clone());
        self.implement(&milestone, context).await?;

        checklist.mark_done(milestone.id);
        self.checklist.save_checklist(checklist)?;
        self.implemented.insert(milestone.label.clone());

        tracing::info!(milestone = %milestone, id = %milestone.id, "Milestone implemented");
        self.progress.notify(ProgressEvent::MilestoneCompleted { milestone: milestone.label.clone() });
        self.state = EngineState::Scanning;
        Ok(StepOutcome::Implemented(milestone))
    }

    async fn implement(&self, milestone: &Milestone, context: &Conversation) -> Result<(), WorkflowError> {
        self.progress.notify(ProgressEvent::MilestoneStarted { milestone: milestone.label.clone() });

        let code = self.generator.generate_for_milestone(&milestone.text, context).await?;

        for kind in [CodeKind::Html, CodeKind::Css] {
            let fragment = code.get(kind);
            self.progress.notify(ProgressEvent::FragmentGenerated { kind, code: fragment.to_string() });

            let content = self.merger.update(kind, fragment).await?;
            self.progress.notify(ProgressEvent::ArtifactUpdated { kind, content });
        }
        Ok(())
    }

    fn fail(&self, error: WorkflowError) -> WorkflowError {
        tracing::error!(error = %error, "Milestone run failed");
        self.progress.notify(ProgressEvent::Failed { error: error.to_string() });
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{from_tokens, AIError, ChatMessage, TokenStream};
    use crate::workflow::{FragmentIntegrator, RecordingProgress};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies in order; an empty reply once the script runs out.
    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatProvider for Scripted {
        async fn stream_chat(&self, _: &[ChatMessage]) -> Result<TokenStream, AIError> {
            *self.calls.lock().unwrap() += 1;
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or_default();
            Ok(from_tokens(vec![reply]))
        }
        fn name(&self) -> &str {
            "scripted"
        }
        fn model(&self) -> &str {
            "scripted"
        }
    }

    /// Appends fragments without a model call.
    struct Append;

    #[async_trait]
    impl FragmentIntegrator for Append {
        async fn integrate(&self, _: CodeKind, existing: &str, fragment: &str) -> Result<String, WorkflowError> {
            Ok(format!("{existing}{fragment}"))
        }
    }

    fn engine_with(
        dir: &std::path::Path,
        provider: Arc<Scripted>,
        progress: Arc<RecordingProgress>,
    ) -> MilestoneEngine {
        let paths = ArtifactPaths::new(dir);
        let merger = ArtifactMerger::new(Arc::new(Append), ArtifactStore::new(paths.clone()));
        MilestoneEngine::with_provider(provider, &paths, progress).with_merger(merger)
    }

    fn code(label: &str) -> String {
        format!("```html\n<p>{label}</p>\n```\n```css\n.{label} {{}}\n```")
    }

    #[tokio::test]
    async fn test_run_implements_every_pending_milestone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "# Plan\n- [ ] a\n- [x] b\n- [ ] c\n").unwrap();
        let provider = Scripted::new(&[&code("a"), &code("c")]);
        let progress = Arc::new(RecordingProgress::new());
        let mut engine = engine_with(dir.path(), provider.clone(), progress.clone());

        let run = engine.run(&Conversation::new()).await.unwrap();

        assert_eq!(run.outcome, RunOutcome::Completed { milestones: vec!["a".into(), "c".into()] });
        assert_eq!(provider.calls(), 2);
        assert_eq!(engine.state(), &EngineState::DoneAll);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("plan.md")).unwrap(),
            "# Plan\n- [x] a\n- [x] b\n- [x] c\n"
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("styles.css")).unwrap(), ".a {}.c {}");
        assert_eq!(run.context.last_assistant_text(), Some(run.outcome.summary().as_str()));
    }

    #[tokio::test]
    async fn test_nothing_to_do_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "- [x] a\n").unwrap();
        let provider = Scripted::new(&[]);
        let progress = Arc::new(RecordingProgress::new());
        let mut engine = engine_with(dir.path(), provider.clone(), progress.clone());

        let run = engine.run(&Conversation::new()).await.unwrap();

        assert_eq!(run.outcome, RunOutcome::NothingToDo);
        assert_eq!(provider.calls(), 0);
        assert_eq!(progress.events(), vec![ProgressEvent::NothingToDo]);
        assert!(!dir.path().join("index.html").exists());
    }

    #[tokio::test]
    async fn test_duplicate_milestone_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "- [ ] Footer\n- [ ] Hero\n  - [ ] Footer\n").unwrap();
        let provider = Scripted::new(&[&code("footer"), &code("hero")]);
        let progress = Arc::new(RecordingProgress::new());
        let mut engine = engine_with(dir.path(), provider.clone(), progress.clone());

        let run = engine.run(&Conversation::new()).await.unwrap();

        assert_eq!(run.outcome.milestones(), ["Footer".to_string(), "Hero".to_string()]);
        assert_eq!(provider.calls(), 2);
        assert!(progress
            .events()
            .contains(&ProgressEvent::MilestoneSkipped { milestone: "Footer".to_string() }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("plan.md")).unwrap(),
            "- [x] Footer\n- [x] Hero\n  - [x] Footer\n"
        );
    }

    #[tokio::test]
    async fn test_milestone_limit_halts_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "- [ ] a\n- [ ] b\n- [ ] c\n").unwrap();
        let provider = Scripted::new(&[&code("a"), &code("b")]);
        let progress = Arc::new(RecordingProgress::new());
        let mut engine = engine_with(dir.path(), provider.clone(), progress.clone())
            .with_limits(EngineLimits { max_milestones: 2, time_budget: None });

        let run = engine.run(&Conversation::new()).await.unwrap();

        assert_eq!(
            run.outcome,
            RunOutcome::Halted {
                milestones: vec!["a".into(), "b".into()],
                reason: HaltReason::MilestoneLimit(2)
            }
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("plan.md")).unwrap(),
            "- [x] a\n- [x] b\n- [ ] c\n"
        );
    }

    #[tokio::test]
    async fn test_zero_time_budget_halts_before_generation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "- [ ] a\n").unwrap();
        let provider = Scripted::new(&[]);
        let progress = Arc::new(RecordingProgress::new());
        let mut engine = engine_with(dir.path(), provider.clone(), progress.clone())
            .with_limits(EngineLimits { max_milestones: 10, time_budget: Some(Duration::ZERO) });

        let run = engine.run(&Conversation::new()).await.unwrap();

        assert!(matches!(run.outcome, RunOutcome::Halted { reason: HaltReason::TimeBudget(_), .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_checklist_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Scripted::new(&[]);
        let progress = Arc::new(RecordingProgress::new());
        let mut engine = engine_with(dir.path(), provider.clone(), progress.clone());

        let err = engine.run(&Conversation::new()).await.unwrap_err();

        assert!(matches!(err, WorkflowError::MissingChecklist(_)));
        assert!(matches!(progress.events().last(), Some(ProgressEvent::Failed { .. })));
        assert!(!dir.path().join("index.html").exists());
    }

    #[tokio::test]
    async fn test_run_next_does_one_milestone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan.md"), "- [ ] a\n- [ ] b\n").unwrap();
        let provider = Scripted::new(&[&code("a")]);
        let progress = Arc::new(RecordingProgress::new());
        let mut engine = engine_with(dir.path(), provider.clone(), progress.clone());

        let step = engine.run_next(&Conversation::new()).await.unwrap();

        assert!(matches!(step, StepOutcome::Implemented(ref m) if m.label == "a"));
        assert_eq!(std::fs::read_to_string(dir.path().join("plan.md")).unwrap(), "- [x] a\n- [ ] b\n");
    }

    #[test]
    fn test_summary_text() {
        let outcome = RunOutcome::Completed { milestones: vec!["Header".into(), "Footer".into()] };
        assert_eq!(
            outcome.summary(),
            "Completed milestones: Header, Footer. Updated files: index.html, styles.css."
        );
        assert_eq!(RunOutcome::NothingToDo.milestones().len(), 0);
    }
}
