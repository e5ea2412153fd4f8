//! Progress notifications.
//!
//! The engine reports what it is doing through a [`ProgressSink`]. Events are
//! informational; nothing reads them back.

use std::fmt;
use std::sync::Mutex;

use super::engine::HaltReason;
use super::extract::CodeKind;

/// Something worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A checklist was written
    PlanAuthored { milestones: usize },

    MilestoneStarted { milestone: String },

    /// A duplicate of an already implemented milestone was marked done
    MilestoneSkipped { milestone: String },

    /// Code extracted for one milestone (debug output)
    FragmentGenerated { kind: CodeKind, code: String },

    /// Artifact content after a merge (debug output)
    ArtifactUpdated { kind: CodeKind, content: String },

    MilestoneCompleted { milestone: String },

    /// The checklist ran out of pending milestones
    AllComplete { milestones: Vec<String> },

    /// The run found nothing pending on its first scan
    NothingToDo,

    /// The run stopped at a limit with milestones still pending
    Halted { milestones: Vec<String>, reason: HaltReason },

    Failed { error: String },
}

impl ProgressEvent {
    /// Whether this event only carries debug output.
    pub fn is_debug(&self) -> bool {
        matches!(self, Self::FragmentGenerated { .. } | Self::ArtifactUpdated { .. })
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlanAuthored { milestones } => write!(f, "Plan ready with {milestones} milestones"),
            Self::MilestoneStarted { milestone } => write!(f, "Implementing milestone: {milestone}"),
            Self::MilestoneSkipped { milestone } => {
                write!(f, "Skipping already implemented milestone: {milestone}")
            }
            Self::FragmentGenerated { kind, code } => write!(f, "Generated {kind} code:\n{code}"),
            Self::ArtifactUpdated { kind, content } => write!(f, "Updated {kind} artifact:\n{content}"),
            Self::MilestoneCompleted { milestone } => write!(f, "Completed milestone: {milestone}"),
            Self::AllComplete { milestones } if milestones.is_empty() => {
                f.write_str("All milestones are complete.")
            }
            Self::AllComplete { milestones } => write!(
                f,
                "Completed milestones: {}. Updated files: index.html, styles.css. All milestones are complete.",
                milestones.join(", ")
            ),
            Self::NothingToDo => {
                f.write_str("No milestones to implement; every milestone is already complete.")
            }
            Self::Halted { milestones, reason } => write!(
                f,
                "Stopped after {} milestones ({reason}). Run again to continue.",
                milestones.len()
            ),
            Self::Failed { error } => write!(f, "Failed: {error}"),
        }
    }
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

/// Prints events to the terminal.
#[derive(Debug, Clone, Default)]
pub struct ConsoleProgress {
    echo_code: bool,
}

impl ConsoleProgress {
    pub fn new(echo_code: bool) -> Self {
        Self { echo_code }
    }
}

impl ProgressSink for ConsoleProgress {
    fn notify(&self, event: ProgressEvent) {
        match event {
            _ if event.is_debug() && !self.echo_code => {}
            // The command's own error report covers failures.
            ProgressEvent::Failed { .. } => {}
            _ => println!("{event}"),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn notify(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
