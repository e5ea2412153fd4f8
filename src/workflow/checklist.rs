//! Checklist documents.
//!
//! A checklist is plain markdown. Lines whose trimmed text starts with
//! `- [ ]` are pending milestones, `- [x]` marks a finished one, and every
//! other line is carried through untouched.
//!
//! Two views are offered. The textual functions ([`find_next_pending`],
//! [`mark_done`]) identify a milestone by its exact line text. [`Checklist`]
//! numbers milestone lines when parsing so that marking one never touches a
//! duplicate elsewhere in the document.

use std::fmt;
use std::path::{Path, PathBuf};

use super::artifacts::atomic_write;
use super::WorkflowError;

const PENDING: &str = "- [ ]";
const DONE: &str = "- [x]";

/// First pending milestone line in the document, trimmed.
pub fn find_next_pending(document: &str) -> Option<String> {
    document.lines().map(str::trim).find(|line| line.starts_with(PENDING)).map(str::to_string)
}

/// Mark a milestone done by its line text.
///
/// Every verbatim occurrence of `milestone` is rewritten, so two identical
/// pending lines are both flipped. Text that is empty or not a pending
/// milestone leaves the document unchanged.
pub fn mark_done(document: &str, milestone: &str) -> String {
    if milestone.is_empty() || !milestone.starts_with(PENDING) {
        return document.to_string();
    }
    document.replace(milestone, &milestone.replace(PENDING, DONE))
}

/// Position of a milestone among the milestone lines of a checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MilestoneId(usize);

impl MilestoneId {
    /// Zero-based index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// Completion state of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneState {
    Pending,
    Done,
}

/// One milestone line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub id: MilestoneId,

    /// Trimmed line text including the checkbox marker
    pub text: String,

    /// Text after the checkbox marker
    pub label: String,

    pub state: MilestoneState,

    line: usize,
}

impl Milestone {
    pub fn is_pending(&self) -> bool {
        self.state == MilestoneState::Pending
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Parsed checklist document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checklist {
    lines: Vec<String>,
    milestones: Vec<Milestone>,
}

impl Checklist {
    /// Parse a document. Never fails; a document without milestone lines is
    /// simply complete.
    pub fn parse(document: &str) -> Self {
        let lines: Vec<String> = document.split('\n').map(str::to_string).collect();
        let mut milestones = Vec::new();

        for (line_no, line) in lines.iter().enumerate() {
            let text = line.trim();
            let Some((state, label)) = classify(text) else {
                continue;
            };
            milestones.push(Milestone {
                id: MilestoneId(milestones.len()),
                text: text.to_string(),
                label: label.to_string(),
                state,
                line: line_no,
            });
        }

        Self { lines, milestones }
    }

    /// Serialize back to text. Untouched documents round-trip exactly.
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn get(&self, id: MilestoneId) -> Option<&Milestone> {
        self.milestones.get(id.0)
    }

    /// First pending milestone in document order.
    pub fn next_pending(&self) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.is_pending())
    }

    /// Flip one milestone to done.
    ///
    /// Returns false if the id is unknown or the milestone was already done.
    pub fn mark_done(&mut self, id: MilestoneId) -> bool {
        let Some(milestone) = self.milestones.get_mut(id.0) else {
            return false;
        };
        if !milestone.is_pending() {
            return false;
        }

        let line = &mut self.lines[milestone.line];
        *line = line.replacen(PENDING, DONE, 1);
        milestone.text = milestone.text.replacen(PENDING, DONE, 1);
        milestone.state = MilestoneState::Done;
        true
    }

    pub fn pending_count(&self) -> usize {
        self.milestones.iter().filter(|m| m.is_pending()).count()
    }

    pub fn done_count(&self) -> usize {
        self.milestones.len() - self.pending_count()
    }

    pub fn is_complete(&self) -> bool {
        self.next_pending().is_none()
    }
}

fn classify(text: &str) -> Option<(MilestoneState, &str)> {
    if let Some(rest) = text.strip_prefix(PENDING) {
        return Some((MilestoneState::Pending, rest.trim()));
    }
    text.strip_prefix(DONE)
        .or_else(|| text.strip_prefix("- [X]"))
        .map(|rest| (MilestoneState::Done, rest.trim()))
}

/// Checklist document on disk.
#[derive(Debug, Clone)]
pub struct ChecklistStore {
    path: PathBuf,
}

impl ChecklistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the whole document.
    pub fn load(&self) -> Result<String, WorkflowError> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WorkflowError::MissingChecklist(self.path.clone())
            } else {
                WorkflowError::io(&self.path, e)
            }
        })
    }

    pub fn load_checklist(&self) -> Result<Checklist, WorkflowError> {
        self.load().map(|document| Checklist::parse(&document))
    }

    /// Replace the whole document.
    pub fn save(&self, document: &str) -> Result<(), WorkflowError> {
        atomic_write(&self.path, document)?;
        tracing::debug!(path = %self.path.display(), bytes = document.len(), "Checklist saved");
        Ok(())
    }

    pub fn save_checklist(&self, checklist: &Checklist) -> Result<(), WorkflowError> {
        self.save(&checklist.render())
    }
}
