#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unnecessary_lazy_evaluations)]
#![allow(clippy::cast_possible_truncation)]

//! # Pagecraft
//!
//! Build a static web page from a reference image, one milestone at a time.
//!
//! A model first writes a plan: an overview of the page and a checklist of
//! milestones. Each milestone is then implemented by generating HTML and CSS
//! and merging them into `index.html` and `styles.css`.
//!
//! ## Features
//!
//! - **Checklist Plans**: Plain markdown `- [ ]` / `- [x]` milestones you can edit by hand
//! - **Incremental Merging**: Each fragment is folded into the existing page, never appended blindly
//! - **Streaming Providers**: OpenAI-compatible APIs and local Ollama models
//! - **Bounded Runs**: Milestone caps and wall-clock budgets
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a plan from a screenshot
//! pagecraft plan --image mockup.png
//!
//! # Implement it
//! pagecraft run --image mockup.png
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod ai;
pub mod core;
pub mod workflow;

pub use ai::{AIError, ChatMessage, ChatProvider, Conversation};
pub use core::Config;
pub use workflow::{
    Checklist, ChecklistStore, MilestoneEngine, ProgressEvent, RunOutcome, Supervisor,
    WorkflowError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "pagecraft";
