//! Core types for Pagecraft.
//!
//! Currently just configuration; shared by the CLI, the providers and the
//! workflow.

mod config;

pub use config::{AiConfig, ArtifactsConfig, Config, EngineConfig, OllamaConfig};
