//! Configuration management for Pagecraft.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::workflow::EmptyMergePolicy;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model provider settings
    pub ai: AiConfig,

    /// Where the checklist and generated page live
    pub artifacts: ArtifactsConfig,

    /// Milestone engine limits and behavior
    pub engine: EngineConfig,
}

/// Model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider name (openai, ollama)
    pub provider: String,

    /// Model to use with the OpenAI-compatible provider
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Endpoint override for OpenAI-compatible APIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    /// Ollama-specific settings
    pub ollama: OllamaConfig,
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama server URL
    pub base_url: String,

    /// Model to use (must accept images for planning)
    pub model: String,
}

/// Artifact locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory holding all generated files
    pub dir: PathBuf,

    /// Checklist file name
    pub plan: String,

    /// Structure artifact file name
    pub html: String,

    /// Presentation artifact file name
    pub css: String,
}

/// Milestone engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum milestones implemented in one run
    pub max_milestones: usize,

    /// Wall-clock budget for one run, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_secs: Option<u64>,

    /// What to do when a merge produces no content
    pub empty_merge: EmptyMergePolicy,

    /// Print generated code blocks to the terminal
    pub echo_code: bool,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.pagecraft.toml` in current directory
    /// 2. `~/.config/pagecraft/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        match Self::locate() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Path of the config file `load` would read, if any exists.
    pub fn locate() -> Option<PathBuf> {
        let local_config = PathBuf::from(".pagecraft.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::config_dir().map(|dir| dir.join("config.toml")).filter(|path| path.exists())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let config_dir =
            Self::config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(config_path)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pagecraft"))
    }
}

impl EngineConfig {
    /// Wall-clock budget as a duration.
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: "llava".to_string(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            plan: "plan.md".to_string(),
            html: "index.html".to_string(),
            css: "styles.css".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_milestones: 100,
            time_budget_secs: None,
            empty_merge: EmptyMergePolicy::default(),
            echo_code: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.ai.model, "gpt-4o");
        assert!((config.ai.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.artifacts.dir, PathBuf::from("artifacts"));
        assert_eq!(config.artifacts.plan, "plan.md");
        assert_eq!(config.engine.max_milestones, 100);
        assert_eq!(config.engine.empty_merge, EmptyMergePolicy::Preserve);
        assert!(config.engine.time_budget().is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[ai]"));
        assert!(toml_str.contains("[artifacts]"));
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("empty_merge = \"preserve\""));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [ai]
            provider = "ollama"
            temperature = 0.7

            [ai.ollama]
            model = "llava:13b"

            [artifacts]
            dir = "site"

            [engine]
            max_milestones = 3
            time_budget_secs = 600
            empty_merge = "overwrite"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ai.provider, "ollama");
        assert_eq!(config.ai.model, "gpt-4o");
        assert_eq!(config.ai.ollama.model, "llava:13b");
        assert_eq!(config.artifacts.dir, PathBuf::from("site"));
        assert_eq!(config.artifacts.html, "index.html");
        assert_eq!(config.engine.max_milestones, 3);
        assert_eq!(config.engine.time_budget(), Some(Duration::from_secs(600)));
        assert_eq!(config.engine.empty_merge, EmptyMergePolicy::Overwrite);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\necho_code = true\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert!(config.engine.echo_code);
        assert_eq!(config.ai.provider, "openai");
    }

    #[test]
    fn test_load_from_file_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[engine\n").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
