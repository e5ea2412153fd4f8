//! Generated page files.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::extract::CodeKind;
use super::WorkflowError;
use crate::core::ArtifactsConfig;

/// Starting point for the structure artifact before anything is generated.
pub const HTML_SKELETON: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <link rel="stylesheet" href="styles.css">
    <title>Your Website</title>
</head>
<body>
</body>
</html>"#;

/// Write a file by swapping in a fully written temp file.
///
/// Parent directories are created as needed.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<(), WorkflowError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| WorkflowError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| WorkflowError::io(dir, e))?;
    tmp.write_all(content.as_bytes()).map_err(|e| WorkflowError::io(path, e))?;
    tmp.persist(path).map_err(|e| WorkflowError::io(path, e.error))?;
    Ok(())
}

/// Locations of the checklist and the two artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub plan: PathBuf,
    pub html: PathBuf,
    pub css: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            plan: dir.join("plan.md"),
            html: dir.join("index.html"),
            css: dir.join("styles.css"),
            dir,
        }
    }

    pub fn from_config(config: &ArtifactsConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            plan: config.dir.join(&config.plan),
            html: config.dir.join(&config.html),
            css: config.dir.join(&config.css),
        }
    }

    pub fn path_for(&self, kind: CodeKind) -> &Path {
        match kind {
            CodeKind::Html => &self.html,
            CodeKind::Css => &self.css,
        }
    }
}

/// Read and overwrite access to the structure and presentation artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    paths: ArtifactPaths,
}

impl ArtifactStore {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    /// Content used when the artifact has never been written.
    pub fn initial_content(kind: CodeKind) -> &'static str {
        match kind {
            CodeKind::Html => HTML_SKELETON,
            CodeKind::Css => "",
        }
    }

    /// Stored content, or `None` if the file does not exist.
    pub fn read(&self, kind: CodeKind) -> Result<Option<String>, WorkflowError> {
        let path = self.paths.path_for(kind);
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorkflowError::io(path, e)),
        }
    }

    /// Stored content, falling back to the initial content.
    pub fn current(&self, kind: CodeKind) -> Result<String, WorkflowError> {
        Ok(self.read(kind)?.unwrap_or_else(|| Self::initial_content(kind).to_string()))
    }

    /// Replace the artifact wholesale.
    pub fn write(&self, kind: CodeKind, content: &str) -> Result<(), WorkflowError> {
        let path = self.paths.path_for(kind);
        atomic_write(path, content)?;
        tracing::debug!(kind = %kind, path = %path.display(), bytes = content.len(), "Artifact written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_from_config() {
        let config = ArtifactsConfig {
            dir: PathBuf::from("site"),
            html: "page.html".to_string(),
            ..ArtifactsConfig::default()
        };
        let paths = ArtifactPaths::from_config(&config);

        assert_eq!(paths.plan, PathBuf::from("site/plan.md"));
        assert_eq!(paths.path_for(CodeKind::Html), Path::new("site/page.html"));
        assert_eq!(paths.path_for(CodeKind::Css), Path::new("site/styles.css"));
    }

    #[test]
    fn test_skeleton_links_stylesheet() {
        assert!(HTML_SKELETON.contains(r#"<link rel="stylesheet" href="styles.css">"#));
        assert!(HTML_SKELETON.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_current_falls_back_to_initial_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(ArtifactPaths::new(dir.path()));

        assert!(store.read(CodeKind::Html).unwrap().is_none());
        assert_eq!(store.current(CodeKind::Html).unwrap(), HTML_SKELETON);
        assert_eq!(store.current(CodeKind::Css).unwrap(), "");
    }

    #[test]
    fn test_write_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(ArtifactPaths::new(dir.path().join("out")));

        store.write(CodeKind::Css, "a { color: red; }\nb { color: blue; }").unwrap();
        store.write(CodeKind::Css, "a {}").unwrap();

        assert_eq!(store.read(CodeKind::Css).unwrap().as_deref(), Some("a {}"));
    }

    #[test]
    fn test_atomic_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.md");
        atomic_write(&path, "- [ ] one").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "- [ ] one");
    }
}
