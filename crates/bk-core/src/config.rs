use crate::error::{BkError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    pub outline: OutlineConfig,
    pub session: SessionConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    pub cache_ttl_secs: u64,
    pub tab_width: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub goal: u64,
    pub commit_threshold_secs: u64,
    pub change_threshold_secs: u64,
    pub poll_interval_secs: u64,
    pub push: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub build_dir: Option<PathBuf>,
    pub converter: String,
    pub toc_depth: u32,
    pub chapter_level: u32,
    pub number_sections: bool,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 10,
            tab_width: crate::metadata::DEFAULT_TAB_WIDTH,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            goal: 1000,
            commit_threshold_secs: 30,
            change_threshold_secs: 5,
            poll_interval_secs: 10,
            push: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            build_dir: None,
            converter: "pandoc".into(),
            toc_depth: 2,
            chapter_level: 2,
            number_sections: true,
        }
    }
}

impl OutlineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl BookConfig {
    /// Load from a YAML file, or from `config.yaml` inside a project
    /// directory. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = Self::resolve(path.as_ref());
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_yaml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(BkError::from_io(path, e)),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| BkError::Config(e.to_string()))
    }

    fn resolve(path: &Path) -> PathBuf {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => path.to_path_buf(),
            _ => path.join(CONFIG_FILENAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = BookConfig::default();
        assert_eq!(cfg.outline.cache_ttl_secs, 10);
        assert_eq!(cfg.outline.tab_width, 15);
        assert_eq!(cfg.session.goal, 1000);
        assert_eq!(cfg.session.commit_threshold_secs, 30);
        assert_eq!(cfg.session.change_threshold_secs, 5);
        assert_eq!(cfg.export.converter, "pandoc");
        assert_eq!(cfg.outline.cache_ttl(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = BookConfig::from_yaml("session:\n  goal: 2500\n").unwrap();
        assert_eq!(cfg.session.goal, 2500);
        assert_eq!(cfg.session.poll_interval_secs, 10);
        assert_eq!(cfg.export.toc_depth, 2);
    }

    #[test]
    fn test_empty_yaml() {
        assert_eq!(BookConfig::from_yaml("").unwrap(), BookConfig::default());
    }

    #[test]
    fn test_malformed_yaml() {
        let err = BookConfig::from_yaml("session: [1, 2").unwrap_err();
        assert!(matches!(err, BkError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let cfg = BookConfig::load(tmp.path()).unwrap();
        assert_eq!(cfg, BookConfig::default());
    }

    #[test]
    fn test_load_from_project_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "export:\n  build_dir: out\n  number_sections: false\n",
        )
        .unwrap();
        let cfg = BookConfig::load(tmp.path()).unwrap();
        assert_eq!(cfg.export.build_dir, Some(PathBuf::from("out")));
        assert!(!cfg.export.number_sections);
    }

    #[test]
    fn test_load_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("book.yml");
        std::fs::write(&file, "outline:\n  cache_ttl_secs: 3\n").unwrap();
        let cfg = BookConfig::load(&file).unwrap();
        assert_eq!(cfg.outline.cache_ttl_secs, 3);
    }
}
