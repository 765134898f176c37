//! Configuration loading
//!
//! Config file resolution, highest priority first:
//! 1. `FIELDREP_CONFIG` environment variable
//! 2. `<user config dir>/fieldrep/config.toml`
//! 3. compiled defaults
//!
//! A missing config file is not an error: the defaults apply. A file that
//! exists but does not parse is an error.
//!
//! ```toml
//! [store]
//! backend = "firestore"        # or "sqlite"
//! sqlite_path = "fieldrep.db"
//! page_size = 200
//!
//! [collections]
//! projects = "projects"
//! reports = ["inspection_reports", "ut_reports"]
//!
//! [logging]
//! level = "info"
//! ```

use crate::reconcile::bulk::DEFAULT_PAGE_SIZE;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "FIELDREP_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Firestore,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Firestore,
            sqlite_path: PathBuf::from("fieldrep.db"),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    pub projects: String,
    /// Report collections, one per inspection technique
    pub reports: Vec<String>,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            projects: "projects".to_string(),
            reports: vec!["inspection_reports".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub collections: CollectionsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.collections.projects.trim().is_empty() {
            return Err(Error::Config("collections.projects must not be empty".to_string()));
        }
        if self.collections.reports.is_empty() {
            return Err(Error::Config("collections.reports must list at least one collection".to_string()));
        }
        if let Some(blank) = self.collections.reports.iter().position(|c| c.trim().is_empty()) {
            return Err(Error::Config(format!("collections.reports[{}] is empty", blank)));
        }
        if self.store.page_size == 0 {
            return Err(Error::Config("store.page_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Load from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}

/// Config file to load, if any
///
/// An explicit path (from `FIELDREP_CONFIG`) is returned even when it does
/// not exist so that loading reports the problem instead of silently
/// falling back.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|d| d.join("fieldrep").join("config.toml"))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.store.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.collections.projects, "projects");
        assert_eq!(config.collections.reports, vec!["inspection_reports"]);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [collections]
            reports = ["ut_reports", "pt_reports"]
            "#,
        )
        .unwrap();
        assert_eq!(config.collections.projects, "projects");
        assert_eq!(config.collections.reports, vec!["ut_reports", "pt_reports"]);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_sqlite_backend() {
        let config = Config::from_toml_str(
            r#"
            [store]
            backend = "sqlite"
            sqlite_path = "/var/lib/fieldrep/mirror.db"
            page_size = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.sqlite_path, PathBuf::from("/var/lib/fieldrep/mirror.db"));
        assert_eq!(config.store.page_size, 50);
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let err = Config::from_toml_str("[store]\nbackend = \"mongo\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_empty_report_list() {
        let err = Config::from_toml_str("[collections]\nreports = []\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        assert!(Config::from_toml_str("[store]\npage_size = 0\n").is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_config_path(Some("/etc/fieldrep/custom.toml"));
        assert_eq!(path, Some(PathBuf::from("/etc/fieldrep/custom.toml")));
    }
}
