//! Clinic Settings
//!
//! Application settings persisted as JSON under the user config directory:
//! - Database settings (file path, schema source, bootstrap)
//! - View settings (page size, fetch limit, search case)
//! - Logging settings (console and JSON file output, filter)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod settings_file;

pub use settings_file::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClinicSettings {
    pub database: DatabaseSettings,
    pub views: ViewSettings,
    pub logging: LoggingSettings,
}

impl ClinicSettings {
    /// Load from the default settings path; a missing file yields defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings JSON in {:?}", path))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;
        Ok(())
    }

    pub fn settings_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("settings.json"))
    }
}

/// Where table metadata comes from at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchemaSource {
    /// A TOML manifest (the bundled one unless `manifest_path` is set)
    #[default]
    Manifest,
    /// Introspection of the live database
    Reflect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite database file
    pub path: PathBuf,
    /// Manifest overriding the bundled one
    pub manifest_path: Option<PathBuf>,
    pub source: SchemaSource,
    /// Create missing tables from the manifest on startup
    pub bootstrap: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            manifest_path: None,
            source: SchemaSource::Manifest,
            bootstrap: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub page_size: usize,
    pub fetch_limit: usize,
    pub case_sensitive_search: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            fetch_limit: 1000,
            case_sensitive_search: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub enable_console_logs: bool,
    /// Daily-rolled JSON files under the log directory
    pub enable_json_logs: bool,
    /// Used when `RUST_LOG` is unset; the build profile picks one otherwise
    pub filter: Option<String>,
    pub log_dir: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enable_console_logs: true,
            enable_json_logs: !cfg!(debug_assertions),
            filter: None,
            log_dir: log_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClinicSettings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, ClinicSettings::default());
        assert_eq!(settings.views.page_size, 10);
        assert_eq!(settings.views.fetch_limit, 1000);
        assert_eq!(settings.database.source, SchemaSource::Manifest);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "database": { "source": "reflect", "bootstrap": false }, "views": { "page_size": 25 } }"#,
        )
        .unwrap();

        let settings = ClinicSettings::load_from(&path).unwrap();
        assert_eq!(settings.database.source, SchemaSource::Reflect);
        assert!(!settings.database.bootstrap);
        assert_eq!(settings.database.path, default_database_path());
        assert_eq!(settings.views.page_size, 25);
        assert_eq!(settings.views.fetch_limit, 1000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = ClinicSettings::default();
        settings.database.path = dir.path().join("clinic.db");
        settings.database.manifest_path = Some(dir.path().join("schema.toml"));
        settings.views.case_sensitive_search = true;
        settings.logging.filter = Some("clinic_query=trace".into());

        settings.save_to(&path).unwrap();
        assert_eq!(ClinicSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ClinicSettings::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse settings JSON"));
    }
}
