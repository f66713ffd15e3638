//! Exposition settings: where the tree is served and the credentials
//! guarding it.
//!
//! Settings live in a JSON document under a `serverInfo` key. Every field is
//! optional and a document without the key yields the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the settings object inside a settings document.
pub const SETTINGS_KEY: &str = "serverInfo";

pub const DEFAULT_PATH: &str = "/serverInfo";
pub const DEFAULT_USER: &str = "insecure";
pub const DEFAULT_PASS: &str = "secureme";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid path {0:?}: must start with '/' and must not end with '/'")]
    InvalidPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base path of the info route. The description is served at
    /// `{path}/doc`.
    pub path: String,
    pub user: String,
    pub pass: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            user: DEFAULT_USER.to_string(),
            pass: DEFAULT_PASS.to_string(),
        }
    }
}

impl Settings {
    /// Parse a settings document and validate the result.
    pub fn from_json_str(raw: &str) -> Result<Self, SettingsError> {
        let doc: Value = serde_json::from_str(raw)?;
        let settings = match doc.get(SETTINGS_KEY) {
            Some(section) => Settings::deserialize(section)?,
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&raw)?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.path.starts_with('/') || self.path.ends_with('/') {
            return Err(SettingsError::InvalidPath(self.path.clone()));
        }
        Ok(())
    }

    /// Path of the description route.
    pub fn doc_path(&self) -> String {
        format!("{}/doc", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.path, "/serverInfo");
        assert_eq!(s.user, "insecure");
        assert_eq!(s.pass, "secureme");
        assert_eq!(s.doc_path(), "/serverInfo/doc");
    }

    #[test]
    fn missing_key_yields_defaults() {
        let s = Settings::from_json_str(r#"{ "other": { "path": "/x" } }"#).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let s = Settings::from_json_str(r#"{ "serverInfo": { "path": "/stats", "pass": "p" } }"#)
            .unwrap();
        assert_eq!(s.path, "/stats");
        assert_eq!(s.user, "insecure");
        assert_eq!(s.pass, "p");
    }

    #[test]
    fn rejects_bad_paths() {
        for raw in [
            r#"{ "serverInfo": { "path": "stats" } }"#,
            r#"{ "serverInfo": { "path": "/stats/" } }"#,
            r#"{ "serverInfo": { "path": "/" } }"#,
        ] {
            assert!(matches!(
                Settings::from_json_str(raw),
                Err(SettingsError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Settings::from_json_str("{ not json"),
            Err(SettingsError::Parse(_))
        ));
        assert!(matches!(
            Settings::from_json_str(r#"{ "serverInfo": { "path": 5 } }"#),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "serverInfo": {{ "user": "ops" }} }}"#).unwrap();
        let s = Settings::from_file(file.path()).unwrap();
        assert_eq!(s.user, "ops");
        assert_eq!(s.path, DEFAULT_PATH);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
