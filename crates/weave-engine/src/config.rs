use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use weave_common::{Result, WeaveError};
use weave_core::ScanConfig;

/// What apply/rollback do when a recorded line no longer holds the text
/// the simulation expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftPolicy {
    /// Replace the line unconditionally
    #[default]
    Overwrite,
    /// Leave the file untouched and report DRIFTED
    Verify,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub scan: ScanConfig,
    /// Formats used when a graph build names none; empty means all
    pub token_formats: Vec<String>,
    pub top_n: usize,
    pub drift_policy: DriftPolicy,
    pub state_path: Option<PathBuf>,
    /// Default scan depth for design payloads
    pub scan_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            token_formats: Vec::new(),
            top_n: 10,
            drift_policy: DriftPolicy::Overwrite,
            state_path: None,
            scan_depth: 10,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| WeaveError::IoUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text)
            .map_err(|e| WeaveError::Config(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenweave.json");
        std::fs::write(
            &path,
            r#"{ "driftPolicy": "verify", "scan": { "ignoreDirs": ["vendor"] } }"#,
        )
        .unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(config.drift_policy, DriftPolicy::Verify);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.scan.ignore_dirs, vec!["vendor".to_string()]);
        assert_eq!(config.scan.include_extensions.len(), 8);
    }

    #[test]
    fn test_bad_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ topN: ").unwrap();
        let err = EngineConfig::from_path(&path).unwrap_err();
        assert_eq!(err.kind(), weave_common::ErrorKind::Config);
    }
}
