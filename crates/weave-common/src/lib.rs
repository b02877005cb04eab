use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Error kinds surfaced to tool callers. Stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    TokenNotFound,
    SimulationNotFound,
    AnalysisNotFound,
    AlreadyApplied,
    NotApplied,
    RolledBack,
    ConfirmationRequired,
    IoUnreadable,
    IoUnwritable,
    ParseWarning,
    InvalidValue,
    EmptyRegistry,
    Drifted,
    Storage,
    Config,
    Internal,
}

/// Serializable error payload returned by the tool surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub reason: String,
    pub hint: Option<String>,
    /// Identifier needed to resume: token id, simulation id or file path
    pub resume_id: Option<String>,
}

/// Common error types
#[derive(thiserror::Error, Debug)]
pub enum WeaveError {
    #[error("token not found: {token_id}")]
    TokenNotFound { token_id: String },

    #[error("simulation not found: {simulation_id}")]
    SimulationNotFound { simulation_id: String },

    #[error("change analysis not found: {analysis_id}")]
    AnalysisNotFound { analysis_id: String },

    #[error("simulation {simulation_id} is already applied")]
    AlreadyApplied { simulation_id: String },

    #[error("simulation {simulation_id} has not been applied")]
    NotApplied { simulation_id: String },

    #[error("simulation {simulation_id} was rolled back; simulate the change again")]
    RolledBack { simulation_id: String },

    #[error("confirmation required for simulation {simulation_id}")]
    ConfirmationRequired { simulation_id: String },

    #[error("cannot read {path:?}: {source}")]
    IoUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path:?}: {source}")]
    IoUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse warning: {0}")]
    ParseWarning(String),

    #[error("invalid value {value:?}: {reason}")]
    InvalidValue { value: String, reason: String },

    #[error("token registry is empty")]
    EmptyRegistry,

    #[error("line {line} of {path:?} changed since the simulation was recorded")]
    Drifted { path: PathBuf, line: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl WeaveError {
    pub fn token_not_found(token_id: impl Into<String>) -> Self {
        Self::TokenNotFound {
            token_id: token_id.into(),
        }
    }

    pub fn simulation_not_found(simulation_id: impl Into<String>) -> Self {
        Self::SimulationNotFound {
            simulation_id: simulation_id.into(),
        }
    }

    pub fn invalid_value(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenNotFound { .. } => ErrorKind::TokenNotFound,
            Self::SimulationNotFound { .. } => ErrorKind::SimulationNotFound,
            Self::AnalysisNotFound { .. } => ErrorKind::AnalysisNotFound,
            Self::AlreadyApplied { .. } => ErrorKind::AlreadyApplied,
            Self::NotApplied { .. } => ErrorKind::NotApplied,
            Self::RolledBack { .. } => ErrorKind::RolledBack,
            Self::ConfirmationRequired { .. } => ErrorKind::ConfirmationRequired,
            Self::IoUnreadable { .. } => ErrorKind::IoUnreadable,
            Self::IoUnwritable { .. } => ErrorKind::IoUnwritable,
            Self::ParseWarning(_) => ErrorKind::ParseWarning,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::EmptyRegistry => ErrorKind::EmptyRegistry,
            Self::Drifted { .. } => ErrorKind::Drifted,
            Self::Io(_) => ErrorKind::IoUnreadable,
            Self::Json(_) | Self::Config(_) => ErrorKind::Config,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Generic(_) => ErrorKind::Internal,
        }
    }

    /// Remediation hint shown next to the reason
    pub fn hint(&self) -> Option<String> {
        let hint = match self {
            Self::TokenNotFound { .. } => {
                "run extract_design_tokens first or check the token id with the registry listing"
            }
            Self::SimulationNotFound { .. } => {
                "list simulations with list_token_simulations and pick an existing id"
            }
            Self::AnalysisNotFound { .. } => {
                "run analyze_token_change_impact and pass the returned analysis id"
            }
            Self::AlreadyApplied { .. } => "roll the simulation back before applying it again",
            Self::NotApplied { .. } => "apply the simulation before rolling it back",
            Self::RolledBack { .. } => {
                "recorded line numbers may be stale; run simulate_token_change again"
            }
            Self::ConfirmationRequired { .. } => "repeat the call with confirmation set to true",
            Self::IoUnreadable { .. } => "check the file permissions",
            Self::IoUnwritable { .. } => "check the file permissions and that the path still exists",
            Self::InvalidValue { .. } => "pass a value in a format the token type accepts",
            Self::EmptyRegistry => "extract design tokens before building the dependency graph",
            Self::Drifted { .. } => "re-run the scan and simulate the change again",
            _ => return None,
        };
        Some(hint.to_string())
    }

    pub fn resume_id(&self) -> Option<String> {
        match self {
            Self::TokenNotFound { token_id } => Some(token_id.clone()),
            Self::SimulationNotFound { simulation_id }
            | Self::AlreadyApplied { simulation_id }
            | Self::NotApplied { simulation_id }
            | Self::RolledBack { simulation_id }
            | Self::ConfirmationRequired { simulation_id } => Some(simulation_id.clone()),
            Self::AnalysisNotFound { analysis_id } => Some(analysis_id.clone()),
            Self::IoUnreadable { path, .. }
            | Self::IoUnwritable { path, .. }
            | Self::Drifted { path, .. } => Some(path.to_string_lossy().to_string()),
            _ => None,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            reason: self.to_string(),
            hint: self.hint(),
            resume_id: self.resume_id(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WeaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_carries_resume_id() {
        let err = WeaveError::AlreadyApplied {
            simulation_id: "sim-1".to_string(),
        };
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::AlreadyApplied);
        assert_eq!(report.resume_id.as_deref(), Some("sim-1"));
        assert!(report.hint.is_some());
    }

    #[test]
    fn test_report_wire_shape_is_camel_case() {
        let report = WeaveError::simulation_not_found("sim-9").report();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["kind"], "SIMULATION_NOT_FOUND");
        assert_eq!(value["resumeId"], "sim-9");
        assert!(value.get("resume_id").is_none());
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::TokenNotFound).unwrap();
        assert_eq!(json, "\"TOKEN_NOT_FOUND\"");
    }
}
