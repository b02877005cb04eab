use crate::config::DriftPolicy;
use crate::simulation::{FileChange, FileError, LineChange, Simulation, SimulationStatus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use weave_common::{ErrorReport, WeaveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Apply,
    Rollback,
}

impl Direction {
    /// Text the line must hold before the edit, and the text it receives
    fn texts<'a>(&self, change: &'a LineChange) -> (&'a str, &'a str) {
        match self {
            Direction::Apply => (&change.old_text, &change.new_text),
            Direction::Rollback => (&change.new_text, &change.old_text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewFile {
    pub path: PathBuf,
    pub changes: usize,
}

/// Returned instead of writing when the caller did not confirm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePreview {
    pub simulation_id: String,
    pub direction: Direction,
    pub token_id: String,
    pub from_value: String,
    pub to_value: String,
    pub files: Vec<PreviewFile>,
    pub total_changes: usize,
    pub notice: ErrorReport,
}

impl ChangePreview {
    pub fn of(simulation: &Simulation, direction: Direction) -> Self {
        let (from_value, to_value) = match direction {
            Direction::Apply => (&simulation.old_value, &simulation.new_value),
            Direction::Rollback => (&simulation.new_value, &simulation.old_value),
        };
        Self {
            simulation_id: simulation.id.clone(),
            direction,
            token_id: simulation.token_id.clone(),
            from_value: from_value.clone(),
            to_value: to_value.clone(),
            files: simulation
                .affected_files
                .iter()
                .map(|f| PreviewFile {
                    path: f.path.clone(),
                    changes: f.changes.len(),
                })
                .collect(),
            total_changes: simulation.total_changes(),
            notice: WeaveError::ConfirmationRequired {
                simulation_id: simulation.id.clone(),
            }
            .report(),
        }
    }
}

/// A file that was rewritten, with its lines in the order they were edited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub path: PathBuf,
    pub lines: Vec<usize>,
}

/// Result of a confirmed apply or rollback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub simulation_id: String,
    pub direction: Direction,
    pub success: bool,
    pub status: SimulationStatus,
    pub token_id: String,
    pub token_value: String,
    pub token_version: u64,
    pub files: Vec<FileOutcome>,
    pub errors: Vec<FileError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ExecutionOutcome {
    Preview(ChangePreview),
    Executed(ExecutionReport),
}

/// Files rewritten and files that failed, for one pass over a simulation
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub files: Vec<FileOutcome>,
    pub errors: Vec<FileError>,
}

impl WriteBatch {
    /// Any file written, or nothing to write and nothing failed
    pub fn succeeded(&self, attempted: usize) -> bool {
        !self.files.is_empty() || (attempted == 0 && self.errors.is_empty())
    }
}

/// Write one direction of a simulation to disk. Each file is edited in
/// descending line order; a file that fails is reported and skipped.
pub async fn write_changes(
    simulation: &Simulation,
    direction: Direction,
    policy: DriftPolicy,
) -> WriteBatch {
    let mut batch = WriteBatch::default();

    for file in &simulation.affected_files {
        match rewrite_file(file, direction, policy).await {
            Ok(lines) => {
                info!(
                    "{:?} {}: {} line(s) in {}",
                    direction,
                    simulation.id,
                    lines.len(),
                    file.path.display()
                );
                batch.files.push(FileOutcome {
                    path: file.path.clone(),
                    lines,
                });
            }
            Err(err) => {
                warn!("{:?} {} skipped {}: {}", direction, simulation.id, file.path.display(), err);
                batch.errors.push(FileError::new(&file.path, &err));
            }
        }
    }

    batch
}

async fn rewrite_file(
    file: &FileChange,
    direction: Direction,
    policy: DriftPolicy,
) -> Result<Vec<usize>, WeaveError> {
    let content = read(&file.path).await?;
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

    let mut ordered: Vec<&LineChange> = file.changes.iter().collect();
    ordered.sort_by(|a, b| b.line.cmp(&a.line));

    // verify everything before touching anything so a drifted file stays intact
    for change in &ordered {
        let (expected, _) = direction.texts(change);
        let current = change.line.checked_sub(1).and_then(|i| lines.get(i));
        let drifted = match current {
            None => true,
            Some(current) => policy == DriftPolicy::Verify && current != expected,
        };
        if drifted {
            return Err(WeaveError::Drifted {
                path: file.path.clone(),
                line: change.line,
            });
        }
    }

    let mut applied = Vec::with_capacity(ordered.len());
    for change in ordered {
        let (_, replacement) = direction.texts(change);
        lines[change.line - 1] = replacement.to_string();
        applied.push(change.line);
    }

    write(&file.path, &lines.join("\n")).await?;
    Ok(applied)
}

async fn read(path: &Path) -> Result<String, WeaveError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| WeaveError::IoUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

async fn write(path: &Path, content: &str) -> Result<(), WeaveError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|source| WeaveError::IoUnwritable {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use weave_analyzer::ImpactLevel;
    use weave_common::ErrorKind;
    use weave_core::UsageContext;

    fn simulation(path: &Path) -> Simulation {
        Simulation {
            id: "sim-test".to_string(),
            token_id: "color-brand".to_string(),
            old_value: "#3366ff".to_string(),
            new_value: "#ff3300".to_string(),
            affected_files: vec![FileChange {
                path: path.to_path_buf(),
                changes: vec![
                    LineChange {
                        line: 1,
                        old_text: "a { color: #3366ff; }".to_string(),
                        new_text: "a { color: #ff3300; }".to_string(),
                        context: UsageContext::CssValue,
                    },
                    LineChange {
                        line: 3,
                        old_text: "b { color: #3366ff; }".to_string(),
                        new_text: "b { color: #ff3300; }".to_string(),
                        context: UsageContext::CssValue,
                    },
                ],
            }],
            created_at: Utc::now(),
            applied: false,
            status: SimulationStatus::Simulated,
            impact_level: ImpactLevel::Low,
            scope: None,
        }
    }

    const ORIGINAL: &str = "a { color: #3366ff; }\n\nb { color: #3366ff; }\n";

    #[tokio::test]
    async fn test_apply_then_rollback_restores_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.css");
        std::fs::write(&path, ORIGINAL).unwrap();
        let sim = simulation(&path);

        let batch = write_changes(&sim, Direction::Apply, DriftPolicy::Overwrite).await;
        assert!(batch.errors.is_empty());
        assert_eq!(batch.files[0].lines, vec![3, 1]);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a { color: #ff3300; }\n\nb { color: #ff3300; }\n"
        );

        write_changes(&sim, Direction::Rollback, DriftPolicy::Overwrite).await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ORIGINAL);
    }

    #[tokio::test]
    async fn test_verify_policy_reports_drift_and_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.css");
        let edited = "a { color: red; }\n\nb { color: #3366ff; }\n";
        std::fs::write(&path, edited).unwrap();
        let sim = simulation(&path);

        let batch = write_changes(&sim, Direction::Apply, DriftPolicy::Verify).await;
        assert!(batch.files.is_empty());
        assert_eq!(batch.errors[0].error.kind, ErrorKind::Drifted);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), edited);
    }

    #[tokio::test]
    async fn test_missing_file_is_collected() {
        let dir = tempfile::tempdir().unwrap();
        let sim = simulation(&dir.path().join("gone.css"));
        let batch = write_changes(&sim, Direction::Apply, DriftPolicy::Overwrite).await;
        assert!(!batch.succeeded(1));
        assert_eq!(batch.errors[0].error.kind, ErrorKind::IoUnreadable);
    }

    #[test]
    fn test_preview_carries_confirmation_notice() {
        let sim = simulation(Path::new("/src/a.css"));
        let preview = ChangePreview::of(&sim, Direction::Rollback);
        assert_eq!(preview.total_changes, 2);
        assert_eq!(preview.to_value, "#3366ff");
        assert_eq!(preview.notice.kind, ErrorKind::ConfirmationRequired);
    }
}
