use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};
use weave_analyzer::ImpactLevel;
use weave_common::{ErrorReport, Result, WeaveError};
use weave_core::normalizer::{validate, variant_pairs};
use weave_core::{TokenRegistry, UsageContext};
use weave_graph::{DependencyGraph, UsageQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationStatus {
    Simulated,
    Applied,
    RolledBack,
}

impl SimulationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationStatus::Simulated => "simulated",
            SimulationStatus::Applied => "applied",
            SimulationStatus::RolledBack => "rolled-back",
        }
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationStatus {
    type Err = WeaveError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "simulated" => Ok(SimulationStatus::Simulated),
            "applied" => Ok(SimulationStatus::Applied),
            "rolled-back" | "rolledback" => Ok(SimulationStatus::RolledBack),
            other => Err(WeaveError::invalid_value(
                other,
                "expected all, simulated, applied or rolled-back",
            )),
        }
    }
}

/// One reversible line edit. `old_text` is the rollback ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChange {
    /// 1-based, in the file as it was when simulated
    pub line: usize,
    pub old_text: String,
    pub new_text: String,
    pub context: UsageContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub path: PathBuf,
    pub changes: Vec<LineChange>,
}

impl FileChange {
    /// Unified-style `-`/`+` text diff of this file's edits
    pub fn visual_diff(&self) -> String {
        let path = self.path.display();
        let mut out = format!("--- {}\n+++ {}\n", path, path);
        for change in &self.changes {
            out.push_str(&format!(
                "@@ -{line} +{line} @@\n-{}\n+{}\n",
                change.old_text.trim_end_matches('\r'),
                change.new_text.trim_end_matches('\r'),
                line = change.line
            ));
        }
        out
    }
}

/// A recorded, reversible token value change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub id: String,
    pub token_id: String,
    pub old_value: String,
    pub new_value: String,
    pub affected_files: Vec<FileChange>,
    pub created_at: DateTime<Utc>,
    pub applied: bool,
    pub status: SimulationStatus,
    pub impact_level: ImpactLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Simulation {
    pub fn total_changes(&self) -> usize {
        self.affected_files.iter().map(|f| f.changes.len()).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} -> {} ({} change(s) in {} file(s))",
            self.token_id,
            self.old_value,
            self.new_value,
            self.total_changes(),
            self.affected_files.len()
        )
    }
}

/// A file an operation could not process; the batch continued without it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub path: PathBuf,
    pub error: ErrorReport,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, error: &WeaveError) -> Self {
        Self {
            path: path.into(),
            error: error.report(),
        }
    }
}

/// A simulation plus the files that could not be read while building it
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub simulation: Simulation,
    pub errors: Vec<FileError>,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.')
}

/// Replace every delimited occurrence of a pair's left side in one pass,
/// longest spelling first. Replacement text is never rescanned.
pub fn substitute(line: &str, pairs: &[(String, String)]) -> String {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    let mut copied = 0;

    while i < bytes.len() {
        let preceded_ok = i == 0 || !is_word_byte(bytes[i - 1]);
        let hit = if preceded_ok {
            pairs.iter().find(|(from, _)| {
                let end = i + from.len();
                line.is_char_boundary(i)
                    && line[i..].starts_with(from.as_str())
                    && (end >= bytes.len() || !is_word_byte(bytes[end]))
            })
        } else {
            None
        };

        match hit {
            Some((from, to)) => {
                out.push_str(&line[copied..i]);
                out.push_str(to);
                i += from.len();
                copied = i;
            }
            None => i += 1,
        }
    }
    out.push_str(&line[copied..]);
    out
}

/// Build a simulation of changing `token_id` to `new_value` over every
/// recorded usage line. Nothing is written and no state is mutated.
pub async fn simulate(
    registry: &TokenRegistry,
    graph: &DependencyGraph,
    token_id: &str,
    new_value: &str,
    scope: Option<&str>,
) -> Result<SimulationRun> {
    let token = registry.require(token_id)?;
    validate(token.token_type, new_value)?;
    let pairs = variant_pairs(token.token_type, &token.value, new_value);

    let mut query = UsageQuery::new().with_token(token_id);
    if let Some(scope) = scope {
        query = query.with_file(scope);
    }

    // path -> line -> context, first context seen wins
    let mut lines_by_file: BTreeMap<PathBuf, BTreeMap<usize, UsageContext>> = BTreeMap::new();
    for (path, usages) in graph.usages_by_file(&query) {
        let mut lines = BTreeMap::new();
        for usage in usages {
            if let Some(line) = usage.line {
                lines.entry(line).or_insert(usage.context);
            }
        }
        if !lines.is_empty() {
            lines_by_file.insert(path, lines);
        }
    }

    let mut affected_files = Vec::new();
    let mut errors = Vec::new();
    for (path, lines) in lines_by_file {
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(source) => {
                let err = WeaveError::IoUnreadable {
                    path: path.clone(),
                    source,
                };
                warn!("{}", err);
                errors.push(FileError::new(&path, &err));
                continue;
            }
        };
        let file_lines: Vec<&str> = content.split('\n').collect();

        let mut changes = Vec::new();
        for (line, context) in lines {
            let Some(old_text) = line.checked_sub(1).and_then(|i| file_lines.get(i)) else {
                debug!("{}:{} is past the end of the file", path.display(), line);
                continue;
            };
            let new_text = substitute(old_text, &pairs);
            if new_text == *old_text {
                continue;
            }
            changes.push(LineChange {
                line,
                old_text: old_text.to_string(),
                new_text,
                context,
            });
        }

        if !changes.is_empty() {
            affected_files.push(FileChange { path, changes });
        }
    }

    let total: usize = affected_files.iter().map(|f: &FileChange| f.changes.len()).sum();
    let simulation = Simulation {
        id: format!("sim-{}", uuid::Uuid::new_v4()),
        token_id: token_id.to_string(),
        old_value: token.value.clone(),
        new_value: new_value.to_string(),
        impact_level: ImpactLevel::classify(affected_files.len(), total),
        affected_files,
        created_at: Utc::now(),
        applied: false,
        status: SimulationStatus::Simulated,
        scope: scope.map(str::to_string),
    };

    info!(
        "Simulated {} ({}): {} change(s) in {} file(s), impact {}",
        simulation.id,
        simulation.token_id,
        total,
        simulation.affected_files.len(),
        simulation.impact_level
    );
    Ok(SimulationRun { simulation, errors })
}
