// Tool-call surface: one closed enum of calls, dispatched onto the engine

use crate::engine::{Engine, GraphRequest};
use crate::ingest::ExtractOptions;
use crate::simulation::SimulationStatus;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;
use weave_analyzer::{HealthCheck, MigrationStrategy, ReportFormat};
use weave_common::{Result, WeaveError};

pub const TOOL_NAMES: [&str; 9] = [
    "extract_design_tokens",
    "build_dependency_graph",
    "analyze_token_change_impact",
    "generate_migration_code",
    "simulate_token_change",
    "apply_token_change",
    "rollback_token_change",
    "list_token_simulations",
    "track_design_system_health",
];

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractArgs {
    pub include_variables: Option<bool>,
    pub include_styles: Option<bool>,
    pub scan_depth: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphArgs {
    pub codebase_path: PathBuf,
    #[serde(default)]
    pub file_patterns: Vec<String>,
    #[serde(default)]
    pub token_formats: Vec<String>,
    #[serde(default)]
    pub update_existing: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactArgs {
    pub token_id: String,
    pub new_value: String,
    pub change_reason: Option<String>,
    #[serde(default = "yes")]
    pub include_edge_cases: bool,
    #[serde(default)]
    pub generate_migration: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationArgs {
    pub change_analysis_id: String,
    #[serde(default = "default_strategy")]
    pub migration_strategy: String,
    #[serde(default)]
    pub include_tests: bool,
    #[serde(default)]
    pub include_docs: bool,
}

fn default_strategy() -> String {
    "atomic".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateArgs {
    pub token_id: String,
    pub new_value: String,
    pub scope: Option<String>,
    #[serde(default)]
    pub include_visual_diff: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyArgs {
    pub simulation_id: String,
    #[serde(default)]
    pub confirm_apply: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackArgs {
    pub simulation_id: String,
    #[serde(default)]
    pub confirm_rollback: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListArgs {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthArgs {
    #[serde(default)]
    pub health_checks: Vec<String>,
    #[serde(default)]
    pub report_format: ReportFormat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    ExtractDesignTokens(ExtractArgs),
    BuildDependencyGraph(GraphArgs),
    AnalyzeTokenChangeImpact(ImpactArgs),
    GenerateMigrationCode(MigrationArgs),
    SimulateTokenChange(SimulateArgs),
    ApplyTokenChange(ApplyArgs),
    RollbackTokenChange(RollbackArgs),
    ListTokenSimulations(ListArgs),
    TrackDesignSystemHealth(HealthArgs),
}

impl ToolCall {
    /// Build a call from a tool name and its JSON arguments
    pub fn parse(name: &str, arguments: Value) -> Result<Self> {
        if !TOOL_NAMES.contains(&name) {
            return Err(WeaveError::invalid_value(
                name,
                format!("unknown tool; expected one of {}", TOOL_NAMES.join(", ")),
            ));
        }
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        serde_json::from_value(json!({ "tool": name, "arguments": arguments }))
            .map_err(|e| WeaveError::invalid_value(name, format!("bad arguments: {}", e)))
    }
}

/// `all` or nothing lists every simulation
fn parse_status(status: Option<&str>) -> Result<Option<SimulationStatus>> {
    match status {
        None => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

impl Engine {
    /// Dispatch one tool call. Failures come back as `{"error": ErrorReport}`.
    pub async fn call(&mut self, name: &str, arguments: Value) -> Value {
        debug!("Tool call {}", name);
        let result = match ToolCall::parse(name, arguments) {
            Ok(call) => self.dispatch(call).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(value) => value,
            Err(e) => json!({ "error": e.report() }),
        }
    }

    pub async fn dispatch(&mut self, call: ToolCall) -> Result<Value> {
        match call {
            ToolCall::ExtractDesignTokens(args) => {
                let defaults = ExtractOptions {
                    scan_depth: self.config().scan_depth,
                    ..Default::default()
                };
                let options = ExtractOptions {
                    include_variables: args.include_variables.unwrap_or(defaults.include_variables),
                    include_styles: args.include_styles.unwrap_or(defaults.include_styles),
                    scan_depth: args.scan_depth.unwrap_or(defaults.scan_depth),
                };
                to_value(&self.extract_design_tokens(options).await?)
            }
            ToolCall::BuildDependencyGraph(args) => to_value(&self.build_dependency_graph(
                GraphRequest {
                    codebase_path: args.codebase_path,
                    file_patterns: args.file_patterns,
                    token_formats: args.token_formats,
                    update_existing: args.update_existing,
                },
            )?),
            ToolCall::AnalyzeTokenChangeImpact(args) => to_value(&self.analyze_token_change_impact(
                &args.token_id,
                &args.new_value,
                args.change_reason.as_deref(),
                args.include_edge_cases,
                args.generate_migration,
            )?),
            ToolCall::GenerateMigrationCode(args) => {
                let strategy: MigrationStrategy = args.migration_strategy.parse()?;
                to_value(&self.generate_migration_code(
                    &args.change_analysis_id,
                    strategy,
                    args.include_tests,
                    args.include_docs,
                )?)
            }
            ToolCall::SimulateTokenChange(args) => to_value(
                &self
                    .simulate_token_change(
                        &args.token_id,
                        &args.new_value,
                        args.scope.as_deref(),
                        args.include_visual_diff,
                    )
                    .await?,
            ),
            ToolCall::ApplyTokenChange(args) => to_value(
                &self
                    .apply_token_change(&args.simulation_id, args.confirm_apply)
                    .await?,
            ),
            ToolCall::RollbackTokenChange(args) => to_value(
                &self
                    .rollback_token_change(&args.simulation_id, args.confirm_rollback)
                    .await?,
            ),
            ToolCall::ListTokenSimulations(args) => {
                let status = parse_status(args.status.as_deref())?;
                let simulations = self.list_token_simulations(status);
                let history = self.history_with_status(status);
                Ok(json!({
                    "count": simulations.len(),
                    "simulations": simulations,
                    "history": history,
                }))
            }
            ToolCall::TrackDesignSystemHealth(args) => {
                let checks = if args.health_checks.is_empty() {
                    HealthCheck::ALL.to_vec()
                } else {
                    args.health_checks
                        .iter()
                        .map(|c| c.parse())
                        .collect::<Result<Vec<HealthCheck>>>()?
                };
                to_value(&self.track_design_system_health(&checks, args.report_format))
            }
        }
    }
}
