use crate::config::EngineConfig;
use crate::executor::{write_changes, ChangePreview, Direction, ExecutionOutcome, ExecutionReport};
use crate::history::{HistoryEntry, HistoryLog};
use crate::ingest::{extract, DesignSource, ExtractOptions};
use crate::simulation::{simulate, FileError, Simulation, SimulationStatus};
use crate::store::EngineSnapshot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use weave_analyzer::{
    assess, plan, Conflict, ConflictAnalyzer, HealthCheck, HealthReport, ImpactAnalysis, ImpactAnalyzer, ImpactLevel,
    MigrationPlan, MigrationStrategy, ReportFormat,
};
use weave_common::{ErrorKind, ErrorReport, Result, WeaveError};
use weave_core::{
    component_from_path, ScanConfig, SourceScanner, Token, TokenRegistry, TokenType, TokenUsage,
    UpsertOutcome, UsageContext, UsageType,
};
use weave_graph::{DependencyGraph, GraphStats, MappingIndex, ScanResults, TokenRank};
use weave_parsers::{Candidate, ParseSession, ParserRegistry, Resolution, TokenMatch, TokenMatcher};

/// Confidence recorded for unresolved, design-tokenish candidates
const POTENTIAL_CONFIDENCE: f64 = 0.5;

/// Result of extract_design_tokens
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractReport {
    pub count: usize,
    pub by_type: BTreeMap<TokenType, usize>,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub nodes_visited: usize,
    pub skipped: Vec<String>,
}

/// Arguments of build_dependency_graph
#[derive(Debug, Clone, Default)]
pub struct GraphRequest {
    pub codebase_path: PathBuf,
    pub file_patterns: Vec<String>,
    pub token_formats: Vec<String>,
    pub update_existing: bool,
}

/// Result of build_dependency_graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphReport {
    pub stats: GraphStats,
    pub files_scanned: usize,
    pub bytes_read: u64,
    pub parser_warnings: usize,
    pub formats: Vec<String>,
    pub top_tokens: Vec<TokenRank>,
    pub duration_ms: u128,
    /// Guidance and non-fatal problems; never a failure of the build
    pub notes: Vec<ErrorReport>,
}

/// Result of simulate_token_change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub simulation_id: String,
    pub token_id: String,
    pub old_value: String,
    pub new_value: String,
    pub impact_level: ImpactLevel,
    pub total_changes: usize,
    pub files: Vec<SimulatedFile>,
    pub conflicts: Vec<Conflict>,
    pub errors: Vec<FileError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedFile {
    pub path: PathBuf,
    pub changes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Entry of list_token_simulations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationListing {
    pub id: String,
    pub token_id: String,
    pub old_value: String,
    pub new_value: String,
    pub status: SimulationStatus,
    pub applied: bool,
    pub impact_level: ImpactLevel,
    pub files: usize,
    pub changes: usize,
    pub created_at: chrono::DateTime<Utc>,
}

/// Process-wide engine state: registry, graph, mapping index,
/// active simulations, history and stored analyses
pub struct Engine {
    config: EngineConfig,
    registry: TokenRegistry,
    graph: DependencyGraph,
    mappings: MappingIndex,
    simulations: BTreeMap<String, Simulation>,
    history: HistoryLog,
    analyses: BTreeMap<String, ImpactAnalysis>,
    parsers: ParserRegistry,
    source: Option<Box<dyn DesignSource>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: TokenRegistry::new(),
            graph: DependencyGraph::new(),
            mappings: MappingIndex::new(),
            simulations: BTreeMap::new(),
            history: HistoryLog::new(),
            analyses: BTreeMap::new(),
            parsers: ParserRegistry::new(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: Box<dyn DesignSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn set_source(&mut self, source: Box<dyn DesignSource>) {
        self.source = Some(source);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn mappings(&self) -> &MappingIndex {
        &self.mappings
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn simulation(&self, id: &str) -> Result<&Simulation> {
        self.simulations
            .get(id)
            .ok_or_else(|| WeaveError::simulation_not_found(id))
    }

    pub fn analysis(&self, id: &str) -> Result<&ImpactAnalysis> {
        self.analyses.get(id).ok_or_else(|| WeaveError::AnalysisNotFound {
            analysis_id: id.to_string(),
        })
    }

    pub fn upsert_token(&mut self, token: Token) -> UpsertOutcome {
        self.registry.upsert(token)
    }

    /// Pull tokens from the configured design source into the registry
    pub async fn extract_design_tokens(&mut self, options: ExtractOptions) -> Result<ExtractReport> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| WeaveError::Config("no design source configured".to_string()))?;
        info!("Fetching design payload from {}", source.describe());
        let nodes = source.fetch().await?;
        let extraction = extract(&nodes, options);

        let mut report = ExtractReport {
            nodes_visited: extraction.nodes_visited,
            skipped: extraction.skipped,
            ..Default::default()
        };
        for token in extraction.tokens {
            *report.by_type.entry(token.token_type).or_default() += 1;
            match self.registry.upsert(token) {
                UpsertOutcome::Created => report.created += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
            }
            report.count += 1;
        }

        info!(
            "Extracted {} tokens ({} new, {} updated)",
            report.count, report.created, report.updated
        );
        Ok(report)
    }

    /// Scan a codebase, resolve every candidate and rebuild or update the graph
    pub fn build_dependency_graph(&mut self, request: GraphRequest) -> Result<GraphReport> {
        let start = Instant::now();
        let mut notes = Vec::new();
        if self.registry.is_empty() {
            warn!("Building the dependency graph with an empty registry");
            notes.push(WeaveError::EmptyRegistry.report());
        }

        let formats = if request.token_formats.is_empty() {
            self.config.token_formats.clone()
        } else {
            request.token_formats.clone()
        };
        let (dialects, unknown) = self.parsers.resolve(&formats);
        for tag in unknown {
            notes.push(WeaveError::ParseWarning(format!("unknown token format: {}", tag)).report());
        }

        let mut scan_config: ScanConfig = self.config.scan.clone();
        if !request.file_patterns.is_empty() {
            scan_config.file_patterns = request.file_patterns.clone();
        }
        let scan = SourceScanner::new(&request.codebase_path)?
            .with_config(scan_config)
            .scan()?;
        for issue in &scan.issues {
            notes.push(ErrorReport {
                kind: issue.kind,
                reason: issue.message.clone(),
                hint: None,
                resume_id: Some(issue.path.to_string_lossy().to_string()),
            });
        }

        let session = ParseSession::new(&self.registry, dialects.clone());
        let mut parser_warnings = session.warnings().len();
        for warning in session.warnings() {
            notes.push(WeaveError::ParseWarning(warning.clone()).report());
        }

        let observed_at = Utc::now();
        let matcher = TokenMatcher::new(&self.registry);
        let mut usages = Vec::new();
        let mut potential_usages = Vec::new();

        for file in &scan.files {
            let outcome = session.parse_file(file);
            parser_warnings += outcome.warnings.len();
            for warning in outcome.warnings {
                notes.push(WeaveError::ParseWarning(warning).report());
            }

            let component = component_from_path(&file.path);
            for candidate in &outcome.candidates {
                match matcher.resolve_candidate(candidate) {
                    Resolution::Matched(found) => {
                        let usage = to_usage(candidate, &found, &file.path, &component, observed_at);
                        if let Some(token) = self.registry.get(&found.token_id) {
                            self.mappings.record(
                                &found.token_id,
                                &candidate.pattern,
                                found.confidence,
                                token.token_type,
                                observed_at,
                            );
                        }
                        usages.push(usage);
                    }
                    Resolution::Potential(id) => potential_usages.push(TokenUsage {
                        token_id: id,
                        file_path: file.path.clone(),
                        component: component.clone(),
                        line: Some(candidate.line),
                        context: candidate.usage_context,
                        usage_type: UsageType::Direct,
                        pattern: candidate.pattern.clone(),
                        confidence: POTENTIAL_CONFIDENCE,
                        last_seen: observed_at,
                    }),
                    Resolution::Ignored => {}
                }
            }
        }

        let results = ScanResults {
            usages,
            potential_usages,
            files: scan.files.iter().map(|f| f.path.clone()).collect(),
            observed_at,
        };
        if request.update_existing {
            self.graph.update(results, &self.registry);
        } else {
            self.graph.rebuild(results, &self.registry);
        }

        let report = GraphReport {
            stats: self.graph.stats(),
            files_scanned: scan.summary.files_scanned,
            bytes_read: scan.summary.bytes_read,
            parser_warnings,
            formats: dialects.iter().map(|d| d.tag().to_string()).collect(),
            top_tokens: self.graph.top_n(self.config.top_n),
            duration_ms: start.elapsed().as_millis(),
            notes,
        };
        info!(
            "Dependency graph built from {} files: {} usages, {} potential",
            report.files_scanned, report.stats.usages, report.stats.potential_usages
        );
        Ok(report)
    }

    /// Analyze a proposed change and store the analysis under a fresh id
    pub fn analyze_token_change_impact(
        &mut self,
        token_id: &str,
        new_value: &str,
        change_reason: Option<&str>,
        include_edge_cases: bool,
        generate_migration: bool,
    ) -> Result<ImpactAnalysis> {
        let mut analysis = ImpactAnalyzer::new(&self.registry, &self.graph).analyze(
            token_id,
            new_value,
            change_reason,
            include_edge_cases,
        )?;
        if generate_migration {
            let strategy = match analysis.risk {
                ImpactLevel::Low | ImpactLevel::Medium => MigrationStrategy::Atomic,
                ImpactLevel::High => MigrationStrategy::Gradual,
                ImpactLevel::Critical => MigrationStrategy::FeatureFlag,
            };
            analysis.migration_preview = Some(plan(&analysis, strategy, false, false));
        }
        self.analyses.insert(analysis.id.clone(), analysis.clone());
        Ok(analysis)
    }

    pub fn generate_migration_code(
        &self,
        analysis_id: &str,
        strategy: MigrationStrategy,
        include_tests: bool,
        include_docs: bool,
    ) -> Result<MigrationPlan> {
        let analysis = self.analysis(analysis_id)?;
        Ok(plan(analysis, strategy, include_tests, include_docs))
    }

    /// Record a simulation of the change; files are read, never written
    pub async fn simulate_token_change(
        &mut self,
        token_id: &str,
        new_value: &str,
        scope: Option<&str>,
        include_visual_diff: bool,
    ) -> Result<SimulationReport> {
        let run = simulate(&self.registry, &self.graph, token_id, new_value, scope).await?;
        let simulation = run.simulation;
        let token = self.registry.require(token_id)?;
        let conflicts = ConflictAnalyzer::new(&self.registry).analyze(token, new_value, None);

        let report = SimulationReport {
            simulation_id: simulation.id.clone(),
            token_id: simulation.token_id.clone(),
            old_value: simulation.old_value.clone(),
            new_value: simulation.new_value.clone(),
            impact_level: simulation.impact_level,
            total_changes: simulation.total_changes(),
            files: simulation
                .affected_files
                .iter()
                .map(|f| SimulatedFile {
                    path: f.path.clone(),
                    changes: f.changes.len(),
                    diff: include_visual_diff.then(|| f.visual_diff()),
                })
                .collect(),
            conflicts,
            errors: run.errors,
        };

        self.history.append(
            &simulation.id,
            &simulation.token_id,
            SimulationStatus::Simulated,
            simulation.summary(),
        );
        self.simulations.insert(simulation.id.clone(), simulation);
        Ok(report)
    }

    /// Two-phase apply. Without confirmation only a preview is returned.
    pub async fn apply_token_change(
        &mut self,
        simulation_id: &str,
        confirm: bool,
    ) -> Result<ExecutionOutcome> {
        let simulation = self.simulation(simulation_id)?;
        match simulation.status {
            SimulationStatus::Applied => {
                return Err(WeaveError::AlreadyApplied {
                    simulation_id: simulation_id.to_string(),
                })
            }
            SimulationStatus::RolledBack => {
                return Err(WeaveError::RolledBack {
                    simulation_id: simulation_id.to_string(),
                })
            }
            SimulationStatus::Simulated => {}
        }
        if !confirm {
            return Ok(ExecutionOutcome::Preview(ChangePreview::of(
                simulation,
                Direction::Apply,
            )));
        }

        let batch = write_changes(simulation, Direction::Apply, self.config.drift_policy).await;
        let attempted = simulation.affected_files.len();
        let (token_id, new_value) = (simulation.token_id.clone(), simulation.new_value.clone());
        let success = batch.succeeded(attempted);

        if success {
            self.registry.bump(&token_id, &new_value)?;
            self.transition(simulation_id, SimulationStatus::Applied, batch.errors.len())?;
        }
        let token = self.registry.require(&token_id)?;

        Ok(ExecutionOutcome::Executed(ExecutionReport {
            simulation_id: simulation_id.to_string(),
            direction: Direction::Apply,
            success,
            status: self.simulation(simulation_id)?.status,
            token_id,
            token_value: token.value.clone(),
            token_version: token.version,
            files: batch.files,
            errors: batch.errors,
        }))
    }

    /// Two-phase rollback using the recorded old text
    pub async fn rollback_token_change(
        &mut self,
        simulation_id: &str,
        confirm: bool,
    ) -> Result<ExecutionOutcome> {
        let simulation = self.simulation(simulation_id)?;
        if simulation.status != SimulationStatus::Applied {
            return Err(WeaveError::NotApplied {
                simulation_id: simulation_id.to_string(),
            });
        }
        if !confirm {
            return Ok(ExecutionOutcome::Preview(ChangePreview::of(
                simulation,
                Direction::Rollback,
            )));
        }

        let batch = write_changes(simulation, Direction::Rollback, self.config.drift_policy).await;
        let attempted = simulation.affected_files.len();
        let (token_id, old_value) = (simulation.token_id.clone(), simulation.old_value.clone());
        let success = batch.succeeded(attempted);

        if success {
            self.registry.bump(&token_id, &old_value)?;
            self.transition(simulation_id, SimulationStatus::RolledBack, batch.errors.len())?;
        }
        let token = self.registry.require(&token_id)?;

        Ok(ExecutionOutcome::Executed(ExecutionReport {
            simulation_id: simulation_id.to_string(),
            direction: Direction::Rollback,
            success,
            status: self.simulation(simulation_id)?.status,
            token_id,
            token_value: token.value.clone(),
            token_version: token.version,
            files: batch.files,
            errors: batch.errors,
        }))
    }

    fn transition(
        &mut self,
        simulation_id: &str,
        status: SimulationStatus,
        failed_files: usize,
    ) -> Result<()> {
        let simulation = self
            .simulations
            .get_mut(simulation_id)
            .ok_or_else(|| WeaveError::simulation_not_found(simulation_id))?;
        simulation.status = status;
        simulation.applied = status == SimulationStatus::Applied;

        let mut summary = simulation.summary();
        if failed_files > 0 {
            summary.push_str(&format!(", {} file(s) failed", failed_files));
        }
        let token_id = simulation.token_id.clone();
        self.history.append(simulation_id, &token_id, status, summary);
        info!("Simulation {} is now {}", simulation_id, status);
        Ok(())
    }

    /// Simulations with the given status, oldest first; `None` lists all
    pub fn list_token_simulations(&self, status: Option<SimulationStatus>) -> Vec<SimulationListing> {
        let mut listed: Vec<SimulationListing> = self
            .simulations
            .values()
            .filter(|s| status.map_or(true, |st| s.status == st))
            .map(|s| SimulationListing {
                id: s.id.clone(),
                token_id: s.token_id.clone(),
                old_value: s.old_value.clone(),
                new_value: s.new_value.clone(),
                status: s.status,
                applied: s.applied,
                impact_level: s.impact_level,
                files: s.affected_files.len(),
                changes: s.total_changes(),
                created_at: s.created_at,
            })
            .collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        listed
    }

    pub fn history_for(&self, simulation_id: &str) -> Vec<&HistoryEntry> {
        self.history.for_simulation(simulation_id)
    }

    /// History transitions with the given status, in append order; `None` returns all
    pub fn history_with_status(&self, status: Option<SimulationStatus>) -> Vec<&HistoryEntry> {
        self.history.filter(status)
    }

    pub fn track_design_system_health(
        &self,
        checks: &[HealthCheck],
        format: ReportFormat,
    ) -> HealthReport {
        assess(&self.registry, &self.graph, checks, format)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            tokens: self.registry.values().cloned().collect(),
            graph: self.graph.clone(),
            mappings: self.mappings.mappings().cloned().collect(),
            simulations: self.simulations.values().cloned().collect(),
            history: self.history.entries().to_vec(),
            analyses: self.analyses.values().cloned().collect(),
        }
    }

    pub fn restore(&mut self, snapshot: EngineSnapshot) {
        self.registry = TokenRegistry::from_tokens(snapshot.tokens);
        self.graph = snapshot.graph;
        self.mappings = MappingIndex::from_mappings(snapshot.mappings);
        self.simulations = snapshot
            .simulations
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        self.history = HistoryLog::from_entries(snapshot.history);
        self.analyses = snapshot
            .analyses
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
    }
}

/// Styled-block name references are inherited, value matches are computed
fn usage_type_of(candidate: &Candidate, found: &TokenMatch) -> UsageType {
    if found.match_type.is_value_based() {
        UsageType::Computed
    } else if candidate.usage_context == UsageContext::StyledTemplate {
        UsageType::Inherited
    } else {
        UsageType::Direct
    }
}

fn to_usage(
    candidate: &Candidate,
    found: &TokenMatch,
    path: &Path,
    component: &str,
    observed_at: chrono::DateTime<Utc>,
) -> TokenUsage {
    TokenUsage {
        token_id: found.token_id.clone(),
        file_path: path.to_path_buf(),
        component: component.to_string(),
        line: Some(candidate.line),
        context: candidate.usage_context,
        usage_type: usage_type_of(candidate, found),
        pattern: candidate.pattern.clone(),
        confidence: found.confidence,
        last_seen: observed_at,
    }
}

/// True when a report carries only guidance, no failures
pub fn is_guidance(report: &ErrorReport) -> bool {
    matches!(report.kind, ErrorKind::EmptyRegistry | ErrorKind::ParseWarning)
}
