use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use weave_analyzer::{HealthCheck, ImpactLevel, MigrationStrategy, ReportFormat, Severity};
use weave_common::WeaveError;
use weave_engine::{
    is_guidance, Engine, EngineConfig, ExecutionOutcome, ExtractOptions, GraphRequest,
    JsonFileSource, SimulationStatus, SqliteStore, StateStore,
};

const DEFAULT_STATE: &str = ".tokenweave/state.db";

/// tokenweave - design token dependency tracking and change simulation
#[derive(Parser)]
#[command(name = "tokenweave", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite state file; defaults to the config's statePath or .tokenweave/state.db
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract tokens from a design payload file
    Ingest {
        payload: PathBuf,
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long)]
        no_variables: bool,
        #[arg(long)]
        no_styles: bool,
    },
    /// Scan a codebase and build the dependency graph
    Scan {
        path: PathBuf,
        /// Token formats, e.g. css-variables,tailwind
        #[arg(long, value_delimiter = ',')]
        formats: Vec<String>,
        /// File globs relative to the scanned path
        #[arg(long, value_delimiter = ',')]
        patterns: Vec<String>,
        /// Merge into the existing graph instead of replacing it
        #[arg(long)]
        update: bool,
    },
    /// Analyze the impact of changing a token value
    Impact {
        token: String,
        value: String,
        #[arg(long)]
        reason: Option<String>,
        /// Attach a migration preview
        #[arg(long)]
        migration: bool,
    },
    /// Generate a migration plan for a stored analysis
    Migrate {
        analysis: String,
        #[arg(long, default_value = "atomic")]
        strategy: String,
        #[arg(long)]
        tests: bool,
        #[arg(long)]
        docs: bool,
    },
    /// Simulate a token change without touching files
    Simulate {
        token: String,
        value: String,
        /// Only files whose path contains this string
        #[arg(long)]
        scope: Option<String>,
        /// Show a line diff per file
        #[arg(long)]
        diff: bool,
    },
    /// Apply a simulation; previews unless --yes
    Apply {
        simulation: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Roll back an applied simulation; previews unless --yes
    Rollback {
        simulation: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// List simulations
    List {
        /// all, simulated, applied or rolled-back
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Show simulation history transitions
    History {
        /// all, simulated, applied or rolled-back
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Report design system health
    Health {
        #[arg(long, value_delimiter = ',')]
        checks: Vec<String>,
        #[arg(long)]
        detailed: bool,
    },
    /// Invoke a tool by name with JSON arguments
    Tool {
        name: String,
        arguments: Option<String>,
    },
}

impl Commands {
    fn is_read_only(&self) -> bool {
        matches!(
            self,
            Commands::Migrate { .. }
                | Commands::List { .. }
                | Commands::History { .. }
                | Commands::Health { .. }
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<WeaveError>() {
            Some(weave) => {
                let report = weave.report();
                eprintln!("{} {}", "error:".red().bold(), report.reason);
                if let Some(hint) = report.hint {
                    eprintln!("{} {}", "hint:".yellow(), hint);
                }
            }
            None => eprintln!("{} {:#}", "error:".red().bold(), err),
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let state_path = cli
        .state
        .clone()
        .or_else(|| config.state_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE));
    if let Some(parent) = state_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut store = SqliteStore::open(&state_path)?;
    let mut engine = Engine::new(config);
    if let Some(snapshot) = store.load()? {
        debug!("Restoring state from {}", state_path.display());
        engine.restore(snapshot);
    }

    let read_only = cli.command.is_read_only();
    execute(&mut engine, cli.command, cli.json).await?;

    if !read_only {
        store.save(&engine.snapshot())?;
        info!("State saved to {}", state_path.display());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn level(level: ImpactLevel) -> colored::ColoredString {
    match level {
        ImpactLevel::Low => level.as_str().green(),
        ImpactLevel::Medium => level.as_str().yellow(),
        ImpactLevel::High => level.as_str().red(),
        ImpactLevel::Critical => level.as_str().red().bold(),
    }
}

fn severity(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Low => severity.as_str().normal(),
        Severity::Medium => severity.as_str().yellow(),
        Severity::High => severity.as_str().red(),
        Severity::Critical => severity.as_str().red().bold(),
    }
}

async fn execute(engine: &mut Engine, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Ingest {
            payload,
            depth,
            no_variables,
            no_styles,
        } => {
            engine.set_source(Box::new(JsonFileSource::new(payload)));
            let options = ExtractOptions {
                include_variables: !no_variables,
                include_styles: !no_styles,
                scan_depth: depth.unwrap_or(engine.config().scan_depth),
            };
            let report = engine.extract_design_tokens(options).await?;
            if json {
                return print_json(&report);
            }
            println!(
                "{} {} tokens from {} nodes",
                "Extracted".green().bold(),
                report.count,
                report.nodes_visited
            );
            println!(
                "  {} created, {} updated, {} unchanged",
                report.created, report.updated, report.unchanged
            );
            for (token_type, count) in &report.by_type {
                println!("  {:<14} {}", token_type.as_str(), count);
            }
            for skipped in &report.skipped {
                println!("  {} {}", "skipped".dimmed(), skipped);
            }
        }
        Commands::Scan {
            path,
            formats,
            patterns,
            update,
        } => {
            let report = engine.build_dependency_graph(GraphRequest {
                codebase_path: path,
                file_patterns: patterns,
                token_formats: formats,
                update_existing: update,
            })?;
            if json {
                return print_json(&report);
            }
            println!(
                "{} {} files ({} bytes) in {}ms",
                "Scanned".green().bold(),
                report.files_scanned,
                report.bytes_read,
                report.duration_ms
            );
            println!(
                "  {} tokens, {} usages, {} potential, {} files",
                report.stats.tokens,
                report.stats.usages,
                report.stats.potential_usages,
                report.stats.files
            );
            if !report.top_tokens.is_empty() {
                println!("{}", "Top tokens".bold());
                for rank in &report.top_tokens {
                    println!(
                        "  {:<32} {} usages in {} files",
                        rank.token_id, rank.usage_count, rank.files
                    );
                }
            }
            for note in &report.notes {
                if is_guidance(note) {
                    println!("  {} {}", "note:".yellow(), note.reason);
                } else {
                    println!("  {} {}", "error:".red(), note.reason);
                }
            }
        }
        Commands::Impact {
            token,
            value,
            reason,
            migration,
        } => {
            let analysis =
                engine.analyze_token_change_impact(&token, &value, reason.as_deref(), true, migration)?;
            if json {
                return print_json(&analysis);
            }
            println!(
                "{} {} -> {} ({})",
                analysis.token_id.bold(),
                analysis.old_value,
                analysis.new_value,
                level(analysis.risk)
            );
            println!("  analysis id: {}", analysis.id.cyan());
            println!(
                "  {} files, {} usages, {} components",
                analysis.counts.files, analysis.counts.usages, analysis.counts.components
            );
            for conflict in &analysis.conflicts {
                println!(
                    "  [{}] {}",
                    severity(conflict.severity),
                    conflict.description
                );
            }
            for edge in &analysis.edge_cases {
                println!("  {} {}", "edge case:".yellow(), edge.description);
            }
            for action in &analysis.suggested_actions {
                println!("  - {}", action);
            }
        }
        Commands::Migrate {
            analysis,
            strategy,
            tests,
            docs,
        } => {
            let strategy: MigrationStrategy = strategy.parse()?;
            let plan = engine.generate_migration_code(&analysis, strategy, tests, docs)?;
            if json {
                return print_json(&plan);
            }
            println!(
                "{} {} ({:?}, risk {})",
                "Migration plan for".bold(),
                plan.token_id,
                plan.strategy,
                level(plan.risk)
            );
            for (i, phase) in plan.phases.iter().enumerate() {
                println!("{}. {} - {}", i + 1, phase.name.bold(), phase.description);
                for step in &phase.steps {
                    println!("     {}", step);
                }
            }
            println!("\n{}", plan.css_snippet);
            println!("{} {}", "rollback:".yellow(), plan.rollback_note);
        }
        Commands::Simulate {
            token,
            value,
            scope,
            diff,
        } => {
            let report = engine
                .simulate_token_change(&token, &value, scope.as_deref(), diff)
                .await?;
            if json {
                return print_json(&report);
            }
            println!(
                "{} {} ({} change(s), impact {})",
                "Simulated".green().bold(),
                report.simulation_id.cyan(),
                report.total_changes,
                level(report.impact_level)
            );
            for file in &report.files {
                println!("  {} ({} lines)", file.path.display(), file.changes);
                if let Some(diff) = &file.diff {
                    for line in diff.lines() {
                        if line.starts_with('+') && !line.starts_with("+++") {
                            println!("    {}", line.green());
                        } else if line.starts_with('-') && !line.starts_with("---") {
                            println!("    {}", line.red());
                        } else {
                            println!("    {}", line.dimmed());
                        }
                    }
                }
            }
            for conflict in &report.conflicts {
                println!("  [{}] {}", severity(conflict.severity), conflict.description);
            }
            for error in &report.errors {
                println!("  {} {}", "unreadable:".red(), error.error.reason);
            }
        }
        Commands::Apply { simulation, yes } => {
            let outcome = engine.apply_token_change(&simulation, yes).await?;
            print_outcome(&outcome, json)?;
        }
        Commands::Rollback { simulation, yes } => {
            let outcome = engine.rollback_token_change(&simulation, yes).await?;
            print_outcome(&outcome, json)?;
        }
        Commands::List { status } => {
            let filter = status_filter(&status)?;
            let simulations = engine.list_token_simulations(filter);
            if json {
                return print_json(&simulations);
            }
            if simulations.is_empty() {
                println!("No simulations");
            }
            for sim in &simulations {
                println!(
                    "{} {:<12} {} {} -> {} ({} changes in {} files, {})",
                    sim.id.cyan(),
                    sim.status.to_string(),
                    sim.token_id.bold(),
                    sim.old_value,
                    sim.new_value,
                    sim.changes,
                    sim.files,
                    level(sim.impact_level)
                );
            }
        }
        Commands::History { status } => {
            let entries = engine.history_with_status(status_filter(&status)?);
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No history");
            }
            for entry in &entries {
                println!(
                    "{} {} {:<12} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    entry.simulation_id.cyan(),
                    entry.status.to_string(),
                    entry.summary
                );
            }
        }
        Commands::Health { checks, detailed } => {
            let checks = if checks.is_empty() {
                HealthCheck::ALL.to_vec()
            } else {
                checks
                    .iter()
                    .map(|c| c.parse())
                    .collect::<std::result::Result<Vec<HealthCheck>, WeaveError>>()?
            };
            let format = if detailed {
                ReportFormat::Detailed
            } else {
                ReportFormat::Summary
            };
            let report = engine.track_design_system_health(&checks, format);
            if json {
                return print_json(&report);
            }
            let score = format!("{}/100", report.score);
            let score = if report.score >= 80 {
                score.green()
            } else if report.score >= 50 {
                score.yellow()
            } else {
                score.red()
            };
            println!("{} {}", "Health score".bold(), score);
            println!(
                "  {} unused, {} drifted, {} inconsistent",
                report.unused_tokens,
                report.drift_count,
                report.inconsistent_usage_count
            );
            if let Some(coverage) = report.coverage {
                println!("  coverage {:.0}%", coverage * 100.0);
            }
            for issue in &report.issues {
                println!("  [{}] {}", severity(issue.severity), issue.message);
                for file in &issue.files {
                    println!("      {}", file.display());
                }
            }
        }
        Commands::Tool { name, arguments } => {
            let arguments = match arguments {
                Some(text) => serde_json::from_str(&text).context("Tool arguments must be JSON")?,
                None => serde_json::Value::Null,
            };
            let result = engine.call(&name, arguments).await;
            print_json(&result)?;
        }
    }
    Ok(())
}

/// `all` lists everything
fn status_filter(status: &str) -> Result<Option<SimulationStatus>> {
    if status.eq_ignore_ascii_case("all") {
        Ok(None)
    } else {
        Ok(Some(status.parse::<SimulationStatus>()?))
    }
}

fn print_outcome(outcome: &ExecutionOutcome, json: bool) -> Result<()> {
    if json {
        return print_json(outcome);
    }
    match outcome {
        ExecutionOutcome::Preview(preview) => {
            println!(
                "{} {:?} {}: {} {} -> {}",
                "Preview".yellow().bold(),
                preview.direction,
                preview.simulation_id.cyan(),
                preview.token_id.bold(),
                preview.from_value,
                preview.to_value
            );
            for file in &preview.files {
                println!("  {} ({} lines)", file.path.display(), file.changes);
            }
            println!("Re-run with --yes to write {} change(s)", preview.total_changes);
        }
        ExecutionOutcome::Executed(report) => {
            let headline = if report.success {
                format!("{:?} succeeded", report.direction).green().bold()
            } else {
                format!("{:?} failed", report.direction).red().bold()
            };
            println!(
                "{} {} is now {}; {} = {} (v{})",
                headline,
                report.simulation_id.cyan(),
                report.status,
                report.token_id.bold(),
                report.token_value,
                report.token_version
            );
            for file in &report.files {
                println!("  {} lines {:?}", file.path.display(), file.lines);
            }
            for error in &report.errors {
                println!("  {} {}", "skipped:".red(), error.error.reason);
            }
        }
    }
    Ok(())
}
