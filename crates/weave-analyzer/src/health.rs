use crate::conflicts::Severity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;
use weave_common::WeaveError;
use weave_core::{TokenRegistry, UsageType};
use weave_graph::DependencyGraph;

/// Coverage below this share of used tokens is reported
const COVERAGE_TARGET: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthCheck {
    UnusedTokens,
    ValueDrift,
    InconsistentUsage,
    Coverage,
}

impl HealthCheck {
    pub const ALL: [HealthCheck; 4] = [
        HealthCheck::UnusedTokens,
        HealthCheck::ValueDrift,
        HealthCheck::InconsistentUsage,
        HealthCheck::Coverage,
    ];
}

impl FromStr for HealthCheck {
    type Err = WeaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "unused-tokens" | "unused" => Ok(HealthCheck::UnusedTokens),
            "value-drift" | "drift" => Ok(HealthCheck::ValueDrift),
            "inconsistent-usage" | "inconsistent" => Ok(HealthCheck::InconsistentUsage),
            "coverage" => Ok(HealthCheck::Coverage),
            other => Err(WeaveError::invalid_value(
                other,
                "expected unused-tokens, value-drift, inconsistent-usage or coverage",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Summary,
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIssue {
    pub check: HealthCheck,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// 0-100, 100 means no issues
    pub score: u32,
    pub checks: Vec<HealthCheck>,
    pub format: ReportFormat,
    pub unused_tokens: usize,
    pub drift_count: usize,
    pub inconsistent_usage_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    pub issues: Vec<HealthIssue>,
}

fn penalty(severity: Severity) -> u32 {
    match severity {
        Severity::Low => 1,
        Severity::Medium => 3,
        Severity::High => 6,
        Severity::Critical => 12,
    }
}

/// Runs the requested checks; an empty list runs all of them
pub fn assess(
    registry: &TokenRegistry,
    graph: &DependencyGraph,
    checks: &[HealthCheck],
    format: ReportFormat,
) -> HealthReport {
    let checks: Vec<HealthCheck> = if checks.is_empty() {
        HealthCheck::ALL.to_vec()
    } else {
        checks.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    };

    let mut report = HealthReport {
        score: 100,
        checks: checks.clone(),
        format,
        unused_tokens: 0,
        drift_count: 0,
        inconsistent_usage_count: 0,
        coverage: None,
        issues: Vec::new(),
    };

    for check in &checks {
        match check {
            HealthCheck::UnusedTokens => unused_tokens(registry, graph, &mut report),
            HealthCheck::ValueDrift => value_drift(graph, &mut report),
            HealthCheck::InconsistentUsage => inconsistent_usage(graph, &mut report),
            HealthCheck::Coverage => coverage(registry, graph, &mut report),
        }
    }

    let total: u32 = report.issues.iter().map(|i| penalty(i.severity)).sum();
    report.score = 100u32.saturating_sub(total);

    if format == ReportFormat::Summary {
        for issue in &mut report.issues {
            issue.files.clear();
        }
    }

    info!(
        "Health: score {}, {} issues across {} checks",
        report.score,
        report.issues.len(),
        checks.len()
    );
    report
}

fn unused_tokens(registry: &TokenRegistry, graph: &DependencyGraph, report: &mut HealthReport) {
    for token in registry.values() {
        if graph.usage_count(&token.id) > 0 || graph.tokens().contains(&token.id) {
            continue;
        }
        report.unused_tokens += 1;
        report.issues.push(HealthIssue {
            check: HealthCheck::UnusedTokens,
            severity: Severity::Low,
            token_id: Some(token.id.clone()),
            message: format!("{} has no usages (dead token)", token.id),
            files: Vec::new(),
        });
    }
}

fn value_drift(graph: &DependencyGraph, report: &mut HealthReport) {
    let mut by_token: BTreeMap<&str, BTreeSet<PathBuf>> = BTreeMap::new();
    for usage in graph.usages() {
        if usage.usage_type == UsageType::Computed {
            report.drift_count += 1;
            by_token
                .entry(usage.token_id.as_str())
                .or_default()
                .insert(usage.file_path.clone());
        }
    }

    for (token_id, files) in by_token {
        let severity = if files.len() > 5 {
            Severity::High
        } else {
            Severity::Medium
        };
        report.issues.push(HealthIssue {
            check: HealthCheck::ValueDrift,
            severity,
            token_id: Some(token_id.to_string()),
            message: format!(
                "{} is hardcoded as a raw value in {} file(s)",
                token_id,
                files.len()
            ),
            files: files.into_iter().collect(),
        });
    }
}

fn inconsistent_usage(graph: &DependencyGraph, report: &mut HealthReport) {
    let mut unmapped: BTreeMap<&str, BTreeSet<PathBuf>> = BTreeMap::new();
    for usage in graph.potential_usages() {
        unmapped
            .entry(usage.pattern.as_str())
            .or_default()
            .insert(usage.file_path.clone());
    }
    for (pattern, files) in unmapped {
        report.inconsistent_usage_count += 1;
        report.issues.push(HealthIssue {
            check: HealthCheck::InconsistentUsage,
            severity: Severity::Low,
            token_id: None,
            message: format!("{} looks like a design token but matches none", pattern),
            files: files.into_iter().collect(),
        });
    }

    // referenced by name in some places and hardcoded in others
    for (token_id, rel) in graph.relationships() {
        if rel.direct_files.is_empty() || rel.computed_files.is_empty() {
            continue;
        }
        report.inconsistent_usage_count += 1;
        report.issues.push(HealthIssue {
            check: HealthCheck::InconsistentUsage,
            severity: Severity::Medium,
            token_id: Some(token_id.clone()),
            message: format!(
                "{} is referenced by name in {} file(s) and hardcoded in {}",
                token_id,
                rel.direct_files.len(),
                rel.computed_files.len()
            ),
            files: rel.computed_files.iter().cloned().collect(),
        });
    }
}

fn coverage(registry: &TokenRegistry, graph: &DependencyGraph, report: &mut HealthReport) {
    if registry.is_empty() {
        report.coverage = Some(0.0);
        return;
    }
    let used = registry
        .values()
        .filter(|t| graph.tokens().contains(&t.id))
        .count();
    let share = used as f64 / registry.len() as f64;
    report.coverage = Some((share * 100.0).round() / 100.0);

    if share < COVERAGE_TARGET {
        report.issues.push(HealthIssue {
            check: HealthCheck::Coverage,
            severity: Severity::Medium,
            token_id: None,
            message: format!(
                "only {} of {} tokens are used in code",
                used,
                registry.len()
            ),
            files: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use weave_core::{Token, TokenType, TokenUsage, UsageContext};
    use weave_graph::ScanResults;

    fn usage(token: &str, file: &str, usage_type: UsageType, context: UsageContext) -> TokenUsage {
        let path = PathBuf::from(file);
        TokenUsage {
            token_id: token.to_string(),
            component: weave_core::component_from_path(&path),
            file_path: path,
            line: Some(1),
            context,
            usage_type,
            pattern: token.to_string(),
            confidence: 1.0,
            last_seen: Utc::now(),
        }
    }

    fn fixture() -> (TokenRegistry, DependencyGraph) {
        let registry = TokenRegistry::from_tokens([
            Token::new("color-primary", "primary", TokenType::Color, "#3366ff"),
            Token::new("color-unused", "unused", TokenType::Color, "#123456"),
            Token::new("spacing-md", "md", TokenType::Spacing, "16px"),
        ]);
        let mut graph = DependencyGraph::new();
        graph.rebuild(
            ScanResults {
                usages: vec![
                    usage("color-primary", "/src/a.css", UsageType::Direct, UsageContext::CssVariable),
                    usage("color-primary", "/src/b.css", UsageType::Computed, UsageContext::CssValue),
                    usage("spacing-md", "/src/b.css", UsageType::Direct, UsageContext::CssVariable),
                ],
                potential_usages: vec![usage(
                    "unmapped_utility-class_bg-red-500",
                    "/src/C.tsx",
                    UsageType::Direct,
                    UsageContext::UtilityClass,
                )],
                files: vec![],
                observed_at: Utc::now(),
            },
            &registry,
        );
        (registry, graph)
    }

    #[test]
    fn test_all_checks() {
        let (registry, graph) = fixture();
        let report = assess(&registry, &graph, &[], ReportFormat::Detailed);

        assert_eq!(report.unused_tokens, 1);
        assert_eq!(report.drift_count, 1);
        assert_eq!(report.inconsistent_usage_count, 2);
        assert_eq!(report.coverage, Some(0.67));
        // low 1 + medium 3 + low 1 + medium 3
        assert_eq!(report.score, 92);
        assert!(report.issues.iter().any(|i| !i.files.is_empty()));
    }

    #[test]
    fn test_summary_omits_files() {
        let (registry, graph) = fixture();
        let report = assess(
            &registry,
            &graph,
            &[HealthCheck::ValueDrift],
            ReportFormat::Summary,
        );
        assert_eq!(report.checks, vec![HealthCheck::ValueDrift]);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].files.is_empty());
    }

    #[test]
    fn test_check_names_parse() {
        assert_eq!(
            "unused_tokens".parse::<HealthCheck>().unwrap(),
            HealthCheck::UnusedTokens
        );
        assert!("lint".parse::<HealthCheck>().is_err());
    }
}
