use crate::conflicts::{Conflict, ConflictAnalyzer, Severity};
use crate::migration::MigrationPlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use tracing::info;
use weave_common::Result;
use weave_core::normalizer::{normalize, validate};
use weave_core::{TokenRegistry, UsageContext, UsageType};
use weave_graph::graph::token_references;
use weave_graph::DependencyGraph;
use weave_parsers::TokenMatcher;

/// Blast radius of a change, from (files, changes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactLevel {
    pub fn classify(files: usize, changes: usize) -> Self {
        if files <= 2 && changes <= 5 {
            ImpactLevel::Low
        } else if files <= 5 && changes <= 15 {
            ImpactLevel::Medium
        } else if files <= 10 && changes <= 30 {
            ImpactLevel::High
        } else {
            ImpactLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Low => "LOW",
            ImpactLevel::Medium => "MEDIUM",
            ImpactLevel::High => "HIGH",
            ImpactLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactCounts {
    pub files: usize,
    pub usages: usize,
    pub components: usize,
    pub direct: usize,
    pub computed: usize,
    pub inherited: usize,
    pub potential: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedFile {
    pub path: PathBuf,
    pub component: String,
    pub usages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeCaseKind {
    HardcodedValues,
    MissingLines,
    StyledTemplates,
    SharedValue,
    DependentTokens,
    PotentialUsages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeCase {
    pub kind: EdgeCaseKind,
    pub description: String,
    pub items: Vec<String>,
}

/// Stored result of analyze_token_change_impact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub id: String,
    pub token_id: String,
    pub old_value: String,
    pub new_value: String,
    pub change_reason: Option<String>,
    pub risk: ImpactLevel,
    pub counts: ImpactCounts,
    pub affected_files: Vec<AffectedFile>,
    pub conflicts: Vec<Conflict>,
    pub edge_cases: Vec<EdgeCase>,
    pub suggested_actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_preview: Option<MigrationPlan>,
}

pub struct ImpactAnalyzer<'a> {
    registry: &'a TokenRegistry,
    graph: &'a DependencyGraph,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(registry: &'a TokenRegistry, graph: &'a DependencyGraph) -> Self {
        Self { registry, graph }
    }

    /// Validate the new value, count what the change touches and collect
    /// conflicts and edge cases. Nothing is mutated.
    pub fn analyze(
        &self,
        token_id: &str,
        new_value: &str,
        reason: Option<&str>,
        include_edge_cases: bool,
    ) -> Result<ImpactAnalysis> {
        let token = self.registry.require(token_id)?;
        validate(token.token_type, new_value)?;

        let mut counts = ImpactCounts::default();
        let mut per_file: BTreeMap<PathBuf, AffectedFile> = BTreeMap::new();
        for usage in self.graph.usages_for(token_id) {
            counts.usages += 1;
            match usage.usage_type {
                UsageType::Direct => counts.direct += 1,
                UsageType::Computed => counts.computed += 1,
                UsageType::Inherited => counts.inherited += 1,
            }
            per_file
                .entry(usage.file_path.clone())
                .or_insert_with(|| AffectedFile {
                    path: usage.file_path.clone(),
                    component: usage.component.clone(),
                    usages: 0,
                })
                .usages += 1;
        }
        let affected_files: Vec<AffectedFile> = per_file.into_values().collect();
        counts.files = affected_files.len();
        counts.components = affected_files
            .iter()
            .map(|f| f.component.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let potential = self.related_potential_usages(token_id, &token.name);
        counts.potential = potential.len();

        let risk = ImpactLevel::classify(counts.files, counts.usages);
        let conflicts = ConflictAnalyzer::new(self.registry).analyze(token, new_value, reason);
        let edge_cases = if include_edge_cases {
            self.edge_cases(token_id, potential)
        } else {
            Vec::new()
        };
        let suggested_actions = suggested_actions(risk, &counts, &conflicts, &edge_cases);

        info!(
            "Analyzed {} -> {}: {} files, {} usages, risk {}",
            token_id, new_value, counts.files, counts.usages, risk
        );

        Ok(ImpactAnalysis {
            id: format!("analysis-{}", uuid::Uuid::new_v4()),
            token_id: token_id.to_string(),
            old_value: token.value.clone(),
            new_value: new_value.to_string(),
            change_reason: reason.map(str::to_string),
            risk,
            counts,
            affected_files,
            conflicts,
            edge_cases,
            suggested_actions,
            created_at: Utc::now(),
            migration_preview: None,
        })
    }

    /// Unmapped patterns whose text mentions the token id or name
    fn related_potential_usages(&self, token_id: &str, name: &str) -> Vec<String> {
        let tail = token_id.rsplit('-').next().unwrap_or(token_id);
        let name = name.to_lowercase().replace(' ', "-");
        let mut patterns: BTreeSet<String> = BTreeSet::new();
        for usage in self.graph.potential_usages() {
            let pattern = usage.pattern.to_lowercase();
            if pattern.contains(token_id) || pattern.ends_with(tail) || (!name.is_empty() && pattern.contains(&name)) {
                patterns.insert(usage.pattern.clone());
            }
        }
        patterns.into_iter().collect()
    }

    fn edge_cases(&self, token_id: &str, potential: Vec<String>) -> Vec<EdgeCase> {
        let mut cases = Vec::new();
        let usages: Vec<_> = self.graph.usages_for(token_id).collect();

        let hardcoded: BTreeSet<String> = usages
            .iter()
            .filter(|u| u.usage_type == UsageType::Computed)
            .map(|u| location(&u.file_path, u.line))
            .collect();
        if !hardcoded.is_empty() {
            cases.push(EdgeCase {
                kind: EdgeCaseKind::HardcodedValues,
                description: "Hardcoded literals equal to the token value; other meanings of the same literal change too".to_string(),
                items: hardcoded.into_iter().collect(),
            });
        }

        let lineless: BTreeSet<String> = usages
            .iter()
            .filter(|u| u.line.is_none())
            .map(|u| u.file_path.to_string_lossy().to_string())
            .collect();
        if !lineless.is_empty() {
            cases.push(EdgeCase {
                kind: EdgeCaseKind::MissingLines,
                description: "Usages without a line number cannot be simulated".to_string(),
                items: lineless.into_iter().collect(),
            });
        }

        let styled: BTreeSet<String> = usages
            .iter()
            .filter(|u| u.context == UsageContext::StyledTemplate || u.usage_type == UsageType::Inherited)
            .map(|u| u.component.clone())
            .collect();
        if !styled.is_empty() {
            cases.push(EdgeCase {
                kind: EdgeCaseKind::StyledTemplates,
                description: "Styled components pass the value on to everything they wrap".to_string(),
                items: styled.into_iter().collect(),
            });
        }

        if let Some(token) = self.registry.get(token_id) {
            let current = normalize(token.token_type, &token.value);
            let shared: Vec<String> = self
                .registry
                .of_type(token.token_type)
                .filter(|t| t.id != token_id && normalize(t.token_type, &t.value) == current)
                .map(|t| t.id.clone())
                .collect();
            if !shared.is_empty() {
                cases.push(EdgeCase {
                    kind: EdgeCaseKind::SharedValue,
                    description: "Other tokens carry the same value; hardcoded matches may belong to them".to_string(),
                    items: shared,
                });
            }
        }

        let matcher = TokenMatcher::new(self.registry);
        let dependents: Vec<String> = self
            .registry
            .values()
            .filter(|t| token_references(t, &matcher).iter().any(|d| d == token_id))
            .map(|t| t.id.clone())
            .collect();
        if !dependents.is_empty() {
            cases.push(EdgeCase {
                kind: EdgeCaseKind::DependentTokens,
                description: "Tokens whose values reference this token change with it".to_string(),
                items: dependents,
            });
        }

        if !potential.is_empty() {
            cases.push(EdgeCase {
                kind: EdgeCaseKind::PotentialUsages,
                description: "Unmapped patterns that may denote this token are not part of the change".to_string(),
                items: potential,
            });
        }

        cases
    }
}

fn location(path: &std::path::Path, line: Option<usize>) -> String {
    match line {
        Some(line) => format!("{}:{}", path.display(), line),
        None => path.display().to_string(),
    }
}

fn suggested_actions(
    risk: ImpactLevel,
    counts: &ImpactCounts,
    conflicts: &[Conflict],
    edge_cases: &[EdgeCase],
) -> Vec<String> {
    let mut actions = Vec::new();

    if counts.usages == 0 {
        actions.push("No usages found; rebuild the dependency graph if the codebase changed".to_string());
    }
    match risk {
        ImpactLevel::Low => actions.push("Simulate and apply the change directly".to_string()),
        ImpactLevel::Medium => actions.push("Simulate the change and review the diff before applying".to_string()),
        ImpactLevel::High => actions.push("Use a gradual migration and review each phase".to_string()),
        ImpactLevel::Critical => {
            actions.push("Ship behind a feature flag and roll out gradually".to_string())
        }
    }
    if conflicts.iter().any(|c| c.severity == Severity::Critical) {
        actions.push("Resolve the critical conflicts before applying".to_string());
    }
    if counts.computed > 0 {
        actions.push(format!(
            "Replace {} hardcoded value(s) with token references",
            counts.computed
        ));
    }
    for case in edge_cases {
        match case.kind {
            EdgeCaseKind::SharedValue => actions.push(format!(
                "Decide whether {} should change too",
                case.items.join(", ")
            )),
            EdgeCaseKind::DependentTokens => actions.push(format!(
                "Re-check dependent tokens: {}",
                case.items.join(", ")
            )),
            EdgeCaseKind::PotentialUsages => {
                actions.push("Map the potential usages to tokens and rebuild the graph".to_string())
            }
            _ => {}
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::{Token, TokenType, TokenUsage};
    use weave_graph::ScanResults;

    #[test]
    fn test_impact_ladder() {
        assert_eq!(ImpactLevel::classify(0, 0), ImpactLevel::Low);
        assert_eq!(ImpactLevel::classify(2, 5), ImpactLevel::Low);
        assert_eq!(ImpactLevel::classify(2, 6), ImpactLevel::Medium);
        assert_eq!(ImpactLevel::classify(5, 15), ImpactLevel::Medium);
        assert_eq!(ImpactLevel::classify(6, 6), ImpactLevel::High);
        assert_eq!(ImpactLevel::classify(10, 30), ImpactLevel::High);
        assert_eq!(ImpactLevel::classify(11, 1), ImpactLevel::Critical);
    }

    fn usage(token: &str, file: &str, line: usize, usage_type: UsageType) -> TokenUsage {
        let path = PathBuf::from(file);
        TokenUsage {
            token_id: token.to_string(),
            component: weave_core::component_from_path(&path),
            file_path: path,
            line: Some(line),
            context: if usage_type == UsageType::Computed {
                UsageContext::CssValue
            } else {
                UsageContext::CssVariable
            },
            usage_type,
            pattern: token.to_string(),
            confidence: 1.0,
            last_seen: Utc::now(),
        }
    }

    fn fixture() -> (TokenRegistry, DependencyGraph) {
        let registry = TokenRegistry::from_tokens([
            Token::new("spacing-md", "md", TokenType::Spacing, "16px"),
            Token::new("spacing-gutter", "gutter", TokenType::Spacing, "16px"),
            Token::new("spacing-stack", "stack", TokenType::Spacing, "var(--spacing-md)"),
        ]);
        let mut graph = DependencyGraph::new();
        graph.rebuild(
            ScanResults {
                usages: vec![
                    usage("spacing-md", "/src/Card.css", 2, UsageType::Computed),
                    usage("spacing-md", "/src/Button.tsx", 7, UsageType::Direct),
                ],
                potential_usages: vec![],
                files: vec![],
                observed_at: Utc::now(),
            },
            &registry,
        );
        (registry, graph)
    }

    #[test]
    fn test_analysis_counts_and_edge_cases() {
        let (registry, graph) = fixture();
        let analysis = ImpactAnalyzer::new(&registry, &graph)
            .analyze("spacing-md", "24px", None, true)
            .unwrap();

        assert_eq!(analysis.risk, ImpactLevel::Low);
        assert_eq!(analysis.counts.files, 2);
        assert_eq!(analysis.counts.computed, 1);
        assert_eq!(analysis.counts.components, 2);

        let kinds: Vec<_> = analysis.edge_cases.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&EdgeCaseKind::HardcodedValues));
        assert!(kinds.contains(&EdgeCaseKind::SharedValue));
        assert!(kinds.contains(&EdgeCaseKind::DependentTokens));
        assert!(analysis.id.starts_with("analysis-"));
    }

    #[test]
    fn test_invalid_value_and_unknown_token() {
        let (registry, graph) = fixture();
        let analyzer = ImpactAnalyzer::new(&registry, &graph);
        let err = analyzer.analyze("spacing-md", "wide", None, false).unwrap_err();
        assert_eq!(err.kind(), weave_common::ErrorKind::InvalidValue);
        let err = analyzer.analyze("nope", "1px", None, false).unwrap_err();
        assert_eq!(err.kind(), weave_common::ErrorKind::TokenNotFound);
    }
}
