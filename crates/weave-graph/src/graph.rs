use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use crate::query::UsageQuery;
use tracing::{debug, info, warn};
use weave_core::{Token, TokenRegistry, TokenUsage, UsageKey, UsageType};
use weave_parsers::{MatchContext, TokenMatcher};

static TOKEN_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"var\(\s*--([\w-]+)|\{([\w.-]+)\}|\$([\w-]+)").expect("token reference pattern")
});

/// Output of one scan pass, ready to be folded into the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResults {
    pub usages: Vec<TokenUsage>,
    pub potential_usages: Vec<TokenUsage>,
    /// Every file the pass read, with or without usages
    pub files: Vec<PathBuf>,
    pub observed_at: DateTime<Utc>,
}

/// Derived per-token aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub direct_files: BTreeSet<PathBuf>,
    pub computed_files: BTreeSet<PathBuf>,
    /// Tokens this token's value refers to
    pub dependencies: Vec<String>,
}

/// Token ranked by usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRank {
    pub token_id: String,
    pub usage_count: usize,
    pub files: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub tokens: usize,
    pub usages: usize,
    pub potential_usages: usize,
    pub files: usize,
}

/// Token id -> usages, plus derived relationships.
/// Edges only run from tokens to files, so the graph has no cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    tokens: BTreeSet<String>,
    usages: Vec<TokenUsage>,
    potential_usages: Vec<TokenUsage>,
    relationships: BTreeMap<String, Relationship>,
    last_updated: Option<DateTime<Utc>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every usage with the ones from `results`
    pub fn rebuild(&mut self, results: ScanResults, registry: &TokenRegistry) {
        self.usages = dedup(resolvable(results.usages, registry));
        self.potential_usages = dedup(results.potential_usages);
        self.recompute(registry, results.observed_at);
        info!(
            "Rebuilt dependency graph: {} tokens, {} usages",
            self.tokens.len(),
            self.usages.len()
        );
    }

    /// Drop prior usages for every (file, token) pair seen in `results` and for
    /// every file the pass re-read, then insert the new ones. Files outside the
    /// pass keep their usages; unchanged files produce the same graph.
    pub fn update(&mut self, results: ScanResults, registry: &TokenRegistry) {
        let rescanned: BTreeSet<PathBuf> = results.files.into_iter().collect();
        let fresh = resolvable(results.usages, registry);
        self.usages = merge(std::mem::take(&mut self.usages), fresh, &rescanned);
        self.potential_usages = merge(
            std::mem::take(&mut self.potential_usages),
            results.potential_usages,
            &rescanned,
        );
        self.recompute(registry, results.observed_at);
        info!(
            "Updated dependency graph: {} tokens, {} usages",
            self.tokens.len(),
            self.usages.len()
        );
    }

    fn recompute(&mut self, registry: &TokenRegistry, at: DateTime<Utc>) {
        let matcher = TokenMatcher::new(registry);
        let mut relationships: BTreeMap<String, Relationship> = BTreeMap::new();

        for usage in &self.usages {
            let entry = relationships.entry(usage.token_id.clone()).or_default();
            match usage.usage_type {
                UsageType::Direct | UsageType::Inherited => {
                    entry.direct_files.insert(usage.file_path.clone());
                }
                UsageType::Computed => {
                    entry.computed_files.insert(usage.file_path.clone());
                }
            }
        }

        // tokens referenced by a used token's value count as present too
        let used: Vec<String> = relationships.keys().cloned().collect();
        for id in used {
            let Some(token) = registry.get(&id) else {
                continue;
            };
            let deps = token_references(token, &matcher);
            for dep in &deps {
                relationships.entry(dep.clone()).or_default();
            }
            if let Some(entry) = relationships.get_mut(&id) {
                entry.dependencies = deps;
            }
        }

        relationships.retain(|id, _| registry.contains(id));
        self.tokens = relationships.keys().cloned().collect();
        self.relationships = relationships;
        self.last_updated = Some(at);
    }

    pub fn tokens(&self) -> &BTreeSet<String> {
        &self.tokens
    }

    pub fn usages(&self) -> &[TokenUsage] {
        &self.usages
    }

    pub fn potential_usages(&self) -> &[TokenUsage] {
        &self.potential_usages
    }

    pub fn relationships(&self) -> &BTreeMap<String, Relationship> {
        &self.relationships
    }

    pub fn relationship(&self, token_id: &str) -> Option<&Relationship> {
        self.relationships.get(token_id)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn usages_for<'a>(&'a self, token_id: &'a str) -> impl Iterator<Item = &'a TokenUsage> {
        self.usages.iter().filter(move |u| u.token_id == token_id)
    }

    /// Usages accepted by `query`, grouped by file in path order
    pub fn usages_by_file(&self, query: &UsageQuery) -> BTreeMap<PathBuf, Vec<&TokenUsage>> {
        let mut grouped: BTreeMap<PathBuf, Vec<&TokenUsage>> = BTreeMap::new();
        for usage in query.run(self) {
            grouped.entry(usage.file_path.clone()).or_default().push(usage);
        }
        grouped
    }

    /// Tokens whose value refers to `token_id`
    pub fn dependents_of(&self, token_id: &str) -> Vec<String> {
        self.relationships
            .iter()
            .filter(|(_, rel)| rel.dependencies.iter().any(|d| d == token_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn usage_count(&self, token_id: &str) -> usize {
        self.usages_for(token_id).count()
    }

    /// Tokens ranked by usage count, files covered breaking ties
    pub fn top_n(&self, n: usize) -> Vec<TokenRank> {
        let mut counts: BTreeMap<&str, (usize, BTreeSet<&PathBuf>)> = BTreeMap::new();
        for usage in &self.usages {
            let entry = counts.entry(usage.token_id.as_str()).or_default();
            entry.0 += 1;
            entry.1.insert(&usage.file_path);
        }

        let mut ranked: Vec<TokenRank> = counts
            .into_iter()
            .map(|(id, (count, files))| TokenRank {
                token_id: id.to_string(),
                usage_count: count,
                files: files.len(),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then(b.files.cmp(&a.files))
                .then_with(|| a.token_id.cmp(&b.token_id))
        });
        ranked.truncate(n);
        ranked
    }

    pub fn stats(&self) -> GraphStats {
        let files: BTreeSet<&PathBuf> = self.usages.iter().map(|u| &u.file_path).collect();
        GraphStats {
            tokens: self.tokens.len(),
            usages: self.usages.len(),
            potential_usages: self.potential_usages.len(),
            files: files.len(),
        }
    }
}

/// Ids of registry tokens referenced from a token's value:
/// `var(--x)`, `{x}` aliases and `$x`
pub fn token_references(token: &Token, matcher: &TokenMatcher<'_>) -> Vec<String> {
    let mut deps = Vec::new();
    for caps in TOKEN_REFERENCE.captures_iter(&token.value) {
        let Some(raw) = caps.iter().skip(1).flatten().next() else {
            continue;
        };
        let name = raw.as_str().replace('.', "-");
        if let Some(found) = matcher.resolve(&name, MatchContext::CssVariable, None) {
            if found.token_id != token.id && !deps.contains(&found.token_id) {
                deps.push(found.token_id);
            }
        }
    }
    deps
}

fn resolvable(usages: Vec<TokenUsage>, registry: &TokenRegistry) -> Vec<TokenUsage> {
    usages
        .into_iter()
        .filter(|u| {
            let known = registry.contains(&u.token_id);
            if !known {
                warn!("Dropping usage of unknown token {}", u.token_id);
            }
            known
        })
        .collect()
}

/// Unique on (token id, file, line, context); later entries win; sorted by key
fn dedup(usages: Vec<TokenUsage>) -> Vec<TokenUsage> {
    let mut by_key: BTreeMap<UsageKey, TokenUsage> = BTreeMap::new();
    for usage in usages {
        by_key.insert(usage.key(), usage);
    }
    by_key.into_values().collect()
}

fn merge(
    existing: Vec<TokenUsage>,
    fresh: Vec<TokenUsage>,
    rescanned: &BTreeSet<PathBuf>,
) -> Vec<TokenUsage> {
    let seen: BTreeSet<(PathBuf, String)> = fresh
        .iter()
        .map(|u| (u.file_path.clone(), u.token_id.clone()))
        .collect();
    let before = existing.len();
    let mut kept: Vec<TokenUsage> = existing
        .into_iter()
        .filter(|u| {
            !rescanned.contains(&u.file_path)
                && !seen.contains(&(u.file_path.clone(), u.token_id.clone()))
        })
        .collect();
    debug!("Replacing {} prior usages", before - kept.len());
    kept.extend(fresh);
    dedup(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::{TokenType, UsageContext};

    fn registry() -> TokenRegistry {
        TokenRegistry::from_tokens([
            Token::new("color-primary", "primary", TokenType::Color, "#3366ff"),
            Token::new("color-link", "link", TokenType::Color, "var(--color-primary)"),
            Token::new("spacing-md", "md", TokenType::Spacing, "16px"),
            Token::new("spacing-lg", "lg", TokenType::Spacing, "24px"),
        ])
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(0, 0).unwrap()
    }

    fn usage(token: &str, file: &str, line: usize, usage_type: UsageType) -> TokenUsage {
        TokenUsage {
            token_id: token.to_string(),
            file_path: PathBuf::from(file),
            component: "C".to_string(),
            line: Some(line),
            context: match usage_type {
                UsageType::Computed => UsageContext::CssValue,
                _ => UsageContext::CssVariable,
            },
            usage_type,
            pattern: token.to_string(),
            confidence: 1.0,
            last_seen: epoch(),
        }
    }

    fn results(usages: Vec<TokenUsage>) -> ScanResults {
        ScanResults {
            usages,
            potential_usages: Vec::new(),
            files: Vec::new(),
            observed_at: epoch(),
        }
    }

    #[test]
    fn test_rebuild_partitions_relationships() {
        let registry = registry();
        let mut graph = DependencyGraph::new();
        graph.rebuild(
            results(vec![
                usage("color-primary", "/a.css", 1, UsageType::Direct),
                usage("color-primary", "/b.css", 4, UsageType::Computed),
                usage("color-primary", "/b.css", 4, UsageType::Computed),
                usage("ghost", "/a.css", 2, UsageType::Direct),
            ]),
            &registry,
        );

        assert_eq!(graph.usages().len(), 2);
        let rel = graph.relationship("color-primary").unwrap();
        assert_eq!(rel.direct_files.len(), 1);
        assert_eq!(rel.computed_files.len(), 1);
        assert!(!graph.tokens().contains("ghost"));
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let registry = registry();
        let input = vec![
            usage("spacing-md", "/b.css", 3, UsageType::Computed),
            usage("color-primary", "/a.css", 1, UsageType::Direct),
        ];
        let mut first = DependencyGraph::new();
        first.rebuild(results(input.clone()), &registry);
        let mut second = DependencyGraph::new();
        second.rebuild(results(input), &registry);

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_dependencies_make_tokens_present() {
        let registry = registry();
        let mut graph = DependencyGraph::new();
        graph.rebuild(
            results(vec![usage("color-link", "/a.css", 1, UsageType::Direct)]),
            &registry,
        );
        assert_eq!(
            graph.relationship("color-link").unwrap().dependencies,
            vec!["color-primary".to_string()]
        );
        assert!(graph.tokens().contains("color-primary"));
        assert_eq!(graph.dependents_of("color-primary"), vec!["color-link".to_string()]);
    }

    #[test]
    fn test_update_replaces_seen_pairs_only() {
        let registry = registry();
        let mut graph = DependencyGraph::new();
        graph.rebuild(
            results(vec![
                usage("spacing-md", "/a.css", 1, UsageType::Computed),
                usage("spacing-md", "/a.css", 9, UsageType::Computed),
                usage("spacing-lg", "/b.css", 2, UsageType::Computed),
            ]),
            &registry,
        );

        graph.update(
            results(vec![usage("spacing-md", "/a.css", 5, UsageType::Computed)]),
            &registry,
        );
        let lines: Vec<_> = graph.usages_for("spacing-md").map(|u| u.line).collect();
        assert_eq!(lines, vec![Some(5)]);
        assert_eq!(graph.usage_count("spacing-lg"), 1);

        // same pass again changes nothing
        let snapshot = serde_json::to_string(&graph).unwrap();
        graph.update(
            results(vec![usage("spacing-md", "/a.css", 5, UsageType::Computed)]),
            &registry,
        );
        assert_eq!(serde_json::to_string(&graph).unwrap(), snapshot);
    }

    #[test]
    fn test_update_prunes_tokens_gone_from_rescanned_files() {
        let registry = registry();
        let mut graph = DependencyGraph::new();
        graph.rebuild(
            results(vec![
                usage("spacing-md", "/a.css", 1, UsageType::Computed),
                usage("spacing-lg", "/a.css", 2, UsageType::Computed),
                usage("spacing-lg", "/b.css", 2, UsageType::Computed),
            ]),
            &registry,
        );

        // /a.css was re-read and now only mentions spacing-md; /b.css was not read
        let mut pass = results(vec![usage("spacing-md", "/a.css", 1, UsageType::Computed)]);
        pass.files = vec![PathBuf::from("/a.css")];
        graph.update(pass, &registry);

        let lg: Vec<_> = graph
            .usages_for("spacing-lg")
            .map(|u| u.file_path.clone())
            .collect();
        assert_eq!(lg, vec![PathBuf::from("/b.css")]);
        assert_eq!(graph.usage_count("spacing-md"), 1);
    }

    #[test]
    fn test_usages_by_file_follows_query() {
        let registry = registry();
        let mut graph = DependencyGraph::new();
        graph.rebuild(
            results(vec![
                usage("spacing-md", "/b.css", 7, UsageType::Computed),
                usage("spacing-md", "/a.css", 1, UsageType::Computed),
                usage("spacing-md", "/a.css", 3, UsageType::Computed),
                usage("spacing-lg", "/a.css", 2, UsageType::Computed),
            ]),
            &registry,
        );

        let grouped = graph.usages_by_file(&UsageQuery::new().with_token("spacing-md"));
        let files: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(files, vec![PathBuf::from("/a.css"), PathBuf::from("/b.css")]);
        assert_eq!(grouped[&PathBuf::from("/a.css")].len(), 2);

        let scoped = graph.usages_by_file(
            &UsageQuery::new()
                .with_token("spacing-md")
                .with_file("b.css"),
        );
        assert_eq!(scoped.len(), 1);
    }

    #[test]
    fn test_top_n_ranks_by_count_then_files() {
        let registry = registry();
        let mut graph = DependencyGraph::new();
        graph.rebuild(
            results(vec![
                usage("spacing-md", "/a.css", 1, UsageType::Computed),
                usage("spacing-md", "/a.css", 2, UsageType::Computed),
                usage("spacing-lg", "/a.css", 3, UsageType::Computed),
                usage("spacing-lg", "/b.css", 3, UsageType::Computed),
                usage("color-primary", "/a.css", 4, UsageType::Direct),
            ]),
            &registry,
        );
        let top: Vec<_> = graph.top_n(2).into_iter().map(|r| r.token_id).collect();
        assert_eq!(top, vec!["spacing-lg".to_string(), "spacing-md".to_string()]);
    }
}
