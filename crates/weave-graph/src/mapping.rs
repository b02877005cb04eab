use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use weave_core::TokenType;

/// Accreted evidence that a token shows up in code as certain patterns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub token_id: String,
    pub patterns: BTreeSet<String>,
    pub semantic_type: TokenType,
    /// Running maximum across observations
    pub confidence: f64,
    pub last_matched: DateTime<Utc>,
}

/// Token id -> mapping. Lives beside the graph and survives its rebuilds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingIndex {
    mappings: BTreeMap<String, Mapping>,
}

impl MappingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mappings(mappings: impl IntoIterator<Item = Mapping>) -> Self {
        Self {
            mappings: mappings
                .into_iter()
                .map(|m| (m.token_id.clone(), m))
                .collect(),
        }
    }

    /// Union `pattern` into the token's set and keep the higher confidence
    pub fn record(
        &mut self,
        token_id: &str,
        pattern: &str,
        confidence: f64,
        semantic_type: TokenType,
        at: DateTime<Utc>,
    ) {
        let confidence = confidence.clamp(0.0, 1.0);
        let mapping = self
            .mappings
            .entry(token_id.to_string())
            .or_insert_with(|| Mapping {
                token_id: token_id.to_string(),
                patterns: BTreeSet::new(),
                semantic_type,
                confidence,
                last_matched: at,
            });

        mapping.patterns.insert(pattern.to_string());
        if confidence > mapping.confidence {
            mapping.confidence = confidence;
        }
        if at > mapping.last_matched {
            mapping.last_matched = at;
        }
    }

    pub fn get(&self, token_id: &str) -> Option<&Mapping> {
        self.mappings.get(token_id)
    }

    pub fn mappings(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.values()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
