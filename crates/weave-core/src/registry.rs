use crate::types::{Token, TokenType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use weave_common::{Result, WeaveError};

/// Outcome of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Authoritative store of design tokens, keyed by id.
/// Tokens are never removed; unused ones are reported by health checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRegistry {
    tokens: BTreeMap<String, Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut registry = Self::new();
        for token in tokens {
            registry.upsert(token);
        }
        registry
    }

    /// Insert a token or refresh an existing one with the same id.
    /// Name and type keep their first-written values.
    pub fn upsert(&mut self, token: Token) -> UpsertOutcome {
        match self.tokens.get_mut(&token.id) {
            Some(existing) => {
                if existing.value == token.value {
                    return UpsertOutcome::Unchanged;
                }
                debug!(
                    "Refreshing token {}: {} -> {}",
                    existing.id, existing.value, token.value
                );
                existing.value = token.value;
                existing.last_modified = Utc::now();
                existing.version += 1;
                UpsertOutcome::Updated
            }
            None => {
                let mut token = token;
                token.version = token.version.max(1);
                self.tokens.insert(token.id.clone(), token);
                UpsertOutcome::Created
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&Token> {
        self.get(id).ok_or_else(|| WeaveError::token_not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tokens.contains_key(id)
    }

    /// All tokens, ordered by id
    pub fn values(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn of_type(&self, token_type: TokenType) -> impl Iterator<Item = &Token> {
        self.tokens
            .values()
            .filter(move |t| t.token_type == token_type)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Set a new value, bump the version and touch the timestamp.
    /// Returns the token as it was before the bump.
    pub fn bump(&mut self, id: &str, new_value: &str) -> Result<Token> {
        let token = self
            .tokens
            .get_mut(id)
            .ok_or_else(|| WeaveError::token_not_found(id))?;
        let previous = token.clone();
        token.value = new_value.to_string();
        token.version += 1;
        token.last_modified = Utc::now();
        Ok(previous)
    }
}
