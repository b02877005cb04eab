use crate::types::{Candidate, MatchContext};
use crate::utility_class::{arbitrary_value, strip_utility_prefix};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use weave_core::normalizer::normalize;
use weave_core::{unmapped_id, Token, TokenRegistry, TokenType};

/// Strategy that resolved a candidate, in ladder order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    ExactId,
    IdSuffix,
    ExactName,
    NormalizedName,
    ExactValue,
    NormalizedValue,
}

impl MatchType {
    pub fn is_value_based(&self) -> bool {
        matches!(self, MatchType::ExactValue | MatchType::NormalizedValue)
    }

    pub fn confidence(&self, context: MatchContext) -> f64 {
        match self {
            MatchType::ExactId | MatchType::IdSuffix | MatchType::ExactName => 1.0,
            MatchType::NormalizedName => 0.9,
            MatchType::ExactValue if context == MatchContext::CssValue => 0.98,
            MatchType::ExactValue | MatchType::NormalizedValue => 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMatch {
    pub token_id: String,
    pub match_type: MatchType,
    pub confidence: f64,
}

/// What a candidate turned into
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched(TokenMatch),
    /// Design-tokenish but unknown; carries the synthetic `unmapped_*` id
    Potential(String),
    Ignored,
}

static LIKELY_UTILITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:bg-|text-|border-|ring-|fill-|stroke-|[pm][trblxy]?-\d|gap-|space-[xy]-|rounded|shadow|opacity-|font-|leading-)",
    )
    .expect("utility token pattern")
});

/// Resolves candidate patterns to registry tokens through a fixed ladder:
/// exact id, id suffix, exact name, normalized name, exact value, normalized value.
pub struct TokenMatcher<'a> {
    tokens: Vec<&'a Token>,
    normalized_values: Vec<String>,
}

impl<'a> TokenMatcher<'a> {
    pub fn new(registry: &'a TokenRegistry) -> Self {
        let tokens: Vec<&Token> = registry.values().collect();
        let normalized_values = tokens
            .iter()
            .map(|t| normalize(t.token_type, &t.value))
            .collect();
        Self {
            tokens,
            normalized_values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// First strategy that hits wins. An exact id always wins regardless of
    /// type; after that, a type hint narrows the ladder to tokens of that type,
    /// falling back to all tokens when none of that type match.
    pub fn resolve(
        &self,
        pattern: &str,
        context: MatchContext,
        type_hint: Option<TokenType>,
    ) -> Option<TokenMatch> {
        if let Some(hint) = type_hint {
            let id = pattern.trim();
            if let Some(token) = self.tokens.iter().find(|t| t.id == id) {
                return Some(TokenMatch {
                    token_id: token.id.clone(),
                    match_type: MatchType::ExactId,
                    confidence: MatchType::ExactId.confidence(context),
                });
            }
            if let Some(found) = self.resolve_filtered(pattern, context, Some(hint)) {
                return Some(found);
            }
        }
        self.resolve_filtered(pattern, context, None)
    }

    fn resolve_filtered(
        &self,
        pattern: &str,
        context: MatchContext,
        type_filter: Option<TokenType>,
    ) -> Option<TokenMatch> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }

        let candidates: Vec<usize> = (0..self.tokens.len())
            .filter(|&i| type_filter.map_or(true, |t| self.tokens[i].token_type == t))
            .collect();

        let hit = |match_type: MatchType, i: usize| TokenMatch {
            token_id: self.tokens[i].id.clone(),
            match_type,
            confidence: match_type.confidence(context),
        };

        // 1. exact id
        if let Some(&i) = candidates.iter().find(|&&i| self.tokens[i].id == pattern) {
            return Some(hit(MatchType::ExactId, i));
        }

        // 2. id suffix
        let suffix = format!("-{}", pattern);
        if let Some(&i) = candidates.iter().find(|&&i| {
            let id = &self.tokens[i].id;
            id.rsplit('-').next() == Some(pattern) || id.ends_with(&suffix)
        }) {
            return Some(hit(MatchType::IdSuffix, i));
        }

        // 3. exact name
        if let Some(&i) = candidates.iter().find(|&&i| self.tokens[i].name == pattern) {
            return Some(hit(MatchType::ExactName, i));
        }

        // 4. normalized name
        let normalized_pattern = normalize_name(pattern);
        if let Some(&i) = candidates
            .iter()
            .find(|&&i| normalize_name(&self.tokens[i].name) == normalized_pattern)
        {
            return Some(hit(MatchType::NormalizedName, i));
        }

        // 5. exact value
        if let Some(&i) = candidates.iter().find(|&&i| self.tokens[i].value == pattern) {
            return Some(hit(MatchType::ExactValue, i));
        }

        // 6. normalized value, css values only
        if context == MatchContext::CssValue {
            if let Some(&i) = candidates.iter().find(|&&i| {
                normalize(self.tokens[i].token_type, pattern) == self.normalized_values[i]
            }) {
                return Some(hit(MatchType::NormalizedValue, i));
            }
        }

        None
    }

    /// Resolve a parser candidate. Utility classes are retried without their
    /// utility prefix and through arbitrary-value brackets.
    pub fn resolve_candidate(&self, candidate: &Candidate) -> Resolution {
        if let Some(pre) = &candidate.resolved {
            let match_type = if pre.exact {
                MatchType::ExactValue
            } else {
                MatchType::NormalizedValue
            };
            return Resolution::Matched(TokenMatch {
                token_id: pre.token_id.clone(),
                match_type,
                confidence: pre.confidence,
            });
        }

        let pattern = candidate.pattern.as_str();
        if let Some(found) = self.resolve(pattern, candidate.context, candidate.type_hint) {
            return Resolution::Matched(found);
        }

        if candidate.context == MatchContext::UtilityClass {
            if let Some(value) = arbitrary_value(pattern) {
                if let Some(found) = self.resolve(value, MatchContext::CssValue, None) {
                    return Resolution::Matched(found);
                }
            } else if let Some(stripped) = strip_utility_prefix(pattern) {
                let hint = utility_type_hint(pattern);
                if let Some(found) = self.resolve(stripped, candidate.context, hint) {
                    return Resolution::Matched(found);
                }
            }
        }

        if looks_like_design_token(pattern, candidate.context) {
            Resolution::Potential(unmapped_id(candidate.context.usage_context(), pattern))
        } else {
            Resolution::Ignored
        }
    }
}

/// Lowercase, spaces to dashes
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

fn utility_type_hint(class: &str) -> Option<TokenType> {
    if ["bg-", "text-", "border-", "ring-", "fill-", "stroke-", "outline-"]
        .iter()
        .any(|p| class.starts_with(p))
    {
        Some(TokenType::Color)
    } else if class.starts_with("rounded") {
        Some(TokenType::BorderRadius)
    } else if class.starts_with("shadow") {
        Some(TokenType::Shadow)
    } else if class.starts_with("opacity-") {
        Some(TokenType::Opacity)
    } else if class.starts_with("font-") || class.starts_with("leading-") {
        Some(TokenType::Typography)
    } else {
        Some(TokenType::Spacing)
    }
}

/// Heuristic for unresolved candidates worth tracking as potential usages
pub fn looks_like_design_token(pattern: &str, context: MatchContext) -> bool {
    match context {
        MatchContext::UtilityClass => LIKELY_UTILITY.is_match(pattern),
        MatchContext::CssVariable | MatchContext::JsAccessor | MatchContext::PreprocessorVariable => {
            !pattern.is_empty()
        }
        MatchContext::CssValue => false,
    }
}
