use crate::lines::LineIndex;
use crate::types::*;
use regex::Regex;
use tracing::{debug, warn};
use weave_core::normalizer::variations;
use weave_core::{TokenRegistry, TokenType};

/// Confidence recorded for a literal value hit
pub const RAW_VALUE_CONFIDENCE: f64 = 0.98;

struct ValuePattern {
    token_id: String,
    token_value: String,
    token_type: TokenType,
    regex: Regex,
}

/// One compiled literal-value pattern per registry token.
/// Built once per scan pass and shared by every file.
pub struct RawValueIndex {
    patterns: Vec<ValuePattern>,
    pub warnings: Vec<String>,
}

impl RawValueIndex {
    pub fn build(registry: &TokenRegistry) -> Self {
        let mut patterns = Vec::new();
        let mut warnings = Vec::new();

        for token in registry.values() {
            let mut spellings: Vec<String> = variations(&token.value)
                .into_iter()
                .filter(|v| v.len() >= 2)
                // bare numbers are too ambiguous outside opacity declarations
                .filter(|v| token.token_type == TokenType::Opacity || v.parse::<f64>().is_err())
                .collect();
            if spellings.is_empty() {
                continue;
            }
            spellings.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

            // escape first, wrap second
            let alternation = spellings
                .iter()
                .map(|s| regex::escape(s))
                .collect::<Vec<_>>()
                .join("|");
            let source = if token.token_type == TokenType::Color {
                format!("(?i)(?:{})", alternation)
            } else {
                format!("(?:{})", alternation)
            };

            match Regex::new(&source) {
                Ok(regex) => patterns.push(ValuePattern {
                    token_id: token.id.clone(),
                    token_value: token.value.clone(),
                    token_type: token.token_type,
                    regex,
                }),
                Err(err) => {
                    warn!("Value pattern for {} failed to compile: {}", token.id, err);
                    warnings.push(format!("value pattern for {}: {}", token.id, err));
                }
            }
        }

        debug!("Built {} raw value patterns", patterns.len());
        Self { patterns, warnings }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn parse(&self, section: Section<'_>, lines: &LineIndex) -> Vec<Candidate> {
        let mut out = Vec::new();
        let text = section.text;

        for pattern in &self.patterns {
            for found in pattern.regex.find_iter(text) {
                if !is_delimited(text, found.start(), found.end()) {
                    continue;
                }
                let site = classify_site(text, found.start());
                if pattern.token_type == TokenType::Opacity
                    && found.as_str().parse::<f64>().is_ok()
                    && site != ValueSite::AfterColon
                {
                    continue;
                }

                let offset = section.offset + found.start();
                let mut candidate = Candidate::new(
                    found.as_str(),
                    MatchContext::CssValue,
                    lines.line_of(offset),
                    offset,
                );
                candidate.site = Some(site);
                candidate.resolved = Some(PreResolved {
                    token_id: pattern.token_id.clone(),
                    exact: found.as_str() == pattern.token_value,
                    confidence: RAW_VALUE_CONFIDENCE,
                });
                out.push(candidate);
            }
        }

        out.sort_by(|a, b| a.offset.cmp(&b.offset));
        out
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// The hit must not be part of a longer word, hex literal or number
fn is_delimited(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    if start > 0 {
        let prev = bytes[start - 1];
        if is_word_byte(prev) || prev == b'#' || prev == b'.' {
            return false;
        }
    }
    if let Some(&next) = bytes.get(end) {
        if is_word_byte(next) || next == b'%' {
            return false;
        }
        if next == b'.' && bytes.get(end + 1).map_or(false, |b| b.is_ascii_digit()) {
            return false;
        }
    }
    true
}

fn classify_site(text: &str, start: usize) -> ValueSite {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &text[line_start..start];

    if let Some(open) = prefix.rfind("${") {
        if !prefix[open..].contains('}') {
            return ValueSite::Interpolation;
        }
    }
    let quotes = |q: char| prefix.chars().filter(|c| *c == q).count() % 2 == 1;
    if quotes('"') || quotes('\'') {
        return ValueSite::StringLiteral;
    }
    if let Some(open) = prefix.rfind('(') {
        if !prefix[open..].contains(')') {
            return ValueSite::FunctionArgument;
        }
    }
    if prefix.contains(':') {
        return ValueSite::AfterColon;
    }
    ValueSite::BareWord
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::Token;

    fn registry() -> TokenRegistry {
        TokenRegistry::from_tokens([
            Token::new("color-primary", "Primary", TokenType::Color, "#ffffff"),
            Token::new("spacing-md", "md", TokenType::Spacing, "16px"),
            Token::new("opacity-half", "half", TokenType::Opacity, "0.5"),
        ])
    }

    fn hits(text: &str) -> Vec<(String, String, usize)> {
        let index = RawValueIndex::build(&registry());
        index
            .parse(Section::whole(text), &LineIndex::new(text))
            .into_iter()
            .map(|c| (c.resolved.unwrap().token_id, c.pattern, c.line))
            .collect()
    }

    #[test]
    fn test_color_spellings_are_found() {
        let text = ".x { color: #FFFFFF; }\n.y { background: rgb(255, 255, 255); }\n.z { border-color: white; }";
        let got = hits(text);
        assert_eq!(got.len(), 3);
        assert!(got.iter().all(|(id, _, _)| id == "color-primary"));
        assert_eq!(got[0].1, "#FFFFFF");
        assert_eq!(got[1].2, 2);
    }

    #[test]
    fn test_partial_literals_are_rejected() {
        let text = ".x { padding: 116px; color: #ffffffaa; width: 16px5; }";
        assert!(hits(text).is_empty());
    }

    #[test]
    fn test_spacing_and_opacity_hits() {
        let text = ".x { padding: 16px 16px; opacity: 0.5; }";
        let got = hits(text);
        let ids: Vec<_> = got.iter().map(|(id, _, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["spacing-md", "spacing-md", "opacity-half"]);
    }

    #[test]
    fn test_site_classification() {
        assert_eq!(classify_site("color: #fff", 7), ValueSite::AfterColon);
        assert_eq!(classify_site("box-shadow: 0 0 2px rgb(#fff", 24), ValueSite::FunctionArgument);
        assert_eq!(classify_site("const c = '#fff'", 11), ValueSite::StringLiteral);
        assert_eq!(classify_site("`${ #fff", 4), ValueSite::Interpolation);
        assert_eq!(classify_site("#fff", 0), ValueSite::BareWord);
    }

    #[test]
    fn test_metacharacters_are_escaped() {
        let registry = TokenRegistry::from_tokens([Token::new(
            "shadow-sm",
            "sm",
            TokenType::Shadow,
            "0 1px 2px rgba(0,0,0,0.1)",
        )]);
        let index = RawValueIndex::build(&registry);
        assert!(index.warnings.is_empty());
        let text = ".c { box-shadow: 0 1px 2px rgba(0,0,0,0.1); }";
        let found = index.parse(Section::whole(text), &LineIndex::new(text));
        assert_eq!(found.len(), 1);
    }
}
