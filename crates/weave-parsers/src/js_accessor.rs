use crate::lines::LineIndex;
use crate::types::*;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use weave_core::TokenType;

/// How the type hint of an accessor is decided
#[derive(Debug, Clone, Copy)]
enum Hint {
    Fixed(Option<TokenType>),
    /// Taken from the group segment, e.g. `tokens.colors.primary`
    FromGroup,
}

struct AccessorShape {
    regex: Regex,
    hint: Hint,
}

/// Recognized accessor chains. The trailing property is the candidate.
const SHAPES: &[(&str, Hint)] = &[
    (r"\btheme\.colors\.([A-Za-z_$][\w$]*)", Hint::Fixed(Some(TokenType::Color))),
    (r"\btheme\.spacing\.([A-Za-z_$][\w$]*)", Hint::Fixed(Some(TokenType::Spacing))),
    (r"\btokens\.([A-Za-z_$][\w$]*)\.([A-Za-z_$][\w$]*)", Hint::FromGroup),
    (r"(?:^|[^.\w$])colors\.([A-Za-z_$][\w$]*)", Hint::Fixed(Some(TokenType::Color))),
    (r"(?:^|[^.\w$])spacing\.([A-Za-z_$][\w$]*)", Hint::Fixed(Some(TokenType::Spacing))),
    (r"\bdesignTokens\.([A-Za-z_$][\w$]*)\.([A-Za-z_$][\w$]*)", Hint::FromGroup),
    (r"(?:^|[^.\w$])vars\.([A-Za-z_$][\w$]*)", Hint::Fixed(None)),
    (r"\bCOLORS\.([A-Za-z_$][\w$]*)", Hint::Fixed(Some(TokenType::Color))),
    (r"\bSPACING\.([A-Za-z_$][\w$]*)", Hint::Fixed(Some(TokenType::Spacing))),
];

// A shape that fails to compile is dropped; the others keep working.
static ACCESSORS: Lazy<Vec<AccessorShape>> = Lazy::new(|| {
    SHAPES
        .iter()
        .filter_map(|(pattern, hint)| match Regex::new(pattern) {
            Ok(regex) => Some(AccessorShape { regex, hint: *hint }),
            Err(err) => {
                warn!("Skipping accessor pattern {}: {}", pattern, err);
                None
            }
        })
        .collect()
});

pub fn parse(section: Section<'_>, lines: &LineIndex) -> Vec<Candidate> {
    let mut out = Vec::new();

    for shape in ACCESSORS.iter() {
        for caps in shape.regex.captures_iter(section.text) {
            let Some(property) = caps.iter().skip(1).flatten().last() else {
                continue;
            };
            let hint = match shape.hint {
                Hint::Fixed(hint) => hint,
                Hint::FromGroup => caps
                    .get(1)
                    .and_then(|group| TokenType::from_category(group.as_str())),
            };
            let offset = section.offset + property.start();
            out.push(
                Candidate::new(
                    property.as_str(),
                    MatchContext::JsAccessor,
                    lines.line_of(offset),
                    offset,
                )
                .with_hint(hint),
            );
        }
    }

    out.sort_by_key(|c| c.offset);
    out
}
