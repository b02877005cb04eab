use crate::css_variable;
use crate::lines::LineIndex;
use crate::raw_value::RawValueIndex;
use crate::types::*;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// `styled.div`, `styled(Button)`, optionally `.attrs(...)`, up to the opening backtick
static STYLED_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bstyled(?:\.[A-Za-z][\w]*|\(\s*[\w.]+\s*\))(?:\.attrs\((?:[^()]|\([^()]*\))*\))?\s*`")
        .expect("styled opener pattern")
});

/// Byte ranges of template-literal bodies that follow a styled opener
pub fn blocks(text: &str) -> Vec<Range<usize>> {
    STYLED_OPEN
        .find_iter(text)
        .filter_map(|open| {
            let body_start = open.end();
            find_closing_backtick(text, body_start).map(|end| body_start..end)
        })
        .collect()
}

/// Walks a template literal, skipping escapes and `${...}` interpolations
fn find_closing_backtick(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    let mut depth = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'$' if depth == 0 && bytes.get(i + 1) == Some(&b'{') => {
                depth = 1;
                i += 1;
            }
            b'{' if depth > 0 => depth += 1,
            b'}' if depth > 0 => depth -= 1,
            b'`' if depth == 0 => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// CSS-variable and raw-value recognition inside every styled block,
/// with lines counted in the enclosing file
pub fn parse(
    section: Section<'_>,
    lines: &LineIndex,
    raw_values: Option<&RawValueIndex>,
) -> Vec<Candidate> {
    let mut out = Vec::new();

    for block in blocks(section.text) {
        let inner = Section {
            text: &section.text[block.clone()],
            offset: section.offset + block.start,
        };

        out.extend(
            css_variable::parse(inner, lines)
                .into_iter()
                .map(Candidate::in_styled_template),
        );
        if let Some(index) = raw_values {
            out.extend(
                index
                    .parse(inner, lines)
                    .into_iter()
                    .map(Candidate::in_styled_template),
            );
        }
    }

    out.sort_by_key(|c| c.offset);
    out
}
