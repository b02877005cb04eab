use crate::lines::LineIndex;
use crate::types::*;
use once_cell::sync::Lazy;
use regex::Regex;

static CSS_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\(\s*--([A-Za-z0-9_-]+)").expect("css variable pattern"));

/// `var(--NAME)` -> candidate `NAME`
pub fn parse(section: Section<'_>, lines: &LineIndex) -> Vec<Candidate> {
    CSS_VAR
        .captures_iter(section.text)
        .filter_map(|caps| caps.get(1))
        .map(|name| {
            let offset = section.offset + name.start();
            Candidate::new(
                name.as_str(),
                MatchContext::CssVariable,
                lines.line_of(offset),
                offset,
            )
        })
        .collect()
}
