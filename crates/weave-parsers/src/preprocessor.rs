use crate::lines::LineIndex;
use crate::types::*;
use once_cell::sync::Lazy;
use regex::Regex;

static SCSS_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z_][\w-]*)").expect("preprocessor variable pattern"));

/// `$name` in SCSS/Sass sources
pub fn parse(section: Section<'_>, lines: &LineIndex) -> Vec<Candidate> {
    SCSS_VAR
        .captures_iter(section.text)
        .filter_map(|caps| caps.get(1))
        .map(|name| {
            let offset = section.offset + name.start();
            Candidate::new(
                name.as_str(),
                MatchContext::PreprocessorVariable,
                lines.line_of(offset),
                offset,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scss_variables() {
        let text = "$spacing-md: 16px;\n.card {\n  padding: $spacing-md;\n  width: calc(100% - #{$gutter});\n}";
        let found = parse(Section::whole(text), &LineIndex::new(text));
        let got: Vec<_> = found.iter().map(|c| (c.pattern.as_str(), c.line)).collect();
        assert_eq!(
            got,
            vec![("spacing-md", 1), ("spacing-md", 3), ("gutter", 4)]
        );
    }
}
