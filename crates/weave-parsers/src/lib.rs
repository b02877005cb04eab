pub mod css_variable;
pub mod js_accessor;
pub mod lines;
pub mod matcher;
pub mod preprocessor;
pub mod raw_value;
pub mod styled_template;
pub mod types;
pub mod utility_class;
pub mod vue;

pub use lines::LineIndex;
pub use matcher::{MatchType, Resolution, TokenMatch, TokenMatcher};
pub use raw_value::RawValueIndex;
pub use types::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use vue::{VueSection, VueSectionKind};
use weave_core::{SourceFile, SourceLanguage, TokenRegistry};

/// The recognizers a caller can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    CssVariable,
    UtilityClass,
    JsAccessor,
    StyledTemplate,
    PreprocessorVariable,
    RawValue,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::CssVariable,
        Dialect::UtilityClass,
        Dialect::JsAccessor,
        Dialect::StyledTemplate,
        Dialect::PreprocessorVariable,
        Dialect::RawValue,
    ];

    /// Canonical format tag
    pub fn tag(&self) -> &'static str {
        match self {
            Dialect::CssVariable => "css-variables",
            Dialect::UtilityClass => "tailwind",
            Dialect::JsAccessor => "js-tokens",
            Dialect::StyledTemplate => "styled-components",
            Dialect::PreprocessorVariable => "scss-variables",
            Dialect::RawValue => "css-value",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Dialect::CssVariable => &["css-variables", "css-variable", "css-vars", "css-custom-properties"],
            Dialect::UtilityClass => &["tailwind", "utility-classes", "utility-class", "classes"],
            Dialect::JsAccessor => &["js-tokens", "js-accessors", "js-accessor", "theme", "js"],
            Dialect::StyledTemplate => &["styled-components", "styled-template", "styled", "css-in-js"],
            Dialect::PreprocessorVariable => &["scss-variables", "sass-variables", "scss", "sass", "preprocessor"],
            Dialect::RawValue => &["css-value", "css-values", "raw-values", "raw-value", "values"],
        }
    }

    /// Run this recognizer over one section of a file
    fn run(
        &self,
        section: Section<'_>,
        lines: &LineIndex,
        raw_values: &RawValueIndex,
    ) -> Vec<Candidate> {
        match self {
            Dialect::CssVariable => css_variable::parse(section, lines),
            Dialect::UtilityClass => utility_class::parse(section, lines),
            Dialect::JsAccessor => js_accessor::parse(section, lines),
            Dialect::StyledTemplate => styled_template::parse(section, lines, Some(raw_values)),
            Dialect::PreprocessorVariable => preprocessor::parse(section, lines),
            Dialect::RawValue => raw_values.parse(section, lines),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Map from format tag to recognizer
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    by_tag: BTreeMap<String, Dialect>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        let mut by_tag = BTreeMap::new();
        for dialect in Dialect::ALL {
            for alias in dialect.aliases() {
                by_tag.insert(alias.to_string(), dialect);
            }
        }
        Self { by_tag }
    }

    pub fn get(&self, tag: &str) -> Option<Dialect> {
        self.by_tag.get(&tag.trim().to_lowercase()).copied()
    }

    /// Resolve a caller's format list. Empty means every dialect.
    /// Unknown tags are returned separately so the caller can warn.
    pub fn resolve(&self, formats: &[String]) -> (Vec<Dialect>, Vec<String>) {
        if formats.is_empty() {
            return (Dialect::ALL.to_vec(), Vec::new());
        }

        let mut dialects = Vec::new();
        let mut unknown = Vec::new();
        for format in formats {
            match self.get(format) {
                Some(d) if !dialects.contains(&d) => dialects.push(d),
                Some(_) => {}
                None => unknown.push(format.clone()),
            }
        }
        dialects.sort();
        (dialects, unknown)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Dialects that apply to a language, before the caller's selection
fn dialects_for(language: SourceLanguage) -> &'static [Dialect] {
    match language {
        SourceLanguage::CSS => &[Dialect::CssVariable, Dialect::UtilityClass, Dialect::RawValue],
        SourceLanguage::SCSS | SourceLanguage::Sass => &[
            Dialect::CssVariable,
            Dialect::UtilityClass,
            Dialect::PreprocessorVariable,
            Dialect::RawValue,
        ],
        SourceLanguage::TypeScript
        | SourceLanguage::TSX
        | SourceLanguage::JavaScript
        | SourceLanguage::JSX => &[
            Dialect::CssVariable,
            Dialect::UtilityClass,
            Dialect::JsAccessor,
            Dialect::StyledTemplate,
        ],
        // dispatched per section
        SourceLanguage::Vue => &[],
    }
}

fn dialects_for_vue_section(section: &VueSection<'_>) -> &'static [Dialect] {
    match section.kind {
        VueSectionKind::Template => &[Dialect::UtilityClass, Dialect::CssVariable],
        VueSectionKind::Script => &[
            Dialect::CssVariable,
            Dialect::JsAccessor,
            Dialect::StyledTemplate,
        ],
        VueSectionKind::Style if section.is_preprocessor() => dialects_for(SourceLanguage::SCSS),
        VueSectionKind::Style => dialects_for(SourceLanguage::CSS),
    }
}

/// One parse pass: the selected dialects plus the value patterns compiled
/// from the registry, reused for every file of the pass
pub struct ParseSession {
    dialects: Vec<Dialect>,
    raw_values: RawValueIndex,
}

impl ParseSession {
    pub fn new(registry: &TokenRegistry, dialects: Vec<Dialect>) -> Self {
        let raw_values = if dialects.contains(&Dialect::RawValue)
            || dialects.contains(&Dialect::StyledTemplate)
        {
            RawValueIndex::build(registry)
        } else {
            RawValueIndex::build(&TokenRegistry::new())
        };
        Self {
            dialects,
            raw_values,
        }
    }

    pub fn dialects(&self) -> &[Dialect] {
        &self.dialects
    }

    /// Pattern-level warnings raised while compiling value patterns
    pub fn warnings(&self) -> &[String] {
        &self.raw_values.warnings
    }

    pub fn parse_file(&self, file: &SourceFile) -> ParseOutcome {
        let lines = LineIndex::new(&file.content);
        let mut outcome = ParseOutcome::default();

        if file.language == SourceLanguage::Vue {
            let sections = vue::split_sections(&file.content);
            if sections.is_empty() {
                outcome
                    .warnings
                    .push(format!("{}: no template/script/style sections", file.relative_path));
            }
            for section in &sections {
                let slice = Section {
                    text: section.text,
                    offset: section.offset,
                };
                outcome.candidates.extend(self.run_all(
                    dialects_for_vue_section(section),
                    slice,
                    &lines,
                    section.kind == VueSectionKind::Script,
                ));
            }
        } else {
            outcome.candidates = self.run_all(
                dialects_for(file.language),
                Section::whole(&file.content),
                &lines,
                file.language.is_script(),
            );
        }

        debug!(
            "Parsed {}: {} candidates",
            file.relative_path,
            outcome.candidates.len()
        );
        outcome
    }

    fn run_all(
        &self,
        applicable: &[Dialect],
        section: Section<'_>,
        lines: &LineIndex,
        is_script: bool,
    ) -> Vec<Candidate> {
        let selected: Vec<Dialect> = applicable
            .iter()
            .copied()
            .filter(|d| self.dialects.contains(d))
            .collect();

        // candidates inside styled blocks are reported once, by the styled parser
        let styled_blocks = if is_script && selected.contains(&Dialect::StyledTemplate) {
            styled_template::blocks(section.text)
                .into_iter()
                .map(|r| (r.start + section.offset)..(r.end + section.offset))
                .collect()
        } else {
            Vec::new()
        };

        let mut out = Vec::new();
        for dialect in selected {
            let found = dialect.run(section, lines, &self.raw_values);
            if dialect == Dialect::StyledTemplate || styled_blocks.is_empty() {
                out.extend(found);
            } else {
                out.extend(
                    found
                        .into_iter()
                        .filter(|c| !styled_blocks.iter().any(|b| b.contains(&c.offset))),
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use weave_core::{Token, TokenType, UsageContext};

    fn source(name: &str, language: SourceLanguage, content: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(format!("/repo/{}", name)),
            relative_path: name.to_string(),
            language,
            size: content.len() as u64,
            content: content.to_string(),
        }
    }

    fn registry() -> TokenRegistry {
        TokenRegistry::from_tokens([
            Token::new("color-primary", "primary", TokenType::Color, "#ffffff"),
            Token::new("spacing-md", "md", TokenType::Spacing, "16px"),
        ])
    }

    #[test]
    fn test_format_tags_resolve() {
        let parsers = ParserRegistry::new();
        let (dialects, unknown) = parsers.resolve(&[
            "css-variables".to_string(),
            "css-value".to_string(),
            "bogus".to_string(),
        ]);
        assert_eq!(dialects, vec![Dialect::CssVariable, Dialect::RawValue]);
        assert_eq!(unknown, vec!["bogus".to_string()]);
        assert_eq!(parsers.resolve(&[]).0.len(), 6);
    }

    #[test]
    fn test_css_file_with_selected_dialects() {
        let registry = registry();
        let session = ParseSession::new(&registry, vec![Dialect::CssVariable, Dialect::RawValue]);
        let file = source(
            "a.css",
            SourceLanguage::CSS,
            ".x { color: #FFFFFF; }\n.y { color: var(--color-primary); @apply p-4; }",
        );
        let outcome = session.parse_file(&file);
        let got: Vec<_> = outcome
            .candidates
            .iter()
            .map(|c| (c.context, c.line))
            .collect();
        // @apply is not selected
        assert_eq!(
            got,
            vec![(MatchContext::CssVariable, 2), (MatchContext::CssValue, 1)]
        );
    }

    #[test]
    fn test_styled_blocks_are_not_double_counted() {
        let registry = registry();
        let session = ParseSession::new(&registry, Dialect::ALL.to_vec());
        let file = source(
            "Button.tsx",
            SourceLanguage::TSX,
            "const B = styled.div`\n  color: var(--color-primary);\n`;\nconst s = 'var(--spacing-md)';",
        );
        let outcome = session.parse_file(&file);
        let css_vars: Vec<_> = outcome
            .candidates
            .iter()
            .filter(|c| c.context == MatchContext::CssVariable)
            .map(|c| (c.pattern.as_str(), c.usage_context))
            .collect();
        assert_eq!(
            css_vars,
            vec![
                ("spacing-md", UsageContext::CssVariable),
                ("color-primary", UsageContext::StyledTemplate),
            ]
        );
    }

    #[test]
    fn test_vue_sections_dispatch() {
        let registry = registry();
        let session = ParseSession::new(&registry, Dialect::ALL.to_vec());
        let content = "<template>\n  <div class=\"bg-primary\"></div>\n</template>\n<script>\nconst c = theme.colors.primary\n</script>\n<style lang=\"scss\">\n.a { padding: $spacing-md; margin: 16px; }\n</style>\n";
        let file = source("Card.vue", SourceLanguage::Vue, content);
        let outcome = session.parse_file(&file);

        let mut got: Vec<_> = outcome
            .candidates
            .iter()
            .map(|c| (c.context, c.line))
            .collect();
        got.sort();
        assert_eq!(
            got,
            vec![
                (MatchContext::UtilityClass, 2),
                (MatchContext::JsAccessor, 5),
                (MatchContext::PreprocessorVariable, 8),
                (MatchContext::CssValue, 8),
            ]
        );
    }
}
