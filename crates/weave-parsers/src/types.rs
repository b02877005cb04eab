use serde::{Deserialize, Serialize};
use std::fmt;
use weave_core::{TokenType, UsageContext};

/// Context a candidate is resolved in. Decides which matcher strategies apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchContext {
    CssVariable,
    UtilityClass,
    JsAccessor,
    PreprocessorVariable,
    CssValue,
}

impl MatchContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchContext::CssVariable => "css-variable",
            MatchContext::UtilityClass => "utility-class",
            MatchContext::JsAccessor => "js-accessor",
            MatchContext::PreprocessorVariable => "preprocessor-variable",
            MatchContext::CssValue => "css-value",
        }
    }

    /// Usage context recorded when the candidate was not found inside a styled block
    pub fn usage_context(&self) -> UsageContext {
        match self {
            MatchContext::CssVariable => UsageContext::CssVariable,
            MatchContext::UtilityClass => UsageContext::UtilityClass,
            MatchContext::JsAccessor => UsageContext::JsAccessor,
            MatchContext::PreprocessorVariable => UsageContext::PreprocessorVariable,
            MatchContext::CssValue => UsageContext::CssValue,
        }
    }
}

impl fmt::Display for MatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a raw value hit sits relative to its surroundings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSite {
    AfterColon,
    FunctionArgument,
    StringLiteral,
    Interpolation,
    BareWord,
}

/// Token already identified by the parser (raw-value scanning works per token)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreResolved {
    pub token_id: String,
    pub exact: bool,
    pub confidence: f64,
}

/// A possible token reference found in source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub pattern: String,
    pub context: MatchContext,
    pub usage_context: UsageContext,
    /// 1-based
    pub line: usize,
    /// Byte offset of the pattern in the whole file
    pub offset: usize,
    /// Narrows matching to one token type, e.g. `theme.colors.*`
    pub type_hint: Option<TokenType>,
    pub site: Option<ValueSite>,
    pub resolved: Option<PreResolved>,
}

impl Candidate {
    pub fn new(pattern: impl Into<String>, context: MatchContext, line: usize, offset: usize) -> Self {
        Self {
            pattern: pattern.into(),
            context,
            usage_context: context.usage_context(),
            line,
            offset,
            type_hint: None,
            site: None,
            resolved: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<TokenType>) -> Self {
        self.type_hint = hint;
        self
    }

    pub fn in_styled_template(mut self) -> Self {
        self.usage_context = UsageContext::StyledTemplate;
        self
    }
}

/// A slice of a file handed to a parser, with its byte offset in the file
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub text: &'a str,
    pub offset: usize,
}

impl<'a> Section<'a> {
    pub fn whole(text: &'a str) -> Self {
        Self { text, offset: 0 }
    }
}

/// Candidates and non-fatal warnings produced for one file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub candidates: Vec<Candidate>,
    pub warnings: Vec<String>,
}

impl ParseOutcome {
    pub fn extend(&mut self, other: ParseOutcome) {
        self.candidates.extend(other.candidates);
        self.warnings.extend(other.warnings);
    }
}
