use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of design value a token carries. Decides which normalizer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    Color,
    Spacing,
    Typography,
    Shadow,
    BorderRadius,
    Opacity,
}

impl TokenType {
    pub const ALL: [TokenType; 6] = [
        TokenType::Color,
        TokenType::Spacing,
        TokenType::Typography,
        TokenType::Shadow,
        TokenType::BorderRadius,
        TokenType::Opacity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Color => "color",
            TokenType::Spacing => "spacing",
            TokenType::Typography => "typography",
            TokenType::Shadow => "shadow",
            TokenType::BorderRadius => "border-radius",
            TokenType::Opacity => "opacity",
        }
    }

    /// Default category a freshly extracted token of this type is filed under
    pub fn default_category(&self) -> &'static str {
        match self {
            TokenType::Color => "colors",
            TokenType::Spacing => "spacing",
            TokenType::Typography => "typography",
            TokenType::Shadow => "shadows",
            TokenType::BorderRadius => "radii",
            TokenType::Opacity => "opacity",
        }
    }

    /// Map a design-bundle category name ("colors", "radius", "fontSizes", ...) to a type
    pub fn from_category(category: &str) -> Option<Self> {
        let lower = category.to_lowercase().replace(['_', ' '], "-");
        match lower.as_str() {
            "color" | "colors" | "palette" => Some(TokenType::Color),
            "spacing" | "space" | "spacings" | "sizes" | "size" => Some(TokenType::Spacing),
            "typography" | "font" | "fonts" | "fontsizes" | "font-sizes" | "text" => {
                Some(TokenType::Typography)
            }
            "shadow" | "shadows" | "elevation" | "effects" => Some(TokenType::Shadow),
            "radius" | "radii" | "border-radius" | "borderradius" | "corner-radius" => {
                Some(TokenType::BorderRadius)
            }
            "opacity" | "opacities" => Some(TokenType::Opacity),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed design value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub value: String,
    pub category: String,
    pub source_node_id: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub version: u64,
}

impl Token {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        token_type: TokenType,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            token_type,
            value: value.into(),
            category: token_type.default_category().to_string(),
            source_node_id: None,
            last_modified: Utc::now(),
            version: 1,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_source_node(mut self, node_id: impl Into<String>) -> Self {
        self.source_node_id = Some(node_id.into());
        self
    }
}

/// How a usage references its token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageType {
    /// By name: CSS variable, utility class, accessor, preprocessor variable
    Direct,
    /// By value: a hardcoded literal equal to the token value
    Computed,
    /// By name, from inside a styled-template block of a component
    Inherited,
}

/// Dialect context a usage was observed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageContext {
    CssVariable,
    UtilityClass,
    JsAccessor,
    StyledTemplate,
    PreprocessorVariable,
    CssValue,
}

impl UsageContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageContext::CssVariable => "css-variable",
            UsageContext::UtilityClass => "utility-class",
            UsageContext::JsAccessor => "js-accessor",
            UsageContext::StyledTemplate => "styled-template",
            UsageContext::PreprocessorVariable => "preprocessor-variable",
            UsageContext::CssValue => "css-value",
        }
    }
}

impl fmt::Display for UsageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located reference to a token in source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub token_id: String,
    pub file_path: PathBuf,
    pub component: String,
    /// 1-based
    pub line: Option<usize>,
    pub context: UsageContext,
    pub usage_type: UsageType,
    /// Code pattern the usage was recognized from
    pub pattern: String,
    pub confidence: f64,
    pub last_seen: DateTime<Utc>,
}

/// Uniqueness key of a usage: (token id, file, line, context)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsageKey {
    pub token_id: String,
    pub file_path: PathBuf,
    pub line: Option<usize>,
    pub context: UsageContext,
}

impl TokenUsage {
    pub fn key(&self) -> UsageKey {
        UsageKey {
            token_id: self.token_id.clone(),
            file_path: self.file_path.clone(),
            line: self.line,
            context: self.context,
        }
    }

    /// Potential usages carry a synthetic id and never resolve in the registry
    pub fn is_potential(&self) -> bool {
        self.token_id.starts_with(UNMAPPED_PREFIX)
    }
}

pub const UNMAPPED_PREFIX: &str = "unmapped_";

/// Synthetic id for a design-tokenish pattern no registered token matched
pub fn unmapped_id(context: UsageContext, pattern: &str) -> String {
    format!("{}{}_{}", UNMAPPED_PREFIX, context.as_str(), pattern)
}

/// Component name derived from a file name: `Button.tsx` -> `Button`,
/// `card/index.vue` -> `card`
pub fn component_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    // `Button.module.css` -> `Button`
    let stem = stem.split('.').next().unwrap_or(stem);

    if stem == "index" {
        if let Some(parent) = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
        {
            return parent.to_string();
        }
    }

    stem.to_string()
}

/// Source languages the scanner accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceLanguage {
    TypeScript,
    TSX,
    JavaScript,
    JSX,
    CSS,
    SCSS,
    Sass,
    Vue,
}

impl SourceLanguage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::TSX),
            "js" => Some(SourceLanguage::JavaScript),
            "jsx" => Some(SourceLanguage::JSX),
            "css" => Some(SourceLanguage::CSS),
            "scss" => Some(SourceLanguage::SCSS),
            "sass" => Some(SourceLanguage::Sass),
            "vue" => Some(SourceLanguage::Vue),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_stylesheet(&self) -> bool {
        matches!(
            self,
            SourceLanguage::CSS | SourceLanguage::SCSS | SourceLanguage::Sass
        )
    }

    pub fn is_preprocessor(&self) -> bool {
        matches!(self, SourceLanguage::SCSS | SourceLanguage::Sass)
    }

    pub fn is_script(&self) -> bool {
        matches!(
            self,
            SourceLanguage::TypeScript
                | SourceLanguage::TSX
                | SourceLanguage::JavaScript
                | SourceLanguage::JSX
        )
    }
}

/// A file read by the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute path
    pub path: PathBuf,
    pub relative_path: String,
    pub language: SourceLanguage,
    pub size: u64,
    pub content: String,
}

/// A file the scanner could not read. The walk continues past it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub kind: weave_common::ErrorKind,
    pub message: String,
}

/// Completion summary of a scan pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub bytes_read: u64,
    pub parser_errors: usize,
    pub skipped: usize,
    pub duration_ms: u128,
}

/// Report generated after scanning
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub files: Vec<SourceFile>,
    pub issues: Vec<ScanIssue>,
    pub summary: ScanSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_from_path() {
        assert_eq!(component_from_path(Path::new("/src/Button.tsx")), "Button");
        assert_eq!(
            component_from_path(Path::new("/src/card/index.vue")),
            "card"
        );
        assert_eq!(
            component_from_path(Path::new("/src/Nav.module.css")),
            "Nav"
        );
    }

    #[test]
    fn test_unmapped_id_shape() {
        let id = unmapped_id(UsageContext::UtilityClass, "bg-red-500");
        assert_eq!(id, "unmapped_utility-class_bg-red-500");
    }

    #[test]
    fn test_token_type_from_category() {
        assert_eq!(TokenType::from_category("Colors"), Some(TokenType::Color));
        assert_eq!(TokenType::from_category("radii"), Some(TokenType::BorderRadius));
        assert_eq!(TokenType::from_category("font_sizes"), Some(TokenType::Typography));
        assert_eq!(TokenType::from_category("motion"), None);
    }
}
