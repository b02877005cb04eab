use serde::{Deserialize, Serialize};
use std::fmt;
use weave_core::normalizer::{normalize, parse_color, parse_px};
use weave_core::{Token, TokenRegistry, TokenType};

/// Euclidean RGB distance past which a color change reads as a different brand color
const BRANDING_DISTANCE: f64 = 200.0;
const LAYOUT_RATIO_MAX: f64 = 5.0;
const LAYOUT_RATIO_MIN: f64 = 0.2;
const PERFORMANCE_PX: f64 = 1000.0;
const RADIUS_DISTORTION_PX: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    Accessibility,
    Branding,
    Layout,
    Performance,
    VisualDistortion,
    Consistency,
}

/// A predicted semantic problem with a value change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub affected_areas: Vec<String>,
}

/// Closed rule set, evaluated in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    ColorInversion,
    ColorDistance,
    SpacingRatio,
    SpacingSize,
    RadiusSize,
    SharedValue,
}

impl Rule {
    const ALL: [Rule; 6] = [
        Rule::ColorInversion,
        Rule::ColorDistance,
        Rule::SpacingRatio,
        Rule::SpacingSize,
        Rule::RadiusSize,
        Rule::SharedValue,
    ];

    fn evaluate(&self, change: &Change<'_>, registry: &TokenRegistry) -> Option<Conflict> {
        match self {
            Rule::ColorInversion => color_inversion(change),
            Rule::ColorDistance => color_distance(change),
            Rule::SpacingRatio => spacing_ratio(change),
            Rule::SpacingSize => spacing_size(change),
            Rule::RadiusSize => radius_size(change),
            Rule::SharedValue => shared_value(change, registry),
        }
    }
}

struct Change<'a> {
    token: &'a Token,
    new_value: &'a str,
    reason: Option<&'a str>,
}

impl Change<'_> {
    fn is_rebrand(&self) -> bool {
        self.reason
            .map(|r| r.to_lowercase().contains("brand"))
            .unwrap_or(false)
    }
}

/// Predicts conflicts from a proposed value change. Reads only the registry.
pub struct ConflictAnalyzer<'a> {
    registry: &'a TokenRegistry,
}

impl<'a> ConflictAnalyzer<'a> {
    pub fn new(registry: &'a TokenRegistry) -> Self {
        Self { registry }
    }

    /// Conflicts of severity medium and above
    pub fn analyze(&self, token: &Token, new_value: &str, reason: Option<&str>) -> Vec<Conflict> {
        let change = Change {
            token,
            new_value,
            reason,
        };
        Rule::ALL
            .iter()
            .filter_map(|rule| rule.evaluate(&change, self.registry))
            .filter(|c| c.severity >= Severity::Medium)
            .collect()
    }
}

fn color_inversion(change: &Change<'_>) -> Option<Conflict> {
    if change.token.token_type != TokenType::Color {
        return None;
    }
    let old = normalize(TokenType::Color, &change.token.value);
    let new = normalize(TokenType::Color, change.new_value);
    let inverted = matches!(
        (old.as_str(), new.as_str()),
        ("#ffffff", "#000000") | ("#000000", "#ffffff")
    );
    if !inverted {
        return None;
    }

    Some(Conflict {
        conflict_type: ConflictType::Accessibility,
        severity: Severity::Critical,
        description: format!(
            "{} inverts between white and black ({} -> {}); text and backgrounds built on it lose contrast",
            change.token.id, change.token.value, change.new_value
        ),
        recommendation: "Audit every foreground/background pairing that uses this token and check contrast ratios before applying".to_string(),
        affected_areas: vec![
            "text contrast".to_string(),
            "backgrounds".to_string(),
            "borders".to_string(),
        ],
    })
}

fn color_distance(change: &Change<'_>) -> Option<Conflict> {
    if change.token.token_type != TokenType::Color {
        return None;
    }
    let old = parse_color(&change.token.value)?;
    let new = parse_color(change.new_value)?;
    let distance = old.distance(&new);
    if distance <= BRANDING_DISTANCE {
        return None;
    }

    let severity = if change.is_rebrand() {
        Severity::Medium
    } else {
        Severity::High
    };
    Some(Conflict {
        conflict_type: ConflictType::Branding,
        severity,
        description: format!(
            "{} moves {:.0} units in RGB space; the new color will not read as the same brand color",
            change.token.id, distance
        ),
        recommendation: "Confirm the change with the design owners and review screens that pair this color with others".to_string(),
        affected_areas: vec!["brand identity".to_string(), "visual hierarchy".to_string()],
    })
}

fn spacing_ratio(change: &Change<'_>) -> Option<Conflict> {
    if change.token.token_type != TokenType::Spacing {
        return None;
    }
    let old = parse_px(&change.token.value)?;
    let new = parse_px(change.new_value)?;
    if old <= 0.0 {
        return None;
    }
    let ratio = new / old;
    if ratio <= LAYOUT_RATIO_MAX && ratio >= LAYOUT_RATIO_MIN {
        return None;
    }

    Some(Conflict {
        conflict_type: ConflictType::Layout,
        severity: Severity::High,
        description: format!(
            "{} scales by {:.2}x ({} -> {}); layouts sized around it are likely to break",
            change.token.id, ratio, change.token.value, change.new_value
        ),
        recommendation: "Roll the change out gradually and check responsive breakpoints".to_string(),
        affected_areas: vec![
            "layout".to_string(),
            "responsive breakpoints".to_string(),
            "component density".to_string(),
        ],
    })
}

fn spacing_size(change: &Change<'_>) -> Option<Conflict> {
    if change.token.token_type != TokenType::Spacing {
        return None;
    }
    let new = parse_px(change.new_value)?;
    if new <= PERFORMANCE_PX {
        return None;
    }

    Some(Conflict {
        conflict_type: ConflictType::Performance,
        severity: Severity::Medium,
        description: format!(
            "{} becomes {}px; very large spacing forces oversized layout and scroll areas",
            change.token.id, new
        ),
        recommendation: "Check whether a layout token is a better fit than a spacing token".to_string(),
        affected_areas: vec!["rendering".to_string(), "scroll performance".to_string()],
    })
}

fn radius_size(change: &Change<'_>) -> Option<Conflict> {
    if change.token.token_type != TokenType::BorderRadius {
        return None;
    }
    let new = parse_px(change.new_value)?;
    if new <= RADIUS_DISTORTION_PX {
        return None;
    }

    Some(Conflict {
        conflict_type: ConflictType::VisualDistortion,
        severity: Severity::Medium,
        description: format!(
            "{} becomes {}px; small components turn into pills or circles",
            change.token.id, new
        ),
        recommendation: "Review small components such as buttons, badges and inputs".to_string(),
        affected_areas: vec!["component shape".to_string()],
    })
}

fn shared_value(change: &Change<'_>, registry: &TokenRegistry) -> Option<Conflict> {
    let token = change.token;
    let current = normalize(token.token_type, &token.value);
    let siblings: Vec<String> = registry
        .of_type(token.token_type)
        .filter(|t| t.id != token.id && normalize(t.token_type, &t.value) == current)
        .map(|t| t.id.clone())
        .collect();
    if siblings.is_empty() {
        return None;
    }

    Some(Conflict {
        conflict_type: ConflictType::Consistency,
        severity: Severity::Medium,
        description: format!(
            "{} shares its value {} with {}; changing only this token splits them",
            token.id,
            token.value,
            siblings.join(", ")
        ),
        recommendation: "Update the tokens sharing this value together in one bulk change".to_string(),
        affected_areas: siblings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TokenRegistry {
        TokenRegistry::from_tokens([
            Token::new("color-white", "white", TokenType::Color, "#ffffff"),
            Token::new("color-primary", "primary", TokenType::Color, "#3366ff"),
            Token::new("spacing-xl", "xl", TokenType::Spacing, "10px"),
            Token::new("spacing-md", "md", TokenType::Spacing, "16px"),
            Token::new("spacing-gutter", "gutter", TokenType::Spacing, "16px"),
            Token::new("radius-sm", "sm", TokenType::BorderRadius, "4px"),
        ])
    }

    fn analyze(id: &str, new_value: &str) -> Vec<Conflict> {
        let registry = registry();
        let token = registry.get(id).unwrap().clone();
        ConflictAnalyzer::new(&registry).analyze(&token, new_value, None)
    }

    #[test]
    fn test_white_black_inversion_is_one_critical_conflict() {
        let conflicts = analyze("color-white", "#000");
        let critical: Vec<_> = conflicts
            .iter()
            .filter(|c| c.severity == Severity::Critical)
            .collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].conflict_type, ConflictType::Accessibility);
        assert!(conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::Branding && c.severity == Severity::High));
    }

    #[test]
    fn test_spacing_ratio_is_a_layout_conflict() {
        let conflicts = analyze("spacing-xl", "80px");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Layout);
        assert_eq!(conflicts[0].severity, Severity::High);

        assert!(analyze("spacing-xl", "12px").is_empty());
        assert_eq!(analyze("spacing-xl", "1px")[0].conflict_type, ConflictType::Layout);
    }

    #[test]
    fn test_large_spacing_and_radius() {
        let conflicts = analyze("spacing-xl", "1200px");
        assert!(conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::Performance && c.severity == Severity::Medium));

        let conflicts = analyze("radius-sm", "64px");
        assert_eq!(conflicts[0].conflict_type, ConflictType::VisualDistortion);
    }

    #[test]
    fn test_shared_value_is_a_consistency_conflict() {
        let conflicts = analyze("spacing-md", "20px");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Consistency);
        assert_eq!(conflicts[0].affected_areas, vec!["spacing-gutter".to_string()]);
    }

    #[test]
    fn test_rebrand_reason_softens_branding_conflict() {
        let registry = registry();
        let token = registry.get("color-primary").unwrap().clone();
        let conflicts =
            ConflictAnalyzer::new(&registry).analyze(&token, "#ff3300", Some("Q3 rebrand"));
        assert_eq!(conflicts[0].conflict_type, ConflictType::Branding);
        assert_eq!(conflicts[0].severity, Severity::Medium);
    }
}
