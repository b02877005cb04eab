use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};
use weave_common::{Result, WeaveError};
use weave_core::normalizer::{infer_type, normalize, parse_color, rgba_unit_to_hex};
use weave_core::{Token, TokenType};

/// Color channel set from the design tool, components in 0-1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitRgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "opaque")]
    pub a: f64,
}

fn opaque() -> f64 {
    1.0
}

impl UnitRgba {
    pub fn to_hex(&self) -> String {
        rgba_unit_to_hex(self.r, self.g, self.b, self.a)
    }
}

/// A node of a design payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub css: Option<String>,
    /// category -> token name -> value
    #[serde(default)]
    pub design_tokens: Option<BTreeMap<String, BTreeMap<String, Value>>>,
    #[serde(default)]
    pub fills: Option<Vec<UnitRgba>>,
    #[serde(default)]
    pub children: Option<Vec<DesignNode>>,
}

/// Where design payloads come from
#[async_trait]
pub trait DesignSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<DesignNode>>;

    fn describe(&self) -> String;
}

/// Nodes held in memory
pub struct StaticSource {
    nodes: Vec<DesignNode>,
}

impl StaticSource {
    pub fn new(nodes: Vec<DesignNode>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl DesignSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<DesignNode>> {
        Ok(self.nodes.clone())
    }

    fn describe(&self) -> String {
        format!("{} in-memory node(s)", self.nodes.len())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Nodes(Vec<DesignNode>),
    Wrapped { nodes: Vec<DesignNode> },
    Single(Box<DesignNode>),
}

/// Payload exported to a JSON file: a node, a node array, or `{ "nodes": [...] }`
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DesignSource for JsonFileSource {
    async fn fetch(&self) -> Result<Vec<DesignNode>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| WeaveError::IoUnreadable {
                path: self.path.clone(),
                source,
            })?;
        let payload: Payload = serde_json::from_str(&text)?;
        Ok(match payload {
            Payload::Nodes(nodes) | Payload::Wrapped { nodes } => nodes,
            Payload::Single(node) => vec![*node],
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Options of extract_design_tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub include_variables: bool,
    pub include_styles: bool,
    /// Deepest node level visited; roots are level 0
    pub scan_depth: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_variables: true,
            include_styles: true,
            scan_depth: 10,
        }
    }
}

/// Tokens pulled out of a payload, in discovery order
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub tokens: Vec<Token>,
    pub nodes_visited: usize,
    pub skipped: Vec<String>,
}

/// Lowercase, non-alphanumerics collapsed to single dashes
pub fn slug(name: &str) -> String {
    let mut out = String::new();
    let mut dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if dash && !out.is_empty() {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else {
            dash = true;
        }
    }
    out
}

/// Walk the payload and turn variables and styles into tokens
pub fn extract(nodes: &[DesignNode], options: ExtractOptions) -> Extraction {
    let mut extraction = Extraction::default();
    let mut stack: Vec<(&DesignNode, usize)> = nodes.iter().rev().map(|n| (n, 0)).collect();

    while let Some((node, depth)) = stack.pop() {
        extraction.nodes_visited += 1;
        if options.include_variables {
            extract_variables(node, &mut extraction);
        }
        if options.include_styles {
            extract_styles(node, &mut extraction);
        }
        if depth < options.scan_depth {
            if let Some(children) = &node.children {
                stack.extend(children.iter().rev().map(|c| (c, depth + 1)));
            }
        }
    }

    debug!(
        "Extracted {} tokens from {} nodes",
        extraction.tokens.len(),
        extraction.nodes_visited
    );
    extraction
}

fn push_token(extraction: &mut Extraction, token: Token) {
    // a later node may carry the same id; the first one found wins within a payload
    if extraction.tokens.iter().any(|t| t.id == token.id) {
        debug!("Duplicate token id {} in payload", token.id);
        return;
    }
    extraction.tokens.push(token);
}

fn bundle_value(value: &Value, token_type: Option<TokenType>) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            let number = n.to_string();
            match token_type {
                Some(TokenType::Spacing) | Some(TokenType::BorderRadius) => {
                    Some(format!("{}px", number))
                }
                _ => Some(number),
            }
        }
        Value::Object(map) if map.contains_key("r") && map.contains_key("g") => {
            serde_json::from_value::<UnitRgba>(value.clone())
                .ok()
                .map(|c| c.to_hex())
        }
        Value::Object(map) => map.get("value").and_then(|v| bundle_value(v, token_type)),
        _ => None,
    }
}

fn extract_variables(node: &DesignNode, extraction: &mut Extraction) {
    let Some(bundle) = &node.design_tokens else {
        return;
    };

    for (category, entries) in bundle {
        let category_type = TokenType::from_category(category);
        for (name, raw) in entries {
            let Some(value) = bundle_value(raw, category_type) else {
                extraction
                    .skipped
                    .push(format!("{}.{}: unsupported value", category, name));
                continue;
            };
            let Some(token_type) = category_type.or_else(|| infer_type(&value)) else {
                extraction
                    .skipped
                    .push(format!("{}.{}: unknown token type", category, name));
                continue;
            };

            let id = format!("{}-{}", slug(category), slug(name));
            let token = Token::new(id, name.clone(), token_type, normalize(token_type, &value))
                .with_category(category.clone())
                .with_source_node(node.id.clone());
            push_token(extraction, token);
        }
    }
}

/// Property -> (type, whether the property names the token on its own)
fn style_property(property: &str) -> Option<(TokenType, bool)> {
    let found = match property {
        "color" | "fill" => (TokenType::Color, true),
        "background" | "background-color" | "border-color" | "stroke" => (TokenType::Color, false),
        "padding" | "gap" => (TokenType::Spacing, true),
        "margin" | "row-gap" | "column-gap" | "padding-top" | "padding-right"
        | "padding-bottom" | "padding-left" | "margin-top" | "margin-right"
        | "margin-bottom" | "margin-left" => (TokenType::Spacing, false),
        "border-radius" => (TokenType::BorderRadius, true),
        "box-shadow" => (TokenType::Shadow, true),
        "font-size" => (TokenType::Typography, true),
        "font-family" | "font-weight" | "line-height" | "letter-spacing" => {
            (TokenType::Typography, false)
        }
        "opacity" => (TokenType::Opacity, true),
        _ => return None,
    };
    Some(found)
}

fn extract_styles(node: &DesignNode, extraction: &mut Extraction) {
    let base = slug(&node.name);
    if base.is_empty() {
        return;
    }

    if let Some(css) = &node.css {
        for declaration in css.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim().to_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            let Some((token_type, primary)) = style_property(&property) else {
                continue;
            };
            if value.is_empty() || value.starts_with("var(") {
                continue;
            }
            if token_type == TokenType::Color && parse_color(value).is_none() {
                warn!("Skipping {} on {}: not a color: {}", property, node.name, value);
                extraction
                    .skipped
                    .push(format!("{}: {} is not a color", node.name, property));
                continue;
            }

            let id = if primary {
                format!("{}-{}", token_type.as_str(), base)
            } else {
                format!("{}-{}-{}", token_type.as_str(), base, slug(&property))
            };
            let token = Token::new(id, node.name.clone(), token_type, normalize(token_type, value))
                .with_source_node(node.id.clone());
            push_token(extraction, token);
        }
    }

    if let Some(fill) = node.fills.as_ref().and_then(|f| f.first()) {
        let token = Token::new(
            format!("color-{}", base),
            node.name.clone(),
            TokenType::Color,
            fill.to_hex(),
        )
        .with_source_node(node.id.clone());
        push_token(extraction, token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Vec<DesignNode> {
        serde_json::from_value(json!([
            {
                "id": "1:1",
                "name": "Tokens",
                "type": "FRAME",
                "designTokens": {
                    "color": { "primary": "#3366FF", "white": { "r": 1, "g": 1, "b": 1 } },
                    "spacing": { "md": 16, "Large Gap": "24px" }
                },
                "children": [
                    {
                        "id": "1:2",
                        "name": "Primary Button",
                        "type": "COMPONENT",
                        "css": "color: #FFF; background-color: rgb(51, 102, 255); padding: 8px 16px; border-radius: 4px;",
                        "children": [
                            { "id": "1:3", "name": "Badge", "type": "RECTANGLE", "fills": [{ "r": 1, "g": 0, "b": 0, "a": 0.5 }] }
                        ]
                    }
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_variables_become_tokens() {
        let extraction = extract(
            &payload(),
            ExtractOptions {
                include_styles: false,
                ..Default::default()
            },
        );
        let ids: Vec<_> = extraction.tokens.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["color-primary", "color-white", "spacing-large-gap", "spacing-md"]
        );
        assert_eq!(extraction.tokens[0].value, "#3366ff");
        assert_eq!(extraction.tokens[1].value, "#ffffff");
        assert_eq!(extraction.tokens[3].value, "16px");
        assert_eq!(extraction.tokens[0].source_node_id.as_deref(), Some("1:1"));
    }

    #[test]
    fn test_styles_and_fills() {
        let extraction = extract(
            &payload(),
            ExtractOptions {
                include_variables: false,
                ..Default::default()
            },
        );
        let find = |id: &str| extraction.tokens.iter().find(|t| t.id == id).unwrap();
        assert_eq!(find("color-primary-button").value, "#ffffff");
        assert_eq!(
            find("color-primary-button-background-color").value,
            "#3366ff"
        );
        assert_eq!(find("spacing-primary-button").value, "8px 16px");
        assert_eq!(find("border-radius-primary-button").value, "4px");
        assert_eq!(find("color-badge").value, "#ff000080");
    }

    #[test]
    fn test_scan_depth_limits_walk() {
        let extraction = extract(
            &payload(),
            ExtractOptions {
                scan_depth: 0,
                ..Default::default()
            },
        );
        assert_eq!(extraction.nodes_visited, 1);
    }

    #[tokio::test]
    async fn test_json_file_source_accepts_wrapped_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(
            &path,
            r#"{ "nodes": [ { "id": "1", "name": "Root", "type": "FRAME" } ] }"#,
        )
        .unwrap();
        let nodes = JsonFileSource::new(&path).fetch().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "Root");
    }
}
