use crate::types::TokenType;
use weave_common::{Result, WeaveError};

/// Named colors understood by the normalizer
const NAMED_COLORS: &[(&str, &str)] = &[
    ("white", "#ffffff"),
    ("black", "#000000"),
    ("transparent", "#00000000"),
];

/// Root font size used to convert rem/em lengths to px
const ROOT_FONT_PX: f64 = 16.0;

/// An RGB(A) color with 8-bit channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// `#aabbcc` -> `#abc` when every channel repeats its digit
    pub fn to_short_hex(&self) -> Option<String> {
        let pairs = |v: u8| v >> 4 == v & 0x0f;
        if self.a != 255 || !(pairs(self.r) && pairs(self.g) && pairs(self.b)) {
            return None;
        }
        Some(format!(
            "#{:x}{:x}{:x}",
            self.r & 0x0f,
            self.g & 0x0f,
            self.b & 0x0f
        ))
    }

    pub fn to_rgb(&self, compact: bool) -> String {
        let sep = if compact { "," } else { ", " };
        if self.a == 255 {
            format!("rgb({}{sep}{}{sep}{})", self.r, self.g, self.b)
        } else {
            let alpha = (self.a as f64 / 255.0 * 100.0).round() / 100.0;
            format!("rgba({}{sep}{}{sep}{}{sep}{})", self.r, self.g, self.b, alpha)
        }
    }

    pub fn named(&self) -> Option<&'static str> {
        let hex = self.to_hex();
        NAMED_COLORS
            .iter()
            .find(|(_, value)| *value == hex)
            .map(|(name, _)| *name)
    }

    /// Euclidean distance in RGB space, alpha ignored
    pub fn distance(&self, other: &Rgba) -> f64 {
        let dr = self.r as f64 - other.r as f64;
        let dg = self.g as f64 - other.g as f64;
        let db = self.b as f64 - other.b as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

/// Convert design-tool RGBA components in the 0-1 range to hex
pub fn rgba_unit_to_hex(r: f64, g: f64, b: f64, a: f64) -> String {
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba {
        r: channel(r),
        g: channel(g),
        b: channel(b),
        a: channel(a),
    }
    .to_hex()
}

/// Parse a color literal: hex (3, 4, 6, 8 digits), `rgb()`/`rgba()`, or a known name
pub fn parse_color(raw: &str) -> Option<Rgba> {
    let value = raw.trim().to_lowercase();

    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == value) {
        return parse_hex(hex);
    }
    if value.starts_with('#') {
        return parse_hex(&value);
    }
    if value.starts_with("rgb") {
        return parse_rgb_function(&value);
    }
    None
}

fn parse_hex(value: &str) -> Option<Rgba> {
    let digits = value.strip_prefix('#')?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let expanded: String = match digits.len() {
        3 | 4 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => digits.to_string(),
        _ => return None,
    };

    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some(Rgba {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
        a: if expanded.len() == 8 { channel(6)? } else { 255 },
    })
}

fn parse_rgb_function(value: &str) -> Option<Rgba> {
    let open = value.find('(')?;
    let close = value.rfind(')')?;
    if close <= open {
        return None;
    }

    let parts: Vec<&str> = value[open + 1..close]
        .split(|c| c == ',' || c == '/' || c == ' ')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |p: &str| -> Option<u8> {
        if let Some(pct) = p.strip_suffix('%') {
            let v: f64 = pct.parse().ok()?;
            Some((v.clamp(0.0, 100.0) / 100.0 * 255.0).round() as u8)
        } else {
            let v: f64 = p.parse().ok()?;
            Some(v.clamp(0.0, 255.0).round() as u8)
        }
    };
    let alpha = |p: &str| -> Option<u8> {
        let v: f64 = match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f64>().ok()? / 100.0,
            None => p.parse().ok()?,
        };
        Some((v.clamp(0.0, 1.0) * 255.0).round() as u8)
    };

    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: match parts.get(3) {
            Some(a) => alpha(a)?,
            None => 255,
        },
    })
}

/// Canonical color form: lowercase long hex. Unparseable input is returned trimmed.
pub fn normalize_color(raw: &str) -> String {
    match parse_color(raw) {
        Some(rgba) => rgba.to_hex(),
        None => collapse_whitespace(raw),
    }
}

/// Parse a single length to px. `rem`/`em` use a 16px root; unitless counts as px.
pub fn parse_px(raw: &str) -> Option<f64> {
    let value = raw.trim().to_lowercase();
    let first = value.split_whitespace().next()?;

    let (number, factor) = if let Some(n) = first.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = first.strip_suffix("rem") {
        (n, ROOT_FONT_PX)
    } else if let Some(n) = first.strip_suffix("em") {
        (n, ROOT_FONT_PX)
    } else {
        (first, 1.0)
    };

    number.parse::<f64>().ok().map(|n| n * factor)
}

fn is_bare_number(value: &str) -> bool {
    !value.is_empty() && value.parse::<f64>().is_ok()
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        let s = format!("{:.4}", n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Canonical length form: whitespace collapsed, units lowercased, unitless numbers read as px
pub fn normalize_length(raw: &str) -> String {
    collapse_whitespace(raw)
        .split(' ')
        .map(|part| {
            let lower = part.to_lowercase();
            if is_bare_number(&lower) {
                let n: f64 = lower.parse().unwrap_or_default();
                return format!("{}px", format_number(n));
            }
            // `.5rem` -> `0.5rem`
            if lower.starts_with('.') {
                return format!("0{}", lower);
            }
            lower
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonicalize a raw value for the given token type
pub fn normalize(token_type: TokenType, raw: &str) -> String {
    match token_type {
        TokenType::Color => normalize_color(raw),
        TokenType::Spacing | TokenType::BorderRadius => normalize_length(raw),
        TokenType::Opacity => {
            let value = raw.trim();
            if let Some(pct) = value.strip_suffix('%') {
                if let Ok(n) = pct.trim().parse::<f64>() {
                    return format_number(n / 100.0);
                }
            }
            match value.parse::<f64>() {
                Ok(n) => format_number(n),
                Err(_) => collapse_whitespace(value),
            }
        }
        TokenType::Typography => {
            let value = collapse_whitespace(raw);
            if parse_px(&value).is_some() && !value.contains(',') {
                normalize_length(&value)
            } else {
                value
            }
        }
        TokenType::Shadow => collapse_whitespace(raw)
            .split(' ')
            .map(|part| {
                if part.starts_with('#') {
                    normalize_color(part)
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Guess the token type of a bare literal, used when no type is supplied
pub fn infer_type(raw: &str) -> Option<TokenType> {
    if parse_color(raw).is_some() {
        Some(TokenType::Color)
    } else if raw.split_whitespace().all(|p| parse_px(p).is_some()) && !raw.trim().is_empty() {
        Some(TokenType::Spacing)
    } else {
        None
    }
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !value.is_empty() && !out.contains(&value) {
        out.push(value);
    }
}

/// Every textual spelling of a value that should compare equal to it.
/// Deterministic: the same input always yields the same ordered list.
pub fn variations(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let trimmed = raw.trim();
    push_unique(&mut out, trimmed.to_string());
    push_unique(&mut out, collapse_whitespace(trimmed));

    if let Some(rgba) = parse_color(trimmed) {
        let long = rgba.to_hex();
        push_unique(&mut out, long.clone());
        push_unique(&mut out, long.to_uppercase());
        if let Some(short) = rgba.to_short_hex() {
            push_unique(&mut out, short.clone());
            push_unique(&mut out, short.to_uppercase());
        }
        push_unique(&mut out, rgba.to_rgb(false));
        push_unique(&mut out, rgba.to_rgb(true));
        if let Some(name) = rgba.named() {
            push_unique(&mut out, name.to_string());
        }
        return out;
    }

    let collapsed = collapse_whitespace(trimmed);
    if !collapsed.contains(' ') {
        let lower = collapsed.to_lowercase();
        push_unique(&mut out, lower.clone());
        if let Some(number) = lower.strip_suffix("px") {
            if is_bare_number(number) {
                // unitless form for JS style objects
                push_unique(&mut out, number.to_string());
            }
        } else if is_bare_number(&lower) {
            push_unique(&mut out, format!("{}px", lower));
        }
    }
    out
}

/// Pairs each spelling of `old` with the same spelling of `new`, longest old
/// spelling first. Used to rewrite a line while keeping its notation.
pub fn variant_pairs(token_type: TokenType, old: &str, new: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut push = |from: String, to: String| {
        if !from.is_empty() && !pairs.iter().any(|(f, _)| *f == from) {
            pairs.push((from, to));
        }
    };

    push(old.trim().to_string(), new.trim().to_string());

    match (token_type, parse_color(old), parse_color(new)) {
        (TokenType::Color, Some(old_c), new_c) => {
            let fallback = new.trim().to_string();
            let new_long = new_c.map(|c| c.to_hex()).unwrap_or_else(|| fallback.clone());
            let new_short = new_c.and_then(|c| c.to_short_hex()).unwrap_or_else(|| new_long.clone());

            push(old_c.to_hex(), new_long.clone());
            push(old_c.to_hex().to_uppercase(), new_long.to_uppercase());
            if let Some(short) = old_c.to_short_hex() {
                push(short.clone(), new_short.clone());
                push(short.to_uppercase(), new_short.to_uppercase());
            }
            let (new_rgb, new_rgb_compact) = match new_c {
                Some(c) => (c.to_rgb(false), c.to_rgb(true)),
                None => (fallback.clone(), fallback.clone()),
            };
            push(old_c.to_rgb(false), new_rgb);
            push(old_c.to_rgb(true), new_rgb_compact);
            if let Some(name) = old_c.named() {
                let new_name = new_c
                    .and_then(|c| c.named().map(str::to_string))
                    .unwrap_or(new_long);
                push(name.to_string(), new_name);
            }
        }
        _ => {
            let old_norm = collapse_whitespace(old).to_lowercase();
            let new_norm = collapse_whitespace(new);
            push(old_norm.clone(), new_norm.clone());
            if let (Some(old_n), Some(new_n)) =
                (old_norm.strip_suffix("px"), new_norm.strip_suffix("px"))
            {
                if is_bare_number(old_n) && is_bare_number(new_n) {
                    push(old_n.to_string(), new_n.to_string());
                }
            }
        }
    }

    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    pairs
}

/// Reject values the token type cannot carry
pub fn validate(token_type: TokenType, raw: &str) -> Result<()> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(WeaveError::invalid_value(raw, "value is empty"));
    }
    // references to other tokens are always accepted
    if value.starts_with("var(") || value.starts_with('{') || value.starts_with('$') {
        return Ok(());
    }

    match token_type {
        TokenType::Color => {
            if parse_color(value).is_none() {
                return Err(WeaveError::invalid_value(
                    raw,
                    "expected a hex, rgb()/rgba() or named color",
                ));
            }
        }
        TokenType::Spacing | TokenType::BorderRadius => {
            let ok = value.split_whitespace().all(|part| {
                parse_px(part).is_some()
                    || matches!(part, "auto" | "inherit" | "initial")
                    || part.ends_with('%')
                    || part.starts_with("calc(")
            });
            if !ok {
                return Err(WeaveError::invalid_value(raw, "expected a length such as 16px"));
            }
        }
        TokenType::Opacity => {
            let n = match value.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().ok().map(|n| n / 100.0),
                None => value.parse::<f64>().ok(),
            };
            if !matches!(n, Some(n) if (0.0..=1.0).contains(&n)) {
                return Err(WeaveError::invalid_value(raw, "expected a number between 0 and 1"));
            }
        }
        TokenType::Typography | TokenType::Shadow => {}
    }
    Ok(())
}
