use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*<(template|script|style)(\s[^>]*)?>"#).expect("vue section pattern")
});

static LANG_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\blang\s*=\s*["']([\w-]+)["']"#).expect("vue lang pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VueSectionKind {
    Template,
    Script,
    Style,
}

/// One top-level block of a single-file component
#[derive(Debug, Clone, PartialEq)]
pub struct VueSection<'a> {
    pub kind: VueSectionKind,
    pub lang: Option<String>,
    pub text: &'a str,
    /// Byte offset of `text` in the file
    pub offset: usize,
}

impl VueSection<'_> {
    pub fn is_preprocessor(&self) -> bool {
        matches!(self.lang.as_deref(), Some("scss") | Some("sass"))
    }
}

/// Split a `.vue` file into template/script/style sections.
/// Templates close on their last `</template>` since they nest.
pub fn split_sections(text: &str) -> Vec<VueSection<'_>> {
    let mut sections = Vec::new();
    let mut cursor = 0;

    while let Some(caps) = SECTION_OPEN.captures_at(text, cursor) {
        let (Some(open), Some(tag)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let kind = match tag.as_str() {
            "template" => VueSectionKind::Template,
            "script" => VueSectionKind::Script,
            _ => VueSectionKind::Style,
        };
        let lang = caps
            .get(2)
            .and_then(|attrs| LANG_ATTR.captures(attrs.as_str()))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let close_tag = format!("</{}>", tag.as_str());
        let body_start = open.end();
        let close = if kind == VueSectionKind::Template {
            text[body_start..].rfind(&close_tag)
        } else {
            text[body_start..].find(&close_tag)
        };
        let Some(close) = close else {
            break;
        };
        let body_end = body_start + close;

        sections.push(VueSection {
            kind,
            lang,
            text: &text[body_start..body_end],
            offset: body_start,
        });
        cursor = body_end + close_tag.len();
    }

    sections
}
