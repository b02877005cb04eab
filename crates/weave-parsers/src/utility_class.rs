use crate::lines::LineIndex;
use crate::types::*;
use once_cell::sync::Lazy;
use regex::Regex;

/// `className="..."`, `class='...'`, `className={"..."}`, `className={`...`}`
static CLASS_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\b(?:className|class)\s*=\s*(?:"([^"]*)"|'([^']*)'|\{\s*["'`]([^"'`]*)["'`]\s*\})"#,
    )
    .expect("class attribute pattern")
});

static APPLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@apply\s+([^;}\n]+)").expect("@apply pattern"));

/// Utility prefixes stripped before a class is retried against token names
const UTILITY_PREFIXES: &[&str] = &[
    "bg-", "text-", "border-", "ring-", "fill-", "stroke-", "outline-", "shadow-", "rounded-",
    "opacity-", "gap-", "space-x-", "space-y-", "px-", "py-", "pt-", "pb-", "pl-", "pr-", "p-",
    "mx-", "my-", "mt-", "mb-", "ml-", "mr-", "m-", "w-", "h-", "font-", "leading-",
    "tracking-",
];

/// Every class in class attributes and `@apply` rules becomes a candidate
pub fn parse(section: Section<'_>, lines: &LineIndex) -> Vec<Candidate> {
    let mut out = Vec::new();

    for caps in CLASS_ATTR.captures_iter(section.text) {
        if let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            push_classes(&mut out, value.as_str(), section.offset + value.start(), lines);
        }
    }

    for caps in APPLY.captures_iter(section.text) {
        if let Some(value) = caps.get(1) {
            push_classes(&mut out, value.as_str(), section.offset + value.start(), lines);
        }
    }

    out
}

fn push_classes(out: &mut Vec<Candidate>, value: &str, base: usize, lines: &LineIndex) {
    for (start, word) in words_with_offsets(value) {
        let class = clean_class(word);
        if class.is_empty() || class.contains("${") || class.starts_with('{') {
            continue;
        }
        let offset = base + start;
        out.push(Candidate::new(
            class,
            MatchContext::UtilityClass,
            lines.line_of(offset),
            offset,
        ));
    }
}

/// Drop variant prefixes (`hover:`, `md:`) and the important marker
fn clean_class(word: &str) -> &str {
    let word = word.rsplit(':').next().unwrap_or(word);
    word.trim_start_matches('!').trim_end_matches('!')
}

fn words_with_offsets(s: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(st)) => {
                words.push((st, &s[st..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(st) = start {
        words.push((st, &s[st..]));
    }
    words
}

/// `bg-primary` -> `primary`, `p-4` -> `4`. None when no known prefix applies.
pub fn strip_utility_prefix(class: &str) -> Option<&str> {
    UTILITY_PREFIXES
        .iter()
        .find_map(|prefix| class.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
}

/// Arbitrary value syntax: `bg-[#ff0000]` -> `#ff0000`
pub fn arbitrary_value(class: &str) -> Option<&str> {
    let open = class.find("-[")?;
    let rest = &class[open + 2..];
    rest.strip_suffix(']').filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_attributes_split_on_whitespace() {
        let text = "<div className=\"bg-primary p-4\">\n  <span class='hover:text-brand'/>\n</div>";
        let index = LineIndex::new(text);
        let found = parse(Section::whole(text), &index);
        let got: Vec<_> = found.iter().map(|c| (c.pattern.as_str(), c.line)).collect();
        assert_eq!(got, vec![("bg-primary", 1), ("p-4", 1), ("text-brand", 2)]);
    }

    #[test]
    fn test_apply_rules() {
        let text = ".btn {\n  @apply rounded-lg shadow-md;\n}";
        let found = parse(Section::whole(text), &LineIndex::new(text));
        let got: Vec<_> = found.iter().map(|c| c.pattern.as_str()).collect();
        assert_eq!(got, vec!["rounded-lg", "shadow-md"]);
        assert!(found.iter().all(|c| c.line == 2));
    }

    #[test]
    fn test_jsx_expression_string() {
        let text = "<a className={`gap-2 ${active}`} />";
        let found = parse(Section::whole(text), &LineIndex::new(text));
        let got: Vec<_> = found.iter().map(|c| c.pattern.as_str()).collect();
        assert_eq!(got, vec!["gap-2"]);
    }

    #[test]
    fn test_prefix_helpers() {
        assert_eq!(strip_utility_prefix("bg-primary"), Some("primary"));
        assert_eq!(strip_utility_prefix("p-4"), Some("4"));
        assert_eq!(strip_utility_prefix("flex"), None);
        assert_eq!(arbitrary_value("bg-[#ff0000]"), Some("#ff0000"));
        assert_eq!(arbitrary_value("bg-red"), None);
    }
}
