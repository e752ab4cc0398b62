//! Inline style declarations, stylesheet rules and `url(...)` handling.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::dom::selector::Selector;

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"]*?))\s*\)"#).expect("valid url() pattern")
});

/// A stylesheet rule contributing a `background-image` value.
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selector: Selector,
    pub background_image: String,
    pub important: bool,
}

/// Split a `style` attribute into `(property, value)` pairs.
///
/// Semicolons inside parentheses or quotes (data URIs) do not split.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);

    parts
        .into_iter()
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim().to_string()))
        })
        .collect()
}

pub fn serialize_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every URL referenced by `url(...)` in a CSS value, in order.
pub fn extract_urls(value: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(value)
        .filter_map(|caps| captured_url(&caps).map(str::to_string))
        .collect()
}

/// Rewrite each `url(...)` in `value` for which `map` returns a replacement.
/// Untouched references are kept byte for byte.
pub fn map_urls(value: &str, mut map: impl FnMut(&str) -> Option<String>) -> String {
    CSS_URL
        .replace_all(value, |caps: &Captures| {
            match captured_url(caps).and_then(&mut map) {
                Some(url) => format!("url(\"{}\")", url),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn captured_url<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .filter(|url| !url.is_empty())
}
