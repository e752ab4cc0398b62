//! Compound selector matching.
//!
//! Supports `*`, `tag`, `#id`, `.class`, `[attr]` and comma-separated
//! lists of their compounds (`source[srcset], img[src]`). Combinators are
//! out of scope: callers walk subtrees themselves.

use thiserror::Error;

use crate::dom::node::Element;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported selector: {0}")]
pub struct SelectorError(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<String>,
}

impl Compound {
    fn matches(&self, el: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if &el.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| el.has_class(c))
            && self.attrs.iter().all(|a| el.attrs.contains_key(a))
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let alternatives = input
            .split(',')
            .map(|part| parse_compound(part.trim()).ok_or_else(|| SelectorError(input.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    /// Selector matching elements that carry `class`.
    pub fn class(class: &str) -> Self {
        Self {
            alternatives: vec![Compound {
                classes: vec![class.to_string()],
                ..Compound::default()
            }],
        }
    }

    pub fn matches(&self, el: &Element) -> bool {
        self.alternatives.iter().any(|c| c.matches(el))
    }
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(rest: &str) -> Option<(&str, &str)> {
    let end = rest.find(|c: char| !is_ident(c)).unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(rest.split_at(end))
    }
}

fn parse_compound(input: &str) -> Option<Compound> {
    if input.is_empty() {
        return None;
    }

    let mut compound = Compound::default();
    let mut rest = input;

    if let Some(stripped) = rest.strip_prefix('*') {
        rest = stripped;
    } else if let Some((tag, tail)) = take_ident(rest) {
        compound.tag = Some(tag.to_ascii_lowercase());
        rest = tail;
    }

    while let Some(c) = rest.chars().next() {
        match c {
            '#' => {
                let (id, tail) = take_ident(&rest[1..])?;
                compound.id = Some(id.to_string());
                rest = tail;
            }
            '.' => {
                let (class, tail) = take_ident(&rest[1..])?;
                compound.classes.push(class.to_string());
                rest = tail;
            }
            '[' => {
                let close = rest.find(']')?;
                let name = rest[1..close].trim();
                if name.is_empty() || !name.chars().all(is_ident) {
                    return None;
                }
                compound.attrs.push(name.to_ascii_lowercase());
                rest = &rest[close + 1..];
            }
            _ => return None,
        }
    }

    Some(compound)
}
