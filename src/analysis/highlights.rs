//! Highlight quote normalization.
//!
//! Engines store highlights as a real list, as a string holding a list
//! literal (`"['a', 'b']"` or a JSON array), or as free text with one
//! bullet per line. Everything is reduced to a short ordered list of
//! trimmed, non-empty quotes. List literals are parsed, never evaluated.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Maximum number of quotes kept per concept.
pub const MAX_HIGHLIGHTS: usize = 3;

/// Characters stripped from both ends of a bullet line.
const BULLET_CHARS: &[char] = &[' ', '-', '•', '\n', '\t', '\r'];

/// A stored highlight value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HighlightValue {
    #[default]
    Missing,
    List(Vec<String>),
    Text(String),
}

impl From<Value> for HighlightValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => HighlightValue::Missing,
            Value::String(s) => HighlightValue::Text(s),
            Value::Array(items) => HighlightValue::List(
                items
                    .into_iter()
                    .filter(|v| !v.is_null())
                    .map(|v| match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            other => HighlightValue::Text(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for HighlightValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(HighlightValue::from)
    }
}

impl HighlightValue {
    /// True when the value holds no usable text.
    pub fn is_blank(&self) -> bool {
        match self {
            HighlightValue::Missing => true,
            HighlightValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
            HighlightValue::Text(s) => s.trim().is_empty(),
        }
    }

    /// Normalize to at most `max` trimmed, non-empty quotes.
    pub fn normalize(&self, max: usize) -> Vec<String> {
        match self {
            HighlightValue::Missing => Vec::new(),
            HighlightValue::List(items) => clean_items(items.iter().map(String::as_str), max),
            HighlightValue::Text(s) => match parse_list_literal(s) {
                Some(items) => clean_items(items.iter().map(String::as_str), max),
                None => split_bullets(s, max),
            },
        }
    }
}

fn clean_items<'a>(items: impl Iterator<Item = &'a str>, max: usize) -> Vec<String> {
    items
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max)
        .map(String::from)
        .collect()
}

fn split_bullets(text: &str, max: usize) -> Vec<String> {
    text.trim()
        .lines()
        .map(|line| line.trim_matches(BULLET_CHARS))
        .filter(|line| !line.is_empty())
        .take(max)
        .map(String::from)
        .collect()
}

/// Parse a string holding a list literal.
///
/// Accepts JSON arrays and bracketed lists of single- or double-quoted
/// strings (with backslash escapes) or bare numbers. Returns `None` for
/// anything else so the caller can fall back to line splitting.
pub fn parse_list_literal(input: &str) -> Option<Vec<String>> {
    let s = input.trim();
    if !(s.starts_with('[') && s.ends_with(']')) {
        return None;
    }

    if let Ok(items) = serde_json::from_str::<Vec<Value>>(s) {
        return match HighlightValue::from(Value::Array(items)) {
            HighlightValue::List(items) => Some(items),
            _ => None,
        };
    }

    ListParser::new(&s[1..s.len() - 1]).parse()
}

struct ListParser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> ListParser<'a> {
    fn new(body: &'a str) -> Self {
        Self {
            chars: body.chars().peekable(),
        }
    }

    fn parse(mut self) -> Option<Vec<String>> {
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            let item = match self.chars.peek() {
                None => break,
                Some('\'') | Some('"') => self.quoted()?,
                Some(_) => self.bare()?,
            };
            items.push(item);

            self.skip_whitespace();
            match self.chars.next() {
                None => break,
                Some(',') => continue,
                Some(_) => return None,
            }
        }

        Some(items)
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn quoted(&mut self) -> Option<String> {
        let quote = self.chars.next()?;
        let mut out = String::new();

        loop {
            match self.chars.next()? {
                '\\' => match self.chars.next()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    other => out.push(other),
                },
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }
    }

    fn bare(&mut self) -> Option<String> {
        let mut token = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == ',' {
                break;
            }
            token.push(c);
            self.chars.next();
        }

        let token = token.trim();
        token.parse::<f64>().ok().map(|_| token.to_string())
    }
}
