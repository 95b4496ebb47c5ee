//! Batch response parsing

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// How translations were recovered from a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMethod {
    /// `{"translations": [...]}` parsed
    Structured,
    /// JSON failed, lines paired with entries by position
    Heuristic,
}

/// Translations keyed by 0-based position within the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBatch {
    pub translations: BTreeMap<usize, String>,
    pub method: ParseMethod,
    /// Why structured parsing failed, when it did
    pub error: Option<String>,
}

impl ParsedBatch {
    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.translations.get(&position).map(String::as_str)
    }
}

fn prefix_pattern() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+\s*[.):]|[-*•])\s*").expect("prefix pattern is valid")
    })
}

/// Remove a surrounding ```json fence
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn index_of(item: &Value) -> Option<usize> {
    match item.get("index")? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn translation_of(item: &Value) -> Option<String> {
    let text = match item.get("translation")? {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn parse_structured(raw: &str, expected: usize) -> Result<BTreeMap<usize, String>, String> {
    let value: Value = serde_json::from_str(strip_fences(raw)).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("response is not a JSON object".to_string());
    }

    let mut translations = BTreeMap::new();
    if let Some(items) = value.get("translations").and_then(Value::as_array) {
        for item in items {
            let (Some(index), Some(text)) = (index_of(item), translation_of(item)) else {
                continue;
            };
            if (1..=expected).contains(&index) {
                translations.insert(index - 1, text);
            }
        }
    }
    Ok(translations)
}

/// Pair non-empty response lines with entries by position
fn parse_lines(raw: &str, expected: usize) -> BTreeMap<usize, String> {
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut translations = BTreeMap::new();

    for (position, line) in lines.iter().take(expected).enumerate() {
        let stripped = prefix_pattern().replace(line.trim(), "");
        let mut text = stripped.trim();
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            text = &text[1..text.len() - 1];
        }
        let text = text.trim();
        if !text.is_empty() {
            translations.insert(position, text.to_string());
        }
    }
    translations
}

/// Parse a provider response for a batch of `expected` entries.
///
/// Never fails: a response nothing can be recovered from yields an empty result.
pub fn parse_response(raw: &str, expected: usize) -> ParsedBatch {
    match parse_structured(raw, expected) {
        Ok(translations) => ParsedBatch {
            translations,
            method: ParseMethod::Structured,
            error: None,
        },
        Err(error) => ParsedBatch {
            translations: parse_lines(raw, expected),
            method: ParseMethod::Heuristic,
            error: Some(error),
        },
    }
}
