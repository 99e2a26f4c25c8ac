//! Input validation helpers shared by request handlers.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Default bound applied by [`sanitize`].
pub const DEFAULT_MAX_INPUT_LEN: usize = 1000;

/// Per-field length constraints for [`field_lengths`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthRule {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

/// Check that each field is present and non-empty. Returns one message
/// per failing field.
pub fn required_fields(data: &Value, fields: &[&str]) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    for &field in fields {
        match data.get(field) {
            None => {
                errors.insert(field.to_owned(), format!("{field} is required"));
            }
            Some(Value::Null) => {
                errors.insert(field.to_owned(), format!("{field} cannot be empty"));
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                errors.insert(field.to_owned(), format!("{field} cannot be empty"));
            }
            Some(_) => {}
        }
    }
    errors
}

/// Check per-field length constraints. Absent and null fields pass;
/// non-string values are measured through their JSON rendering.
pub fn field_lengths(data: &Value, rules: &[(&str, LengthRule)]) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    for &(field, rule) in rules {
        let Some(value) = data.get(field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let len = text.chars().count();
        if let Some(min) = rule.min {
            if len < min {
                errors.insert(
                    field.to_owned(),
                    format!("{field} must be at least {min} characters"),
                );
                continue;
            }
        }
        if let Some(max) = rule.max {
            if len > max {
                errors.insert(
                    field.to_owned(),
                    format!("{field} must be no more than {max} characters"),
                );
            }
        }
    }
    errors
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Strip NUL bytes and control characters (tab, newline and carriage
/// return survive), trim whitespace, and truncate to `max_len` characters.
pub fn sanitize(value: &str, max_len: usize) -> String {
    let filtered: String = value
        .chars()
        .filter(|&c| (c as u32) >= 32 || c == '\t' || c == '\n' || c == '\r')
        .collect();
    filtered.trim().chars().take(max_len).collect()
}
