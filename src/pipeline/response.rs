//! Model-reply cleanup: raw text → JSON object.
//!
//! Even with a JSON-only instruction, vision models sometimes wrap the
//! answer in a ```` ```json ```` fence, prefix it with a sentence, or leave a
//! BOM in front of it. These rules strip that noise before parsing. Anything
//! that still is not a single JSON object is rejected; the page then has no
//! answers and its form is reported as incomplete downstream.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Why a reply could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseIssue {
    #[error("empty response")]
    Empty,
    #[error("invalid JSON: {0}")]
    Unparseable(String),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Clean `raw` and parse it as a JSON object.
pub fn parse_page_answer(raw: &str) -> Result<Map<String, Value>, ResponseIssue> {
    let cleaned = clean_reply(raw);
    if cleaned.is_empty() {
        return Err(ResponseIssue::Empty);
    }

    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(v) => v,
        Err(first_err) => outermost_object(&cleaned)
            .and_then(|candidate| serde_json::from_str(candidate).ok())
            .ok_or_else(|| ResponseIssue::Unparseable(first_err.to_string()))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ResponseIssue::NotAnObject(json_kind(&other))),
    }
}

fn clean_reply(raw: &str) -> String {
    let s = remove_invisible_chars(raw);
    let s = s.trim();
    match RE_FENCED.captures(s) {
        Some(caps) => caps[1].trim().to_string(),
        None => s.to_string(),
    }
}

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}'))
        .collect()
}

/// The span from the first `{` to the last `}`, for replies with prose around the object.
fn outermost_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        let m = parse_page_answer(r#"{"name": "Jo"}"#).unwrap();
        assert_eq!(m["name"], "Jo");
    }

    #[test]
    fn fenced_object() {
        let m = parse_page_answer("```json\n{\"name\": \"Jo\"}\n```").unwrap();
        assert_eq!(m["name"], "Jo");
        let m = parse_page_answer("```\n{\"a\": 1}\n```\n").unwrap();
        assert_eq!(m["a"], 1);
    }

    #[test]
    fn prose_around_object() {
        let m = parse_page_answer("Here is the JSON:\n{\"dob\": \"2000-01-01\"}\nHope it helps.")
            .unwrap();
        assert_eq!(m["dob"], "2000-01-01");
    }

    #[test]
    fn bom_is_stripped() {
        let m = parse_page_answer("\u{FEFF}{\"a\": true}").unwrap();
        assert_eq!(m["a"], true);
    }

    #[test]
    fn keeps_key_order() {
        let m = parse_page_answer(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = m.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(parse_page_answer("  \n"), Err(ResponseIssue::Empty));
        assert_eq!(parse_page_answer("```json\n```"), Err(ResponseIssue::Empty));
    }

    #[test]
    fn rejects_non_object() {
        let err = parse_page_answer("[1, 2]").unwrap_err();
        assert_eq!(err, ResponseIssue::NotAnObject("an array"));
        assert_eq!(err.to_string(), "expected a JSON object, got an array");
        assert_eq!(ResponseIssue::Empty.to_string(), "empty response");
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_page_answer("I cannot read this page.").unwrap_err();
        assert!(matches!(err, ResponseIssue::Unparseable(_)));
        assert!(err.to_string().starts_with("invalid JSON"));
    }
}
