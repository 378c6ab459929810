//! Field lookup in a page's model answer.
//!
//! Model output is untrusted: keys may be missing, nesting may be wrong, and
//! a leaf may be an object. Lookup therefore never fails. It yields
//! `Option<&Value>`, where `None` means the dotted path could not be walked.
//! Turning that into a blank cell happens only in [`answer_cell`], so callers
//! that care can still tell an unresolved path from a field the model
//! answered with an empty string.

use crate::schema::SchemaField;
use serde::Serialize;
use serde_json::Value;

/// One field's answer for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub label: String,
    /// `None` when the path did not resolve.
    pub value: Option<Value>,
}

impl Answer {
    /// Text written to the CSV cell.
    pub fn cell(&self) -> String {
        answer_cell(self.value.as_ref())
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }
}

/// Walk `record` along the dot-separated `key`.
///
/// Each segment must name a member of an object. A missing member, or a
/// non-object reached before the last segment, ends the walk with `None`.
pub fn resolve_answer<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}

/// Render a resolved (or unresolved) answer as cell text.
///
/// Unresolved and `null` become `""`, strings are written as-is, numbers and
/// booleans use their JSON text, and objects or arrays are written as compact
/// JSON rather than flattened further.
pub fn answer_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Extract `fields` from one page record, in order.
pub fn extract_answers(record: &Value, fields: &[SchemaField]) -> Vec<Answer> {
    fields
        .iter()
        .map(|field| Answer {
            label: field.label.clone(),
            value: resolve_answer(record, &field.key).cloned(),
        })
        .collect()
}
