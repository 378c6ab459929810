//! Prompts for schema-guided form extraction.
//!
//! The model is shown one page image and the full form schema and asked for
//! a JSON object. Callers can replace the instruction text via
//! [`crate::config::ExtractionConfig::prompt`]; the schema is always
//! appended.

use serde_json::Value;

/// Default instruction placed in front of the serialised schema.
pub const DEFAULT_EXTRACTION_PROMPT: &str =
    "provide JSON file that represents this document. Use this JSON Schema: ";

/// System message keeping the model on a JSON-only reply.
pub const JSON_ONLY_SYSTEM_PROMPT: &str = "You read scanned paper forms. \
Answer with a single JSON object and nothing else: no Markdown fences, no commentary. \
Use the property names of the supplied JSON Schema as keys. \
If a field is blank or unreadable on this page, omit it.";

/// Build the user text for one page: instruction followed by the compact schema.
pub fn extraction_prompt(instruction: Option<&str>, schema: &Value) -> String {
    let instruction = instruction.unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    format!("{}{}", instruction, schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_embeds_schema() {
        let schema = json!({"type": "object", "properties": {"name": {"type": "string"}}});
        let p = extraction_prompt(None, &schema);
        assert!(p.starts_with(DEFAULT_EXTRACTION_PROMPT));
        assert!(p.ends_with(r#"{"type":"object","properties":{"name":{"type":"string"}}}"#));
    }

    #[test]
    fn custom_instruction_replaces_default() {
        let schema = json!({"properties": {}});
        let p = extraction_prompt(Some("Fill this schema: "), &schema);
        assert_eq!(p, r#"Fill this schema: {"properties":{}}"#);
    }
}
