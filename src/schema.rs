//! Form schema loading.
//!
//! A form schema is an ordinary JSON Schema document whose top-level
//! `properties` enumerate the questions on the form. Declaration order is
//! significant: it decides which fields belong to the first page of a form
//! (see [`crate::config::FormLayout`]) and the row order of every table.
//! `serde_json` is compiled with `preserve_order`, so iterating the parsed
//! `properties` map yields keys exactly as they appear in the file.

use crate::error::Pdf2CsvError;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// One question on the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    /// Property name; dots denote nested lookup in page answers.
    pub key: String,
    /// Human-readable label: the property's `description`, else the key.
    pub label: String,
}

/// The ordered field list of a form plus the raw schema sent to the model.
#[derive(Debug, Clone)]
pub struct FormSchema {
    fields: Vec<SchemaField>,
    document: Value,
}

impl FormSchema {
    /// Read and parse a schema file.
    ///
    /// # Errors
    /// [`Pdf2CsvError::SchemaLoad`] if the file cannot be read, is not JSON,
    /// or has no `properties` object.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Pdf2CsvError> {
        let path = path.as_ref();
        let fail = |reason: String| Pdf2CsvError::SchemaLoad {
            path: path.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let document: Value =
            serde_json::from_str(&text).map_err(|e| fail(format!("invalid JSON: {e}")))?;
        let schema = Self::from_value(document).map_err(fail)?;

        debug!(
            "Loaded schema {} with {} fields",
            path.display(),
            schema.fields.len()
        );
        Ok(schema)
    }

    /// Build a schema from an already-parsed JSON document.
    ///
    /// Returns the reason as a plain string on failure; [`FormSchema::load`]
    /// wraps it with the file path.
    pub fn from_value(document: Value) -> Result<Self, String> {
        let properties = document
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| "missing top-level `properties` object".to_string())?;

        let fields = properties
            .iter()
            .map(|(key, details)| SchemaField {
                key: key.clone(),
                label: details
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or(key)
                    .to_string(),
            })
            .collect();

        Ok(Self { fields, document })
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Labels in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.label.as_str())
    }

    /// Dotted field keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    /// The schema document as loaded, for embedding in the extraction prompt.
    pub fn document(&self) -> &Value {
        &self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn preserves_declaration_order() {
        let text = r#"{
            "type": "object",
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "string", "description": "Alpha question"},
                "mid": {"type": "number"}
            }
        }"#;
        let schema = FormSchema::from_value(serde_json::from_str(text).unwrap()).unwrap();
        let keys: Vec<&str> = schema.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(schema.field_count(), 3);
    }

    #[test]
    fn label_falls_back_to_key() {
        let schema = FormSchema::from_value(json!({
            "properties": {
                "name": {"description": "Full name"},
                "dob": {"type": "string"},
                "odd": {"description": 42}
            }
        }))
        .unwrap();
        let labels: Vec<&str> = schema.labels().collect();
        assert_eq!(labels, vec!["Full name", "dob", "odd"]);
        let keys: Vec<&str> = schema.keys().collect();
        assert_eq!(keys, vec!["name", "dob", "odd"]);
    }

    #[test]
    fn missing_properties_is_rejected() {
        let err = FormSchema::from_value(json!({"type": "object"})).unwrap_err();
        assert!(err.contains("properties"));
        assert!(FormSchema::from_value(json!({"properties": []})).is_err());
    }

    #[test]
    fn load_reports_path_for_missing_file() {
        let err = FormSchema::load("/definitely/not/here/form_schema.json").unwrap_err();
        match err {
            Pdf2CsvError::SchemaLoad { path, .. } => {
                assert!(path.ends_with("form_schema.json"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_rejects_invalid_json() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{ not json").unwrap();
        let err = FormSchema::load(f.path()).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"), "got: {err}");
    }

    #[test]
    fn load_reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(br#"{"properties": {"a": {}, "b": {"description": "Bee"}}}"#)
            .unwrap();
        let schema = FormSchema::load(f.path()).unwrap();
        assert_eq!(schema.fields()[1].label, "Bee");
        assert!(schema.document().get("properties").is_some());
    }
}
