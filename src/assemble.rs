//! Form assembly: two page answers → one row of form answers.
//!
//! Every physical form is two pages. Page files are taken in lexicographic
//! file-name order and paired `0&1`, `2&3`, … The first page of a pair
//! answers the leading fields of the schema, the second page the rest; the
//! split point comes from [`FormLayout`].
//!
//! A form is accepted only if it ends up with exactly one answer per schema
//! field. A page whose answers cannot be read contributes nothing, which
//! makes its form come up short; that form is rejected with
//! [`RecordError::FormLengthMismatch`] and assembly moves on to the next
//! pair. Missing leaf keys are *not* a mismatch; they are blank answers.

use crate::answers::{extract_answers, Answer};
use crate::config::FormLayout;
use crate::error::{Pdf2CsvError, RecordError};
use crate::pipeline::combine::COMBINED_FILE_NAME;
use crate::schema::FormSchema;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Number of page files that make up one form.
pub const PAGES_PER_FORM: usize = 2;

/// An accepted form.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledForm {
    /// 1-indexed pair number; stays stable even when earlier forms are rejected.
    pub number: usize,
    /// Page files this form was read from.
    pub pages: Vec<PathBuf>,
    /// One answer per schema field, in schema order.
    pub answers: Vec<Answer>,
}

impl AssembledForm {
    /// Column header used for this form in merged tables.
    pub fn column_name(&self) -> String {
        format!("Form_{}", self.number)
    }
}

/// Result of assembling a whole batch.
#[derive(Debug, Default)]
pub struct Assembly {
    pub forms: Vec<AssembledForm>,
    pub errors: Vec<RecordError>,
    /// Number of pairs attempted, accepted or not.
    pub attempted: usize,
}

/// List page-answer files in `dir`: every `*.json` except the combined file,
/// sorted by file name.
pub fn list_page_files(dir: &Path) -> Result<Vec<PathBuf>, Pdf2CsvError> {
    let entries = std::fs::read_dir(dir).map_err(|_| Pdf2CsvError::FileNotFound {
        path: dir.to_path_buf(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        })
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(COMBINED_FILE_NAME))
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} page files in {}", files.len(), dir.display());
    Ok(files)
}

/// Read one page's answer file; it must hold a JSON object.
pub fn read_page_record(path: &Path) -> Result<Value, RecordError> {
    let fail = |detail: String| RecordError::PageDecode {
        path: path.to_path_buf(),
        detail,
    };

    let text = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
    let record: Value = serde_json::from_str(&text).map_err(|e| fail(e.to_string()))?;
    if !record.is_object() {
        return Err(fail("unexpected format: not a JSON object".into()));
    }
    Ok(record)
}

/// Assemble forms from page files already in lexicographic order.
///
/// Never fails as a whole: unreadable pages and short forms are reported in
/// [`Assembly::errors`] and excluded from [`Assembly::forms`].
pub fn assemble_forms(page_files: &[PathBuf], schema: &FormSchema, layout: FormLayout) -> Assembly {
    let fields = schema.fields();
    let split = layout.split_for(fields.len());
    let halves = [&fields[..split], &fields[split..]];

    let mut assembly = Assembly::default();

    for (idx, pair) in page_files.chunks(PAGES_PER_FORM).enumerate() {
        let number = idx + 1;
        assembly.attempted += 1;

        let mut answers = Vec::with_capacity(fields.len());
        for (page, half) in pair.iter().zip(halves) {
            match read_page_record(page) {
                Ok(record) => answers.extend(extract_answers(&record, half)),
                Err(e) => {
                    warn!("{}", e);
                    assembly.errors.push(e);
                }
            }
        }

        if pair.len() < PAGES_PER_FORM {
            warn!(
                "Form {}: page {} has no partner page",
                number,
                pair[0].display()
            );
        }

        if answers.len() != fields.len() {
            let e = RecordError::FormLengthMismatch {
                form: number,
                expected: fields.len(),
                actual: answers.len(),
            };
            warn!("{}", e);
            assembly.errors.push(e);
            continue;
        }

        debug!("Form {}: {} answers", number, answers.len());
        assembly.forms.push(AssembledForm {
            number,
            pages: pair.to_vec(),
            answers,
        });
    }

    assembly
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn schema4() -> FormSchema {
        FormSchema::from_value(json!({
            "properties": {
                "name": {"description": "Name"},
                "dob": {"description": "Date of birth"},
                "address.city": {},
                "address.zip": {}
            }
        }))
        .unwrap()
    }

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, body).unwrap();
        p
    }

    fn cells(form: &AssembledForm) -> Vec<String> {
        form.answers.iter().map(Answer::cell).collect()
    }

    #[test]
    fn pair_merges_halves() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(&dir, "page1.json", r#"{"name":"Jo","dob":"2000-01-01"}"#),
            write(&dir, "page2.json", r#"{"address":{"city":"NY","zip":"10001"}}"#),
        ];
        let a = assemble_forms(&files, &schema4(), FormLayout::default());
        assert!(a.errors.is_empty(), "{:?}", a.errors);
        assert_eq!(a.forms.len(), 1);
        assert_eq!(cells(&a.forms[0]), vec!["Jo", "2000-01-01", "NY", "10001"]);
    }

    #[test]
    fn missing_leaf_is_blank_not_mismatch() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(&dir, "page1.json", r#"{"name":"Jo"}"#),
            write(&dir, "page2.json", r#"{"address":{"city":"NY","zip":"10001"}}"#),
        ];
        let a = assemble_forms(&files, &schema4(), FormLayout::default());
        assert!(a.errors.is_empty());
        assert_eq!(cells(&a.forms[0]), vec!["Jo", "", "NY", "10001"]);
        assert!(!a.forms[0].answers[1].is_resolved());
    }

    #[test]
    fn undecodable_page_rejects_only_its_form() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(&dir, "page1.json", r#"{"name":"A"}"#),
            write(&dir, "page2.json", "not json"),
            write(&dir, "page3.json", r#"{"name":"B","dob":"1999"}"#),
            write(&dir, "page4.json", r#"{"address":{"city":"LA"}}"#),
        ];
        let a = assemble_forms(&files, &schema4(), FormLayout::default());
        assert_eq!(a.attempted, 2);
        assert_eq!(a.forms.len(), 1);
        assert_eq!(a.forms[0].number, 2);
        assert_eq!(a.forms[0].column_name(), "Form_2");
        assert!(a.errors.iter().any(|e| matches!(e, RecordError::PageDecode { .. })));
        assert!(a.errors.contains(&RecordError::FormLengthMismatch {
            form: 1,
            expected: 4,
            actual: 2
        }));
    }

    #[test]
    fn non_object_page_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "page1.json", r#"["name", "Jo"]"#);
        let err = read_page_record(&p).unwrap_err();
        assert!(matches!(err, RecordError::PageDecode { .. }));
    }

    #[test]
    fn trailing_unpaired_page_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(&dir, "page1.json", r#"{"name":"Jo","dob":"x"}"#),
            write(&dir, "page2.json", r#"{"address":{"city":"NY","zip":"1"}}"#),
            write(&dir, "page3.json", r#"{"name":"Al","dob":"y"}"#),
        ];
        let a = assemble_forms(&files, &schema4(), FormLayout::default());
        assert_eq!(a.attempted, 2);
        assert_eq!(a.forms.len(), 1);
        assert_eq!(
            a.errors,
            vec![RecordError::FormLengthMismatch {
                form: 2,
                expected: 4,
                actual: 2
            }]
        );
    }

    #[test]
    fn explicit_split_moves_fields_between_pages() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(&dir, "page1.json", r#"{"name":"Jo","dob":"d","address":{"city":"NY"}}"#),
            write(&dir, "page2.json", r#"{"address":{"zip":"10001","city":"ignored"}}"#),
        ];
        let a = assemble_forms(&files, &schema4(), FormLayout::split_at(3));
        assert_eq!(cells(&a.forms[0]), vec!["Jo", "d", "NY", "10001"]);
    }

    #[test]
    fn list_page_files_sorts_and_skips_combined() {
        let dir = TempDir::new().unwrap();
        write(&dir, "page2.json", "{}");
        write(&dir, "page1.json", "{}");
        write(&dir, COMBINED_FILE_NAME, "{}");
        write(&dir, "notes.txt", "");
        let names: Vec<String> = list_page_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page1.json", "page2.json"]);
    }

    #[test]
    fn list_page_files_missing_dir() {
        let err = list_page_files(Path::new("/no/such/json_output")).unwrap_err();
        assert!(matches!(err, Pdf2CsvError::FileNotFound { .. }));
    }
}
