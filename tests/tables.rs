//! Integration tests for the table stage: page answer files → CSV tables.
//!
//! No PDF renderer or model is involved; every test writes page JSON into a
//! temp directory the way the extraction stage would and checks the CSV
//! files that come out.

use edgequake_pdf2csv::{
    build_tables, write_tables, FormLayout, FormSchema, Pdf2CsvError, RecordError, TableReport,
};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn schema() -> FormSchema {
    FormSchema::from_value(json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": "Full name"},
            "dob": {"type": "string", "description": "Date of birth"},
            "address.city": {"type": "string", "description": "City"},
            "address.zip": {"type": "string", "description": "ZIP code"}
        }
    }))
    .expect("valid schema")
}

struct Dirs {
    _root: TempDir,
    json: std::path::PathBuf,
    csv: std::path::PathBuf,
}

fn dirs() -> Dirs {
    let root = TempDir::new().unwrap();
    let json = root.path().join("json_output");
    let csv = root.path().join("csv_output");
    std::fs::create_dir_all(&json).unwrap();
    Dirs {
        _root: root,
        json,
        csv,
    }
}

fn page(dir: &Path, name: &str, body: serde_json::Value) {
    std::fs::write(dir.join(name), serde_json::to_string_pretty(&body).unwrap()).unwrap();
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name))
        .unwrap_or_else(|e| panic!("{name} should exist: {e}"))
}

fn run(d: &Dirs) -> TableReport {
    write_tables(&d.json, &d.csv, &schema(), FormLayout::default()).expect("tables")
}

/// Two complete forms, four pages.
fn two_forms(d: &Dirs) {
    page(&d.json, "page1.json", json!({"name": "Jo", "dob": "2000-01-01"}));
    page(&d.json, "page2.json", json!({"address": {"city": "NY", "zip": "10001"}}));
    page(&d.json, "page3.json", json!({"name": "Sam, Jr.", "dob": "1999-12-31"}));
    page(&d.json, "page4.json", json!({"address": {"city": "LA", "zip": "90001"}}));
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn scenario_full_form() {
    init_tracing();
    let d = dirs();
    page(&d.json, "page1.json", json!({"name": "Jo", "dob": "2000-01-01"}));
    page(&d.json, "page2.json", json!({"address": {"city": "NY", "zip": "10001"}}));

    let report = run(&d);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.forms_accepted, vec![1]);

    assert_eq!(
        read(&d.csv, "form_1_merged.csv"),
        "Question,Form_1\n\
         Full name,Jo\n\
         Date of birth,2000-01-01\n\
         City,NY\n\
         ZIP code,10001\n"
    );
}

#[test]
fn scenario_missing_leaf_is_blank() {
    init_tracing();
    let d = dirs();
    page(&d.json, "page1.json", json!({"name": "Jo"}));
    page(&d.json, "page2.json", json!({"address": {"city": "NY", "zip": "10001"}}));

    let report = run(&d);
    assert!(report.errors.is_empty());
    assert_eq!(report.forms_accepted, vec![1]);
    assert_eq!(
        read(&d.csv, "form_1_merged.csv"),
        "Question,Form_1\nFull name,Jo\nDate of birth,\nCity,NY\nZIP code,10001\n"
    );
}

#[test]
fn odd_trailing_page_does_not_stop_the_batch() {
    init_tracing();
    let d = dirs();
    two_forms(&d);
    page(&d.json, "page5.json", json!({"name": "Lone", "dob": "2001-02-03"}));

    let report = run(&d);
    assert_eq!(report.forms_attempted, 3);
    assert_eq!(report.forms_accepted, vec![1, 2]);
    assert!(report.errors.iter().any(|e| matches!(
        e,
        RecordError::FormLengthMismatch {
            form: 3,
            expected: 4,
            actual: 2
        }
    )));
    // The trailing page still gets its own page table.
    assert_eq!(report.page_tables.len(), 5);
    assert!(d.csv.join("page5_cleaned.csv").exists());
}

#[test]
fn bad_form_is_skipped_and_siblings_survive() {
    init_tracing();
    let d = dirs();
    page(&d.json, "page1.json", json!({"name": "Jo", "dob": "2000-01-01"}));
    std::fs::write(d.json.join("page2.json"), "{ truncated").unwrap();
    page(&d.json, "page3.json", json!({"name": "Sam", "dob": "1999-12-31"}));
    page(&d.json, "page4.json", json!({"address": {"city": "LA", "zip": "90001"}}));

    let report = run(&d);
    assert_eq!(report.forms_accepted, vec![2]);
    assert!(!d.csv.join("form_1_merged.csv").exists());
    assert!(d.csv.join("form_2_merged.csv").exists());
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, RecordError::PageDecode { .. })));
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, RecordError::FormLengthMismatch { form: 1, .. })));

    // Column ids keep the pair number of each accepted form.
    let merged = read(&d.csv, "forms_merged.csv");
    assert!(merged.starts_with("Question,Form_2\n"), "{merged}");
}

#[test]
fn merged_table_has_one_column_per_form() {
    init_tracing();
    let d = dirs();
    two_forms(&d);

    let report = run(&d);
    assert_eq!(report.csv_file_count(), 4 + 2 + 1);
    assert_eq!(
        read(&d.csv, "forms_merged.csv"),
        "Question,Form_1,Form_2\n\
         Full name,Jo,\"Sam, Jr.\"\n\
         Date of birth,2000-01-01,1999-12-31\n\
         City,NY,LA\n\
         ZIP code,10001,90001\n"
    );
}

#[test]
fn page_tables_list_every_field() {
    init_tracing();
    let d = dirs();
    two_forms(&d);
    run(&d);

    // The first page of a form holds no address, so those rows are blank.
    assert_eq!(
        read(&d.csv, "page1_cleaned.csv"),
        "Question,Answer\nFull name,Jo\nDate of birth,2000-01-01\nCity,\nZIP code,\n"
    );
}

#[test]
fn reruns_are_byte_identical() {
    init_tracing();
    let d = dirs();
    two_forms(&d);

    run(&d);
    let first: Vec<String> = ["forms_merged.csv", "form_1_merged.csv", "page3_cleaned.csv"]
        .iter()
        .map(|n| read(&d.csv, n))
        .collect();
    run(&d);
    let second: Vec<String> = ["forms_merged.csv", "form_1_merged.csv", "page3_cleaned.csv"]
        .iter()
        .map(|n| read(&d.csv, n))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn combined_file_is_not_a_page() {
    init_tracing();
    let d = dirs();
    two_forms(&d);
    page(&d.json, "metadata.json", json!({"page1": {}, "page2": {}}));

    let report = run(&d);
    assert_eq!(report.page_tables.len(), 4);
    assert_eq!(report.forms_attempted, 2);
    assert!(report.errors.is_empty());
}

#[test]
fn explicit_split_index() {
    init_tracing();
    let d = dirs();
    page(&d.json, "page1.json", json!({"name": "Jo", "dob": "2000-01-01", "address": {"city": "NY"}}));
    page(&d.json, "page2.json", json!({"address": {"zip": "10001"}}));

    let report = write_tables(&d.json, &d.csv, &schema(), FormLayout::split_at(3)).unwrap();
    assert_eq!(report.forms_accepted, vec![1]);
    assert!(read(&d.csv, "form_1_merged.csv").contains("City,NY\nZIP code,10001\n"));
}

#[test]
fn zero_padded_pages_pair_in_numeric_order() {
    init_tracing();
    let d = dirs();
    for n in 1..=12 {
        let body = if n % 2 == 1 {
            json!({"name": format!("P{n}"), "dob": "x"})
        } else {
            json!({"address": {"city": format!("C{n}"), "zip": "z"}})
        };
        page(&d.json, &format!("page{n:02}.json"), body);
    }

    let report = run(&d);
    assert_eq!(report.forms_accepted, vec![1, 2, 3, 4, 5, 6]);
    let form6 = read(&d.csv, "form_6_merged.csv");
    assert!(form6.contains("Full name,P11\n") && form6.contains("City,C12\n"), "{form6}");
}

#[test]
fn missing_json_dir_is_fatal() {
    let root = TempDir::new().unwrap();
    let err = write_tables(
        &root.path().join("nope"),
        &root.path().join("csv"),
        &schema(),
        FormLayout::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Pdf2CsvError::FileNotFound { .. }));
}

#[test]
fn schema_file_round_trip() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("form_schema.json");
    std::fs::write(
        &path,
        r#"{"properties": {"zeta": {"description": "Z"}, "alpha": {}, "mid.leaf": {"description": "M"}}}"#,
    )
    .unwrap();
    let schema = FormSchema::load(&path).unwrap();
    let labels: Vec<&str> = schema.labels().collect();
    assert_eq!(labels, vec!["Z", "alpha", "M"]);
}

#[tokio::test]
async fn build_tables_async_matches_sync() {
    init_tracing();
    let d = dirs();
    two_forms(&d);

    let report = build_tables(&d.json, &d.csv, &schema(), FormLayout::default())
        .await
        .unwrap();
    assert_eq!(report.forms_accepted, vec![1, 2]);
    assert_eq!(
        report.merged_table.as_deref(),
        Some(d.csv.join("forms_merged.csv").as_path())
    );
}
