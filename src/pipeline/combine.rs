//! Combined answer document: every page answer in one JSON file.
//!
//! `metadata.json` maps each page file stem to that page's answer object,
//! in file-name order. Pages that cannot be decoded are left out and
//! reported; the combined file itself is never read back as a page.

use crate::assemble::{list_page_files, read_page_record};
use crate::error::{Pdf2CsvError, RecordError};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

/// File name of the combined document inside the JSON directory.
pub const COMBINED_FILE_NAME: &str = "metadata.json";

/// Build the combined document from the page files in `json_dir`.
pub fn combine_page_answers(json_dir: &Path) -> Result<(Value, Vec<RecordError>), Pdf2CsvError> {
    let mut combined = Map::new();
    let mut errors = Vec::new();

    for path in list_page_files(json_dir)? {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match read_page_record(&path) {
            Ok(record) => {
                combined.insert(stem.to_string(), record);
            }
            Err(e) => {
                warn!("{}", e);
                errors.push(e);
            }
        }
    }

    Ok((Value::Object(combined), errors))
}

/// Write `metadata.json` into `json_dir`, returning any pages left out.
pub fn write_combined(json_dir: &Path) -> Result<Vec<RecordError>, Pdf2CsvError> {
    let (combined, errors) = combine_page_answers(json_dir)?;
    let out = json_dir.join(COMBINED_FILE_NAME);
    let text = serde_json::to_string_pretty(&combined)
        .map_err(|e| Pdf2CsvError::Internal(format!("serialise combined answers: {e}")))?;
    std::fs::write(&out, text).map_err(|e| Pdf2CsvError::write_failed(&out, e))?;
    info!("Combined JSON data saved to {}", out.display());
    Ok(errors)
}
