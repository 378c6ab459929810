//! Result types for a batch run.
//!
//! A batch never fails because of a single page or form. What happened to
//! each one is recorded here instead: [`PageOutcome`] per extracted page,
//! [`TableReport`] for the CSV stage, and [`BatchStats`] for totals.

use crate::error::{Pdf2CsvError, RecordError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Directory layout of one batch's generated files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLayout {
    pub root: PathBuf,
    /// Rendered page images.
    pub image_dir: PathBuf,
    /// One answer file per page, plus `metadata.json`.
    pub json_dir: PathBuf,
    /// Per-page, per-form and merged CSV tables.
    pub csv_dir: PathBuf,
}

impl OutputLayout {
    /// Default root directory name, created next to the input PDF.
    pub const DEFAULT_ROOT: &'static str = "generated_files";

    /// Standard layout under `root`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            image_dir: root.join("images_from_pdf"),
            json_dir: root.join("json_output"),
            csv_dir: root.join("csv_output"),
            root,
        }
    }

    /// Create every directory of the layout.
    pub fn create_all(&self) -> Result<(), Pdf2CsvError> {
        for dir in [&self.image_dir, &self.json_dir, &self.csv_dir] {
            create_dir(dir)?;
        }
        Ok(())
    }
}

pub(crate) fn create_dir(dir: &Path) -> Result<(), Pdf2CsvError> {
    std::fs::create_dir_all(dir).map_err(|e| Pdf2CsvError::write_failed(dir, e))
}

/// What happened to one page sent for extraction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageOutcome {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Image the answers were read from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    /// Answer file written for this page; `None` if extraction failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,
    /// The model's answer object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<Map<String, Value>>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordError>,
}

impl PageOutcome {
    pub fn new(page_num: usize) -> Self {
        Self {
            page_num,
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.answer.is_some()
    }
}

/// Files produced by the table stage and what it had to skip.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableReport {
    /// `*_cleaned.csv`, one per decodable page file.
    pub page_tables: Vec<PathBuf>,
    /// `form_{n}_merged.csv`, one per accepted form.
    pub form_tables: Vec<PathBuf>,
    /// `forms_merged.csv` with every accepted form.
    pub merged_table: Option<PathBuf>,
    /// Page pairs examined.
    pub forms_attempted: usize,
    /// Numbers of the forms that made it into the merged output.
    pub forms_accepted: Vec<usize>,
    /// Undecodable pages and rejected forms.
    pub errors: Vec<RecordError>,
}

impl TableReport {
    pub fn csv_file_count(&self) -> usize {
        self.page_tables.len() + self.form_tables.len() + usize::from(self.merged_table.is_some())
    }
}

/// Aggregate numbers for a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub pages_rendered: usize,
    pub pages_extracted: usize,
    pub pages_failed: usize,
    pub forms_attempted: usize,
    pub forms_accepted: usize,
    pub csv_files: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a full run produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub layout: OutputLayout,
    pub pages: Vec<PageOutcome>,
    pub tables: TableReport,
    pub stats: BatchStats,
}

impl BatchReport {
    /// Every recoverable error of the batch: page extraction first, then tables.
    pub fn errors(&self) -> impl Iterator<Item = &RecordError> {
        self.pages
            .iter()
            .filter_map(|p| p.error.as_ref())
            .chain(self.tables.errors.iter())
    }
}
