//! CSV rendering of answers.
//!
//! Three table shapes are produced, all with the question label as the
//! leading column and one row per schema field:
//!
//! | Table | Header |
//! |-------|--------|
//! | per page (`page1_cleaned.csv`) | `Question,Answer` |
//! | per form (`form_1_merged.csv`) | `Question,Form_1` |
//! | whole batch (`forms_merged.csv`) | `Question,Form_1,Form_2,…` |
//!
//! Files are overwritten in place. Output is a pure function of the input
//! files, so rerunning a batch reproduces byte-identical tables.

use crate::answers::Answer;
use crate::assemble::AssembledForm;
use crate::error::Pdf2CsvError;
use std::io;
use std::path::Path;

/// Header of the leading label column.
pub const QUESTION_HEADER: &str = "Question";
/// Header of the value column in per-page tables.
pub const ANSWER_HEADER: &str = "Answer";
/// File name of the batch-wide merged table.
pub const MERGED_TABLE_FILE_NAME: &str = "forms_merged.csv";

/// File name of the per-page table for a page answer file with stem `stem`.
pub fn page_table_file_name(stem: &str) -> String {
    format!("{stem}_cleaned.csv")
}

/// File name of the per-form table.
pub fn form_table_file_name(form_number: usize) -> String {
    format!("form_{form_number}_merged.csv")
}

/// Whether `file_name` is one of the tables named above.
pub fn is_generated_table(file_name: &str) -> bool {
    if file_name == MERGED_TABLE_FILE_NAME || file_name.ends_with("_cleaned.csv") {
        return true;
    }
    file_name
        .strip_prefix("form_")
        .and_then(|rest| rest.strip_suffix("_merged.csv"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// A rectangular table of cell text with a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl AnswerTable {
    /// `Question,Answer` table for a single page.
    pub fn for_page(answers: &[Answer]) -> Self {
        Self {
            headers: vec![QUESTION_HEADER.to_string(), ANSWER_HEADER.to_string()],
            rows: answers
                .iter()
                .map(|a| vec![a.label.clone(), a.cell()])
                .collect(),
        }
    }

    /// One column per form, one row per label.
    ///
    /// Every form must carry one answer per label, which
    /// [`crate::assemble::assemble_forms`] guarantees for accepted forms.
    pub fn for_forms(labels: &[String], forms: &[AssembledForm]) -> Self {
        let mut headers = Vec::with_capacity(forms.len() + 1);
        headers.push(QUESTION_HEADER.to_string());
        headers.extend(forms.iter().map(AssembledForm::column_name));

        let rows = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let mut row = Vec::with_capacity(forms.len() + 1);
                row.push(label.clone());
                row.extend(
                    forms
                        .iter()
                        .map(|f| f.answers.get(i).map(Answer::cell).unwrap_or_default()),
                );
                row
            })
            .collect();

        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Serialise as CSV (LF line endings, minimal quoting).
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut w = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        w.write_record(&self.headers)?;
        for row in &self.rows {
            w.write_record(row)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, Pdf2CsvError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)
            .map_err(|e| Pdf2CsvError::Internal(format!("CSV encoding failed: {e}")))?;
        String::from_utf8(buf).map_err(|e| Pdf2CsvError::Internal(e.to_string()))
    }

    /// Write the table to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<(), Pdf2CsvError> {
        let file =
            std::fs::File::create(path).map_err(|e| Pdf2CsvError::write_failed(path, e))?;
        self.write_csv(io::BufWriter::new(file))
            .map_err(|e| Pdf2CsvError::write_failed(path, e.into()))
    }
}
