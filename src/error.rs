//! Error types for the edgequake-pdf2csv library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2CsvError`] — **Fatal**: the batch cannot proceed at all
//!   (unreadable schema, bad input file, provider not configured). Returned
//!   as `Err(Pdf2CsvError)` from the top-level entry points in
//!   [`crate::batch`].
//!
//! * [`RecordError`] — **Non-fatal**: a single page or form failed (model
//!   returned garbage, a page file is corrupt, a form is missing half its
//!   answers) but every other page and form is fine. Collected into
//!   [`crate::output::BatchReport::errors`] so one bad record never aborts
//!   the batch.
//!
//! A dotted field path that does not resolve is not an error at all: it is
//! an unanswered field, see [`crate::answers::resolve_answer`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2csv library.
#[derive(Debug, Error)]
pub enum Pdf2CsvError {
    // ── Schema errors ─────────────────────────────────────────────────────
    /// The form schema is missing, is not JSON, or has no `properties` object.
    #[error("Failed to load form schema '{path}': {reason}")]
    SchemaLoad { path: PathBuf, reason: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or directory was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page failed extraction; there is nothing to tabulate.
    #[error("All {total} pages failed extraction.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2CsvError {
    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2CsvError::OutputWriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single page or form.
///
/// Reported per item; the batch keeps going.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum RecordError {
    /// A page JSON file is missing, unparseable, or not a JSON object.
    #[error("Page file '{path}': {detail}")]
    PageDecode { path: PathBuf, detail: String },

    /// An assembled form did not produce one answer per schema field.
    #[error("Form {form}: {actual} answers for {expected} questions, skipping")]
    FormLengthMismatch {
        form: usize,
        expected: usize,
        actual: usize,
    },

    /// The vision call failed after every retry.
    #[error("Page {page}: extraction failed after {retries} retries: {detail}")]
    ExtractionFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// The vision call timed out.
    #[error("Page {page}: extraction timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The model answered, but not with a JSON object.
    #[error("Page {page}: unusable model response: {detail}")]
    InvalidResponse { page: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_load_display() {
        let e = Pdf2CsvError::SchemaLoad {
            path: PathBuf::from("form_schema.json"),
            reason: "missing `properties` object".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("form_schema.json"), "got: {msg}");
        assert!(msg.contains("properties"), "got: {msg}");
    }

    #[test]
    fn form_length_mismatch_display() {
        let e = RecordError::FormLengthMismatch {
            form: 5,
            expected: 12,
            actual: 6,
        };
        let msg = e.to_string();
        assert!(msg.contains("Form 5"), "got: {msg}");
        assert!(msg.contains("6 answers for 12"), "got: {msg}");
    }

    #[test]
    fn page_decode_display() {
        let e = RecordError::PageDecode {
            path: PathBuf::from("json/page3.json"),
            detail: "expected value at line 1 column 1".into(),
        };
        assert!(e.to_string().contains("page3.json"));
    }

    #[test]
    fn timeout_display() {
        let e = RecordError::Timeout { page: 3, secs: 60 };
        assert!(e.to_string().contains("60s"));
        assert!(e.to_string().contains("Page 3"));
    }

    #[test]
    fn record_error_serialises() {
        let e = RecordError::InvalidResponse {
            page: 2,
            detail: "empty response".into(),
        };
        let json = serde_json::to_string(&e).expect("serialisable");
        assert!(json.contains("InvalidResponse"));
    }
}
