//! # edgequake-pdf2csv
//!
//! Turn scanned paper forms into CSV tables with a Vision Language Model
//! and a JSON Schema.
//!
//! Each form is two PDF pages. Every page is rendered to an image, the image
//! is sent to a VLM together with the form's JSON Schema, and the reply is
//! kept as one JSON object per page. Pages are then paired into forms and
//! flattened into `Question,Answer` tables, one row per schema field.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Render   rasterise pages via pdfium (spawn_blocking)   → images_from_pdf/
//!  ├─ 3. Extract  concurrent schema-guided VLM calls per page   → json_output/
//!  ├─ 4. Combine  all page answers in one document              → metadata.json
//!  └─ 5. Tables   pair pages into forms, write CSV              → csv_output/
//! ```
//!
//! Steps 1–4 need a PDF renderer and a model; step 5 is plain file work and
//! can be rerun on its own with [`build_tables`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2csv::{process_pdf, ExtractionConfig, FormSchema};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let schema = FormSchema::load("form_schema.json")?;
//!     let config = ExtractionConfig::default();
//!     let report = process_pdf("intake_forms.pdf", &schema, None, &config).await?;
//!     println!(
//!         "{} images processed, {} CSV files generated",
//!         report.stats.pages_rendered, report.stats.csv_files
//!     );
//!     for e in report.errors() {
//!         eprintln!("skipped: {e}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2csv` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod answers;
pub mod assemble;
pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use answers::{answer_cell, extract_answers, resolve_answer, Answer};
pub use assemble::{assemble_forms, list_page_files, AssembledForm, Assembly};
pub use batch::{build_tables, extract_directory, process_pdf, process_pdf_sync, write_tables};
pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, FormLayout, ImageFormat, PageSelection,
    DEFAULT_MODEL,
};
pub use error::{Pdf2CsvError, RecordError};
pub use output::{BatchReport, BatchStats, OutputLayout, PageOutcome, TableReport};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{FormSchema, SchemaField};
pub use table::AnswerTable;
