//! End-to-end entry points.
//!
//! | Function                | From            | To                         |
//! |-------------------------|-----------------|----------------------------|
//! | [`process_pdf`]         | PDF path or URL | images, page JSON, CSVs    |
//! | [`extract_directory`]   | page images     | page JSON + `metadata.json`|
//! | [`build_tables`]        | page JSON       | CSV tables                 |
//!
//! Page answers always go through the filesystem: tables are built from the
//! sorted listing of `json_output/`, never from in-memory completion order,
//! so concurrent extraction cannot change the output. An extraction run
//! therefore starts by clearing the page answers of any earlier run, and a
//! table run by clearing earlier tables; otherwise leftovers from another
//! PDF sharing the output root would be paired with this one's pages.

use crate::answers::extract_answers;
use crate::assemble::{assemble_forms, list_page_files, read_page_record};
use crate::config::{ExtractionConfig, FormLayout};
use crate::error::{Pdf2CsvError, RecordError};
use crate::output::{create_dir, BatchReport, BatchStats, OutputLayout, PageOutcome, TableReport};
use crate::pipeline::combine::{write_combined, COMBINED_FILE_NAME};
use crate::pipeline::encode::{encode_image_file, mime_for_path};
use crate::pipeline::llm::VisionModel;
use crate::pipeline::{input, llm, render};
use crate::prompts::extraction_prompt;
use crate::schema::FormSchema;
use crate::table::{
    form_table_file_name, is_generated_table, page_table_file_name, AnswerTable,
    MERGED_TABLE_FILE_NAME,
};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run the whole pipeline on one PDF.
///
/// Generated files go under `output_root`, or `generated_files/` next to
/// the PDF when `None` (the working directory for URL inputs).
///
/// # Errors
/// Only fatal errors are returned: unreadable input, a PDF that cannot be
/// rendered, no provider, every page failing, or an output write failure.
/// Per-page and per-form problems are in [`BatchReport::errors`].
pub async fn process_pdf(
    input_str: impl AsRef<str>,
    schema: &FormSchema,
    output_root: Option<&Path>,
    config: &ExtractionConfig,
) -> Result<BatchReport, Pdf2CsvError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Processing {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let root = output_root
        .map(Path::to_path_buf)
        .unwrap_or_else(|| resolved.output_base().join(OutputLayout::DEFAULT_ROOT));
    let layout = OutputLayout::under(root);
    layout.create_all()?;

    // Fail on a missing API key before spending time on rendering.
    let provider = llm::resolve_provider(config)?;

    remove_files(&list_image_files(&layout.image_dir)?)?;
    let render_start = Instant::now();
    let rendered = render::render_pages(resolved.path(), &layout.image_dir, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", rendered.len(), render_duration_ms);

    let images: Vec<(usize, PathBuf)> = rendered
        .into_iter()
        .map(|page| (page.page_num, page.path))
        .collect();

    let llm_start = Instant::now();
    let pages = extract_images(&provider, &images, &layout.json_dir, schema, config).await?;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    let tables = build_tables(&layout.json_dir, &layout.csv_dir, schema, config.layout).await?;

    let mut stats = page_stats(&pages);
    stats.pages_rendered = images.len();
    stats.forms_attempted = tables.forms_attempted;
    stats.forms_accepted = tables.forms_accepted.len();
    stats.csv_files = tables.csv_file_count();
    stats.render_duration_ms = render_duration_ms;
    stats.llm_duration_ms = llm_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "{} images processed, {} CSV files generated",
        stats.pages_rendered, stats.csv_files
    );

    Ok(BatchReport {
        layout,
        pages,
        tables,
        stats,
    })
}

/// Blocking wrapper around [`process_pdf`] for callers without a runtime.
pub fn process_pdf_sync(
    input_str: impl AsRef<str>,
    schema: &FormSchema,
    output_root: Option<&Path>,
    config: &ExtractionConfig,
) -> Result<BatchReport, Pdf2CsvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2CsvError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(process_pdf(input_str, schema, output_root, config))
}

/// Send every image in `image_dir` to the vision model and write one
/// `{stem}.json` per page into `json_dir`, then refresh `metadata.json`.
///
/// Images are taken in file-name order and numbered from 1 in that order.
pub async fn extract_directory(
    image_dir: &Path,
    json_dir: &Path,
    schema: &FormSchema,
    config: &ExtractionConfig,
) -> Result<Vec<PageOutcome>, Pdf2CsvError> {
    let images: Vec<(usize, PathBuf)> = list_image_files(image_dir)?
        .into_iter()
        .enumerate()
        .map(|(i, path)| (i + 1, path))
        .collect();
    if images.is_empty() {
        warn!("No page images found in {}", image_dir.display());
    }

    let provider = llm::resolve_provider(config)?;
    extract_images(&provider, &images, json_dir, schema, config).await
}

/// Build every CSV table from the page files in `json_dir`.
///
/// Writes `{stem}_cleaned.csv` per readable page, `form_{n}_merged.csv` per
/// accepted form and `forms_merged.csv` across all accepted forms. Tables
/// from an earlier run are removed first, so a form rejected now leaves no
/// file behind; identical inputs give byte-identical files.
pub async fn build_tables(
    json_dir: &Path,
    csv_dir: &Path,
    schema: &FormSchema,
    layout: FormLayout,
) -> Result<TableReport, Pdf2CsvError> {
    let json_dir = json_dir.to_path_buf();
    let csv_dir = csv_dir.to_path_buf();
    let schema = schema.clone();
    tokio::task::spawn_blocking(move || write_tables(&json_dir, &csv_dir, &schema, layout))
        .await
        .map_err(|e| Pdf2CsvError::Internal(format!("Table task panicked: {e}")))?
}

/// Synchronous body of [`build_tables`].
pub fn write_tables(
    json_dir: &Path,
    csv_dir: &Path,
    schema: &FormSchema,
    layout: FormLayout,
) -> Result<TableReport, Pdf2CsvError> {
    create_dir(csv_dir)?;
    let page_files = list_page_files(json_dir)?;
    remove_files(&list_generated_tables(csv_dir)?)?;
    let mut report = TableReport::default();

    for path in &page_files {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        // Unreadable pages are reported once, by form assembly below.
        let record = match read_page_record(path) {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping page table: {}", e);
                continue;
            }
        };
        let out = csv_dir.join(page_table_file_name(stem));
        AnswerTable::for_page(&extract_answers(&record, schema.fields())).write_to(&out)?;
        report.page_tables.push(out);
    }

    let assembly = assemble_forms(&page_files, schema, layout);
    let labels: Vec<String> = schema.labels().map(str::to_string).collect();

    for form in &assembly.forms {
        let out = csv_dir.join(form_table_file_name(form.number));
        AnswerTable::for_forms(&labels, std::slice::from_ref(form)).write_to(&out)?;
        report.form_tables.push(out);
    }

    if assembly.attempted > 0 {
        let out = csv_dir.join(MERGED_TABLE_FILE_NAME);
        AnswerTable::for_forms(&labels, &assembly.forms).write_to(&out)?;
        report.merged_table = Some(out);
    }

    report.forms_attempted = assembly.attempted;
    report.forms_accepted = assembly.forms.iter().map(|f| f.number).collect();
    report.errors = assembly.errors;

    info!(
        "Tables: {} pages, {}/{} forms accepted, {} CSV files in {}",
        report.page_tables.len(),
        report.forms_accepted.len(),
        report.forms_attempted,
        report.csv_file_count(),
        csv_dir.display()
    );
    Ok(report)
}

/// Page images in `dir`, sorted by file name.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, Pdf2CsvError> {
    let entries = std::fs::read_dir(dir).map_err(|_| Pdf2CsvError::FileNotFound {
        path: dir.to_path_buf(),
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && mime_for_path(p).is_some())
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Replace the contents of `json_dir` with answers for `images`, then
/// refresh `metadata.json`.
async fn extract_images<M: VisionModel>(
    model: &M,
    images: &[(usize, PathBuf)],
    json_dir: &Path,
    schema: &FormSchema,
    config: &ExtractionConfig,
) -> Result<Vec<PageOutcome>, Pdf2CsvError> {
    create_dir(json_dir)?;
    let mut stale = list_page_files(json_dir)?;
    stale.push(json_dir.join(COMBINED_FILE_NAME));
    remove_files(&stale)?;

    let pages = extract_pages(model, images, json_dir, schema, config).await?;
    combine(json_dir).await?;
    Ok(pages)
}

async fn extract_pages<M: VisionModel>(
    model: &M,
    images: &[(usize, PathBuf)],
    json_dir: &Path,
    schema: &FormSchema,
    config: &ExtractionConfig,
) -> Result<Vec<PageOutcome>, Pdf2CsvError> {
    let total = images.len();
    let prompt = extraction_prompt(config.prompt.as_deref(), schema.document());
    let prompt = prompt.as_str();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let results: Vec<Result<PageOutcome, Pdf2CsvError>> =
        stream::iter(images.iter().map(|(page_num, image_path)| async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(*page_num, total);
            }
            let outcome =
                extract_one(model, *page_num, image_path, json_dir, prompt, config).await?;
            if let Some(ref cb) = config.progress_callback {
                match (&outcome.error, &outcome.answer) {
                    (None, Some(answer)) => cb.on_page_complete(*page_num, total, answer.len()),
                    (Some(e), _) => cb.on_page_error(*page_num, total, &e.to_string()),
                    (None, None) => cb.on_page_error(*page_num, total, "no answer"),
                }
            }
            Ok::<_, Pdf2CsvError>(outcome)
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    let mut pages = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    pages.sort_by_key(|p| p.page_num);

    let succeeded = pages.iter().filter(|p| p.is_success()).count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, succeeded);
    }

    if total > 0 && succeeded == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Pdf2CsvError::AllPagesFailed { total, first_error });
    }

    info!("Extracted {}/{} pages", succeeded, total);
    Ok(pages)
}

async fn extract_one<M: VisionModel>(
    model: &M,
    page_num: usize,
    image_path: &Path,
    json_dir: &Path,
    prompt: &str,
    config: &ExtractionConfig,
) -> Result<PageOutcome, Pdf2CsvError> {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("page{page_num}"));
    let json_path = json_dir.join(format!("{stem}.json"));

    let mut outcome = match encode_image_file(image_path).await {
        Ok(image) => llm::extract_page(model, page_num, image, prompt, config).await,
        Err(e) => {
            warn!("Page {}: cannot read {}: {}", page_num, image_path.display(), e);
            let mut outcome = PageOutcome::new(page_num);
            outcome.error = Some(RecordError::ExtractionFailed {
                page: page_num,
                retries: 0,
                detail: format!("image read failed: {e}"),
            });
            outcome
        }
    };
    outcome.image_path = Some(image_path.to_path_buf());

    if let (Some(answer), None) = (&outcome.answer, &outcome.error) {
        let text = serde_json::to_string_pretty(&Value::Object(answer.clone()))
            .map_err(|e| Pdf2CsvError::Internal(format!("serialise page answer: {e}")))?;
        tokio::fs::write(&json_path, text)
            .await
            .map_err(|e| Pdf2CsvError::write_failed(&json_path, e))?;
        debug!("Page {}: answers saved to {}", page_num, json_path.display());
        outcome.json_path = Some(json_path);
    }

    Ok(outcome)
}

async fn combine(json_dir: &Path) -> Result<(), Pdf2CsvError> {
    let json_dir = json_dir.to_path_buf();
    // Pages left out of metadata.json are reported by table assembly.
    let _left_out = tokio::task::spawn_blocking(move || write_combined(&json_dir))
        .await
        .map_err(|e| Pdf2CsvError::Internal(format!("Combine task panicked: {e}")))??;
    Ok(())
}

/// CSV files in `csv_dir` named like tables this crate writes.
fn list_generated_tables(csv_dir: &Path) -> Result<Vec<PathBuf>, Pdf2CsvError> {
    let entries = std::fs::read_dir(csv_dir).map_err(|_| Pdf2CsvError::FileNotFound {
        path: csv_dir.to_path_buf(),
    })?;
    Ok(entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(is_generated_table)
        })
        .collect())
}

fn remove_files(paths: &[PathBuf]) -> Result<(), Pdf2CsvError> {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed stale {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Pdf2CsvError::write_failed(path, e)),
        }
    }
    Ok(())
}

fn page_stats(pages: &[PageOutcome]) -> BatchStats {
    BatchStats {
        pages_extracted: pages.iter().filter(|p| p.is_success()).count(),
        pages_failed: pages.iter().filter(|p| !p.is_success()).count(),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        ..Default::default()
    }
}
