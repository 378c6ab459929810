//! CLI binary for edgequake-pdf2csv.
//!
//! Maps flags onto `ExtractionConfig`, runs one of the three batch entry
//! points and prints a summary plus one notice per skipped page or form.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2csv::{
    build_tables, extract_directory, process_pdf, BatchProgressCallback, ExtractionConfig,
    FormLayout, FormSchema, ImageFormat, OutputLayout, PageSelection, ProgressCallback,
    RecordError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Progress bar ─────────────────────────────────────────────────────────────

/// Live progress bar over the vision calls. Pages may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<HashMap<usize, Instant>>,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
            failed: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut m) = self.started.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, field_count: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{field_count:>3} fields")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.failed.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.failed.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} pages extracted", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} failed)",
                if success_count == 0 { red("✘") } else { yellow("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole pipeline: render, extract, tabulate
  pdf2csv run intake_forms.pdf --schema form_schema.json

  # Forms whose first page holds the first 7 fields
  pdf2csv run intake_forms.pdf --split-index 7

  # Re-extract existing page images only
  pdf2csv extract generated_files/images_from_pdf

  # Rebuild CSV tables from page answers (no API key needed)
  pdf2csv tables generated_files/json_output

OUTPUT LAYOUT (under --output-root, default generated_files/ next to the PDF):
  images_from_pdf/   page01.png …
  json_output/       page01.json … metadata.json
  csv_output/        page01_cleaned.csv … form_1_merged.csv … forms_merged.csv

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium; system library path otherwise
"#;

/// Turn scanned two-page PDF forms into CSV tables using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2csv",
    version,
    about = "Turn scanned PDF forms into CSV tables using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON Schema describing the form fields.
    #[arg(long, global = true, env = "PDF2CSV_SCHEMA", default_value = "form_schema.json")]
    schema: PathBuf,

    /// Number of schema fields on the first page of each form (default: half).
    #[arg(long, global = true, env = "PDF2CSV_SPLIT_INDEX")]
    split_index: Option<usize>,

    /// Print the batch report as JSON on stdout.
    #[arg(long, global = true, env = "PDF2CSV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2CSV_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a PDF, extract every page and write the CSV tables.
    Run {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Root directory for generated files.
        #[arg(short, long, env = "PDF2CSV_OUTPUT_ROOT")]
        output_root: Option<PathBuf>,

        #[command(flatten)]
        render: RenderArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Extract answers from a directory of page images.
    Extract {
        /// Directory of page images, processed in file-name order.
        image_dir: PathBuf,

        /// Where page answers go (default: json_output/ beside IMAGE_DIR).
        #[arg(long)]
        json_dir: Option<PathBuf>,

        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Build CSV tables from a directory of page answers.
    Tables {
        /// Directory of page answer files.
        json_dir: PathBuf,

        /// Where tables go (default: csv_output/ beside JSON_DIR).
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2CSV_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Page image format.
    #[arg(long, env = "PDF2CSV_IMAGE_FORMAT", value_enum, default_value = "png")]
    image_format: ImageFormatArg,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2CSV_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2CSV_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2CSV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// Vision model ID (default: gpt-4o).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent vision calls.
    #[arg(short, long, env = "PDF2CSV_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Text file whose contents replace the instruction placed before the schema.
    #[arg(long, env = "PDF2CSV_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max output tokens per page.
    #[arg(long, env = "PDF2CSV_MAX_TOKENS", default_value_t = 2000)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF2CSV_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per page on transport failure.
    #[arg(long, env = "PDF2CSV_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-page vision call timeout in seconds.
    #[arg(long, env = "PDF2CSV_API_TIMEOUT", default_value_t = 90)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ImageFormatArg {
    Png,
    Jpeg,
}

impl From<ImageFormatArg> for ImageFormat {
    fn from(v: ImageFormatArg) -> Self {
        match v {
            ImageFormatArg::Png => ImageFormat::Png,
            ImageFormatArg::Jpeg => ImageFormat::Jpeg,
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The progress bar replaces INFO logs; -v brings them back.
    let extracting = !matches!(cli.command, Command::Tables { .. });
    let show_progress = extracting && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let schema = FormSchema::load(&cli.schema).context("Failed to load form schema")?;
    let layout = FormLayout {
        split_index: cli.split_index,
    };
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    match &cli.command {
        Command::Run {
            input,
            output_root,
            render,
            llm,
        } => {
            let config = build_config(Some(render), llm, layout, progress).await?;
            let report = process_pdf(input, &schema, output_root.as_deref(), &config)
                .await
                .context("Processing failed")?;

            if cli.json {
                print_json(&report)?;
            } else if !cli.quiet {
                print_errors(report.errors());
                eprintln!(
                    "{} images processed, {} CSV files generated",
                    report.stats.pages_rendered, report.stats.csv_files
                );
                eprintln!(
                    "   {}/{} forms  {} tokens in  /  {} tokens out  —  {}ms  →  {}",
                    report.stats.forms_accepted,
                    report.stats.forms_attempted,
                    dim(&report.stats.total_input_tokens.to_string()),
                    dim(&report.stats.total_output_tokens.to_string()),
                    report.stats.total_duration_ms,
                    bold(&report.layout.root.display().to_string()),
                );
            }
        }
        Command::Extract {
            image_dir,
            json_dir,
            llm,
        } => {
            let config = build_config(None, llm, layout, progress).await?;
            let json_dir = json_dir
                .clone()
                .unwrap_or_else(|| sibling_dir(image_dir, |l| l.json_dir));
            let pages = extract_directory(image_dir, &json_dir, &schema, &config)
                .await
                .context("Extraction failed")?;

            if cli.json {
                print_json(&pages)?;
            } else if !cli.quiet {
                print_errors(pages.iter().filter_map(|p| p.error.as_ref()));
                let written = pages.iter().filter(|p| p.json_path.is_some()).count();
                eprintln!(
                    "{} images processed, {} answer files in {}",
                    pages.len(),
                    written,
                    bold(&json_dir.display().to_string())
                );
            }
        }
        Command::Tables { json_dir, csv_dir } => {
            let csv_dir = csv_dir
                .clone()
                .unwrap_or_else(|| sibling_dir(json_dir, |l| l.csv_dir));
            let report = build_tables(json_dir, &csv_dir, &schema, layout)
                .await
                .context("Table generation failed")?;

            if cli.json {
                print_json(&report)?;
            } else if !cli.quiet {
                print_errors(report.errors.iter());
                eprintln!(
                    "{}/{} forms accepted, {} CSV files generated in {}",
                    report.forms_accepted.len(),
                    report.forms_attempted,
                    report.csv_file_count(),
                    bold(&csv_dir.display().to_string())
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    render: Option<&RenderArgs>,
    llm: &LlmArgs,
    layout: FormLayout,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .concurrency(llm.concurrency)
        .max_tokens(llm.max_tokens)
        .temperature(llm.temperature)
        .max_retries(llm.max_retries)
        .api_timeout_secs(llm.api_timeout)
        .layout(layout);

    if let Some(ref path) = llm.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {}", path.display()))?;
        builder = builder.prompt(prompt.trim());
    }
    if let Some(ref model) = llm.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = llm.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(render) = render {
        builder = builder
            .dpi(render.dpi)
            .image_format(render.image_format.into())
            .pages(parse_pages(&render.pages)?)
            .download_timeout_secs(render.download_timeout);
        if let Some(ref password) = render.password {
            builder = builder.password(password);
        }
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` into a `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();
    let page = |p: &str| -> Result<usize> {
        let n: usize = p
            .trim()
            .parse()
            .with_context(|| format!("Invalid page number: '{}'", p.trim()))?;
        anyhow::ensure!(n >= 1, "Pages are 1-indexed, minimum is 1 (got {n})");
        Ok(n)
    };

    if s == "all" {
        Ok(PageSelection::All)
    } else if let Some((start, end)) = s.split_once('-') {
        let (start, end) = (page(start)?, page(end)?);
        anyhow::ensure!(start <= end, "Invalid page range '{start}-{end}': start must be <= end");
        Ok(PageSelection::Range(start, end))
    } else if s.contains(',') {
        Ok(PageSelection::Set(
            s.split(',').map(page).collect::<Result<Vec<_>>>()?,
        ))
    } else {
        Ok(PageSelection::Single(page(&s)?))
    }
}

/// Standard layout directory next to `dir`, e.g. `json_output/` for `images_from_pdf/`.
fn sibling_dir(dir: &Path, pick: impl Fn(OutputLayout) -> PathBuf) -> PathBuf {
    let parent = dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    pick(OutputLayout::under(parent))
}

fn print_errors<'a>(errors: impl Iterator<Item = &'a RecordError>) {
    for e in errors {
        eprintln!("  {} {}", yellow("⚠"), e);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise report")?;
    println!("{json}");
    Ok(())
}
