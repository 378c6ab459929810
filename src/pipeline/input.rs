//! Input resolution: turn the user's path or URL into a local PDF file.
//!
//! Remote forms are downloaded into a `TempDir` that lives as long as the
//! returned [`ResolvedInput`]. Output directories are derived from the
//! *original* input (see [`ResolvedInput::output_base`]), never from the
//! temporary copy. Both branches check the `%PDF` magic bytes so a stray
//! image or HTML error page fails early with [`Pdf2CsvError::NotAPdf`].

use crate::error::Pdf2CsvError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF ready for rendering.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the `TempDir` holding the download is kept alive here.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// Directory in which `generated_files/` is created by default:
    /// the PDF's parent for local files, the working directory for downloads.
    pub fn output_base(&self) -> PathBuf {
        match self {
            ResolvedInput::Local(p) => p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            ResolvedInput::Downloaded { .. } => PathBuf::from("."),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or HTTP(S) URL to a local PDF.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2CsvError> {
    if input.trim().is_empty() {
        return Err(Pdf2CsvError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// `Err(NotAPdf)` when `head` holds at least four bytes that are not `%PDF`.
fn check_magic(path: &Path, head: &[u8]) -> Result<(), Pdf2CsvError> {
    match head.get(..4) {
        Some(first) if first != PDF_MAGIC => {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(first);
            Err(Pdf2CsvError::NotAPdf {
                path: path.to_path_buf(),
                magic,
            })
        }
        _ => Ok(()),
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Pdf2CsvError> {
    let path = PathBuf::from(path_str);

    let mut file = std::fs::File::open(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2CsvError::PermissionDenied {
            path: path.clone(),
        },
        _ => Pdf2CsvError::FileNotFound { path: path.clone() },
    })?;

    let mut head = [0u8; 4];
    if file.read_exact(&mut head).is_ok() {
        check_magic(&path, &head)?;
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2CsvError> {
    info!("Downloading form PDF from: {}", url);

    let failed = |reason: String| Pdf2CsvError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2CsvError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(failed(format!("HTTP {status}")));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| Pdf2CsvError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));
    check_magic(&file_path, &bytes)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Pdf2CsvError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
