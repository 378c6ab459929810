//! PDF rasterisation: render selected pages to image files via pdfium.
//!
//! pdfium keeps thread-local state and is not async-safe, so the whole
//! render loop runs inside `tokio::task::spawn_blocking`.
//!
//! Page images are named `page{N}` with `N` zero-padded to the width of the
//! page count (`page01` … `page12`). Later stages pair answer files by
//! lexicographic file name, and the padding keeps that order equal to page
//! order for documents of ten pages or more.

use crate::config::{ExtractionConfig, ImageFormat};
use crate::error::Pdf2CsvError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One page image written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPage {
    /// 1-indexed page number in the source PDF.
    pub page_num: usize,
    pub path: PathBuf,
}

/// File stem for page `page_num` of a `total_pages`-page document.
pub fn page_stem(page_num: usize, total_pages: usize) -> String {
    let width = total_pages.max(1).to_string().len();
    format!("page{page_num:0width$}")
}

/// Bind pdfium from `PDFIUM_LIB_PATH` when set, else from the system library path.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2CsvError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => {
            debug!("Binding pdfium from PDFIUM_LIB_PATH={}", path);
            Pdfium::bind_to_library(&path)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Pdf2CsvError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Rasterise the selected pages of `pdf_path` into `image_dir`.
///
/// # Returns
/// Rendered pages in page order.
pub async fn render_pages(
    pdf_path: &Path,
    image_dir: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<RenderedPage>, Pdf2CsvError> {
    let job = RenderJob {
        pdf_path: pdf_path.to_path_buf(),
        image_dir: image_dir.to_path_buf(),
        dpi: config.dpi,
        max_pixels: config.max_rendered_pixels,
        format: config.image_format,
        password: config.password.clone(),
        selection: config.pages.clone(),
    };

    tokio::task::spawn_blocking(move || job.run())
        .await
        .map_err(|e| Pdf2CsvError::Internal(format!("Render task panicked: {e}")))?
}

struct RenderJob {
    pdf_path: PathBuf,
    image_dir: PathBuf,
    dpi: u32,
    max_pixels: u32,
    format: ImageFormat,
    password: Option<String>,
    selection: crate::config::PageSelection,
}

impl RenderJob {
    fn run(&self) -> Result<Vec<RenderedPage>, Pdf2CsvError> {
        let pdfium = bind_pdfium()?;
        let password = self.password.as_deref();

        let document = pdfium
            .load_pdf_from_file(&self.pdf_path, password)
            .map_err(|e| self.classify_load_error(e))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let indices = self.selection.to_indices(total_pages);
        if indices.is_empty() {
            return Err(Pdf2CsvError::InvalidConfig(format!(
                "page selection {:?} matches no pages (document has {} pages)",
                self.selection, total_pages
            )));
        }

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut rendered = Vec::with_capacity(indices.len());
        for idx in indices {
            let page_num = idx + 1;
            let raster_failed = |e: PdfiumError| Pdf2CsvError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            };

            let page = pages.get(idx as u16).map_err(raster_failed)?;
            let image = page
                .render_with_config(&render_config)
                .map_err(raster_failed)?
                .as_image();

            let path = self.image_dir.join(format!(
                "{}.{}",
                page_stem(page_num, total_pages),
                self.format.extension()
            ));
            save_image(&image, &path, self.format)?;

            debug!(
                "Rendered page {} → {}x{} px → {}",
                page_num,
                image.width(),
                image.height(),
                path.display()
            );
            rendered.push(RenderedPage { page_num, path });
        }

        Ok(rendered)
    }

    fn classify_load_error(&self, e: PdfiumError) -> Pdf2CsvError {
        let detail = format!("{e:?}");
        let path = self.pdf_path.clone();
        if detail.to_lowercase().contains("password") {
            if self.password.is_some() {
                Pdf2CsvError::WrongPassword { path }
            } else {
                Pdf2CsvError::PasswordRequired { path }
            }
        } else {
            Pdf2CsvError::CorruptPdf { path, detail }
        }
    }
}

/// Write `image` to `path`; JPEG drops the alpha channel it cannot store.
fn save_image(image: &DynamicImage, path: &Path, format: ImageFormat) -> Result<(), Pdf2CsvError> {
    let result = match format {
        ImageFormat::Png => image.save_with_format(path, image::ImageFormat::Png),
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .save_with_format(path, image::ImageFormat::Jpeg),
    };
    result.map_err(|e| Pdf2CsvError::write_failed(path, std::io::Error::other(e.to_string())))
}
