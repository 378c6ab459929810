//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline sends each page to the vision model. The CLI uses
//! it to drive its progress bar; library users can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2csv::{BatchProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, field_count: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} top-level fields", page_num, total_pages, field_count);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it extracts each page.
///
/// Pages may be extracted concurrently, so implementations must be
/// `Send + Sync` and protect any shared mutable state. Every method has a
/// no-op default.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first page is sent for extraction.
    fn on_batch_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the vision request is sent for a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's answers were parsed and written to disk.
    ///
    /// `field_count` is the number of top-level keys in the model's answer.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, field_count: usize) {
        let _ = (page_num, total_pages, field_count);
    }

    /// Called when a page fails after all retries, or the reply is unusable.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been attempted.
    fn on_batch_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
