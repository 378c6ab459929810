//! Pipeline stages that turn a PDF into page-answer JSON files.
//!
//! Each submodule implements exactly one step:
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ response ──▶ combine
//! (URL/path) (pdfium)  (base64)   (VLM)   (JSON object) (metadata.json)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to a local file
//! 2. [`render`]   — rasterise selected pages to image files; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`]   — read an image file into a base64 `ImageData`
//! 4. [`llm`]      — one schema-guided vision call per page with retry/backoff
//! 5. [`response`] — clean the reply and parse it as a JSON object
//! 6. [`combine`]  — gather every page answer into one keyed document
//!
//! Turning those JSON files into tables is the job of
//! [`crate::assemble`] and [`crate::table`].

pub mod combine;
pub mod encode;
pub mod input;
pub mod llm;
pub mod render;
pub mod response;
