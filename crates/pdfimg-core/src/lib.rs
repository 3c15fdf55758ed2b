//! Core library for saving the embedded images of PDF documents.
//!
//! This crate provides:
//! - PDF loading and page resource lookup (lopdf)
//! - A content-stream processor that reports every image drawn on a page
//! - Decoding of image XObjects into bitmaps
//! - Output formats, file naming, and the listener that writes images to disk

pub mod error;
pub mod extract;
pub mod models;
pub mod output;
pub mod pdf;

#[cfg(test)]
mod test_helpers;

pub use error::{ExtractError, PdfError, Result};
pub use extract::{ExtractionReport, Extractor};
pub use models::config::PdfimgConfig;
pub use output::{ImageSaver, NamingScheme, OutputFormat, SavedImage, SkippedItem};
pub use pdf::{ContentProcessor, PdfDocument, RenderEvent, RenderListener};
