//! PDF processing module.

mod document;
mod image;
mod inline;
mod matrix;
mod processor;

pub use document::PdfDocument;
pub use image::{ColorSpace, PdfImage};
pub use matrix::Matrix;
pub use processor::{ContentProcessor, EventKind, ImageRenderInfo, RenderEvent, RenderListener};

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;
