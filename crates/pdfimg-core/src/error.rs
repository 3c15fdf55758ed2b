//! Error types for the pdfimg-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the pdfimg library.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Image encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output file exists and overwriting is disabled.
    #[error("output file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// A page content stream could not be decoded.
    #[error("failed to decode content of page {page}: {reason}")]
    Content { page: u32, reason: String },

    /// The PDF is encrypted and the password did not open it.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// The image dictionary is missing a key or holds a bad value.
    #[error("malformed image dictionary: {0}")]
    ImageDict(String),

    /// The image stream uses a filter we cannot decode.
    #[error("unsupported image filter: {0}")]
    UnsupportedFilter(String),

    /// The image uses a color space we cannot convert.
    #[error("unsupported color space: {0}")]
    UnsupportedColorSpace(String),

    /// The image samples could not be turned into a bitmap.
    #[error("bad image data: {0}")]
    ImageData(String),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Parse(e.to_string())
    }
}

/// Result type for the pdfimg library.
pub type Result<T> = std::result::Result<T, ExtractError>;
