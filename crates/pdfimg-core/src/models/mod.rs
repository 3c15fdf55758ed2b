//! Data models shared across the pipeline.

pub mod config;

pub use config::{OutputConfig, PdfConfig, PdfimgConfig};
