//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};

use crate::output::NamingScheme;

/// Main configuration for pdfimg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfimgConfig {
    /// Output file configuration.
    pub output: OutputConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,
}

/// Output file configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Requested image format name (png, jpeg, ...).
    pub format: String,

    /// How saved files are named.
    pub naming: NamingScheme,

    /// Replace files that already exist in the output directory.
    pub overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "png".to_string(),
            naming: NamingScheme::PageIndex,
            overwrite: false,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Password used for encrypted documents.
    pub password: String,

    /// Follow form XObjects into their own content streams.
    pub include_forms: bool,

    /// Log and skip images that cannot be decoded instead of failing.
    pub skip_undecodable: bool,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            include_forms: true,
            skip_undecodable: true,
            max_pages: 0,
        }
    }
}

impl PdfimgConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
