//! Page loop that drives the content processor and the image saver.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{ExtractError, PdfError};
use crate::models::PdfimgConfig;
use crate::output::{ImageSaver, OutputFormat, SavedImage, SkippedItem};
use crate::pdf::{ContentProcessor, PdfDocument};
use crate::Result;

/// Outcome of an extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Number of pages processed.
    pub pages: u32,
    /// Format the images were written in.
    pub format: OutputFormat,
    /// Images written, in page and drawing order.
    pub saved: Vec<SavedImage>,
    /// Images and pages that were skipped.
    pub skipped: Vec<SkippedItem>,
}

/// Extracts the images of PDF documents according to a configuration.
pub struct Extractor {
    config: PdfimgConfig,
}

impl Extractor {
    pub fn new(config: PdfimgConfig) -> Self {
        Self { config }
    }

    /// Open the PDF at `pdf_path` with the configured password.
    pub fn open(&self, pdf_path: &Path) -> Result<PdfDocument> {
        Ok(PdfDocument::open(pdf_path, &self.config.pdf.password)?)
    }

    /// Open `pdf_path`, save its images into `output_dir`, and close it.
    pub fn extract(&self, pdf_path: &Path, output_dir: &Path) -> Result<ExtractionReport> {
        let document = self.open(pdf_path)?;
        self.extract_document(&document, output_dir, |_, _| {})
    }

    /// Save the images of an open document into `output_dir`.
    ///
    /// `on_page` is called after each page with the page number and the
    /// number of pages that will be processed.
    pub fn extract_document<F>(
        &self,
        document: &PdfDocument,
        output_dir: &Path,
        mut on_page: F,
    ) -> Result<ExtractionReport>
    where
        F: FnMut(u32, u32),
    {
        if !output_dir.is_dir() {
            return Err(ExtractError::Config(format!(
                "output directory does not exist: {}",
                output_dir.display()
            )));
        }

        let format = OutputFormat::resolve(Some(self.config.output.format.as_str()));
        let pdf_config = &self.config.pdf;

        let total = match pdf_config.max_pages {
            0 => document.page_count(),
            max => document.page_count().min(u32::try_from(max).unwrap_or(u32::MAX)),
        };

        let namer = self.config.output.naming.namer(document.page_digits());
        let mut saver = ImageSaver::new(output_dir, format, namer)
            .with_overwrite(self.config.output.overwrite)
            .with_skip_undecodable(pdf_config.skip_undecodable);

        for (page, page_id) in document.page_ids().take(total as usize) {
            saver.start_page(page);
            let before = saver.saved().len();

            let result = ContentProcessor::new(document, &mut saver)
                .with_forms(pdf_config.include_forms)
                .process_page(page, page_id);

            match result {
                Ok(()) => {}
                Err(ExtractError::Pdf(e @ PdfError::Content { .. })) if pdf_config.skip_undecodable => {
                    warn!("Skipping rest of page {}: {}", page, e);
                    saver.skip("page content", &e);
                }
                Err(e) => return Err(e),
            }

            debug!("Page {}: saved {} images", page, saver.saved().len() - before);
            on_page(page, total);
        }

        let (saved, skipped) = saver.finish();
        info!(
            "Extracted {} images from {} pages ({} skipped)",
            saved.len(),
            total,
            skipped.len()
        );

        Ok(ExtractionReport { pages: total, format, saved, skipped })
    }
}
