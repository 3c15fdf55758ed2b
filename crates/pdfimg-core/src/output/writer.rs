//! Listener that saves every rendered image to a directory.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, warn};

use super::format::OutputFormat;
use super::naming::ImageNamer;
use crate::error::{ExtractError, PdfError};
use crate::pdf::{EventKind, ImageRenderInfo, RenderEvent, RenderListener};
use crate::Result;

/// An image written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    /// Page number (1-indexed).
    pub page: u32,
    /// Position among the images saved from this page (1-indexed).
    pub index: u32,
    /// Path of the written file.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Final filter of the source stream (DCTDecode, FlateDecode, ...).
    pub filter: Option<String>,
}

/// Something that was not written, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    /// Page number (1-indexed).
    pub page: u32,
    /// Resource name of the image, or a description of what was skipped.
    pub item: String,
    /// Reason it was skipped.
    pub reason: String,
}

/// Decodes each rendered image and writes it to the output directory.
pub struct ImageSaver {
    output_dir: PathBuf,
    format: OutputFormat,
    namer: Box<dyn ImageNamer>,
    overwrite: bool,
    skip_undecodable: bool,
    page: u32,
    index: u32,
    saved: Vec<SavedImage>,
    skipped: Vec<SkippedItem>,
}

impl ImageSaver {
    pub fn new(output_dir: &Path, format: OutputFormat, namer: Box<dyn ImageNamer>) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            format,
            namer,
            overwrite: false,
            skip_undecodable: true,
            page: 0,
            index: 0,
            saved: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Replace files that already exist.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Skip images that cannot be decoded instead of failing.
    pub fn with_skip_undecodable(mut self, skip: bool) -> Self {
        self.skip_undecodable = skip;
        self
    }

    /// Prepare for the images of `page`.
    pub fn start_page(&mut self, page: u32) {
        self.page = page;
        self.index = 0;
        self.namer.start_page(page);
    }

    /// Record something on the current page that was not saved.
    pub fn skip(&mut self, item: impl Into<String>, reason: impl ToString) {
        self.skipped.push(SkippedItem {
            page: self.page,
            item: item.into(),
            reason: reason.to_string(),
        });
    }

    pub fn saved(&self) -> &[SavedImage] {
        &self.saved
    }

    pub fn skipped(&self) -> &[SkippedItem] {
        &self.skipped
    }

    /// Consume the saver, returning what was saved and skipped.
    pub fn finish(self) -> (Vec<SavedImage>, Vec<SkippedItem>) {
        (self.saved, self.skipped)
    }

    fn save(&mut self, info: &ImageRenderInfo<'_>) -> Result<()> {
        let decoded = info.image().and_then(|img| {
            let filter = img.encoding().map(str::to_string);
            img.decode().map(|bitmap| (bitmap, filter))
        });

        let (bitmap, filter) = match decoded {
            Ok(d) => d,
            Err(e) if self.skip_undecodable && is_image_problem(&e) => {
                warn!("Skipping {} on page {}: {}", info.label(), info.page, e);
                let item = if info.inline { info.label() } else { info.name.clone() };
                self.skip(item, &e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let name = self.namer.next_name(self.format.extension());
        let path = self.output_dir.join(name);
        self.write(&bitmap, &path)?;

        self.index += 1;
        debug!(
            "Saved {} from page {} as {} ({}x{})",
            info.label(),
            info.page,
            path.display(),
            bitmap.width(),
            bitmap.height()
        );
        self.saved.push(SavedImage {
            page: info.page,
            index: self.index,
            path,
            width: bitmap.width(),
            height: bitmap.height(),
            filter,
        });
        Ok(())
    }

    fn write(&self, bitmap: &DynamicImage, path: &Path) -> Result<()> {
        let file = if self.overwrite {
            File::create(path)?
        } else {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => ExtractError::AlreadyExists(path.to_path_buf()),
                    _ => ExtractError::Io(e),
                })?
        };

        let mut writer = BufWriter::new(file);
        self.format.encode(bitmap, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Errors that concern one image rather than the document as a whole.
fn is_image_problem(e: &PdfError) -> bool {
    matches!(
        e,
        PdfError::ImageDict(_)
            | PdfError::UnsupportedFilter(_)
            | PdfError::UnsupportedColorSpace(_)
            | PdfError::ImageData(_)
    )
}

impl RenderListener for ImageSaver {
    fn supported_events(&self) -> &[EventKind] {
        &[EventKind::RenderImage]
    }

    fn event_occurred(&mut self, event: &RenderEvent<'_>) -> Result<()> {
        match event {
            RenderEvent::Image(info) => self.save(info),
        }
    }
}
