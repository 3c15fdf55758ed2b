//! Output image formats.

use std::fmt;
use std::io::{Seek, Write};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

/// Largest edge the ICO container can hold.
const ICO_MAX_SIZE: u32 = 256;

/// Image formats extracted images can be written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Bmp,
    Gif,
    Icon,
    Jpeg,
    Png,
    Tiff,
    Webp,
}

impl OutputFormat {
    /// All formats, sorted by name.
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Bmp,
        OutputFormat::Gif,
        OutputFormat::Icon,
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Tiff,
        OutputFormat::Webp,
    ];

    /// Parse a format name, ignoring case and surrounding whitespace.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bmp" => Some(OutputFormat::Bmp),
            "gif" => Some(OutputFormat::Gif),
            "icon" | "ico" => Some(OutputFormat::Icon),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "tiff" | "tif" => Some(OutputFormat::Tiff),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }

    /// Resolve an optional requested name, falling back to PNG.
    pub fn resolve(name: Option<&str>) -> Self {
        match name {
            None => OutputFormat::Png,
            Some(n) => Self::parse(n).unwrap_or_else(|| {
                warn!("Unknown image format '{}', using png", n.trim());
                OutputFormat::Png
            }),
        }
    }

    /// Canonical names, sorted.
    pub fn supported_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.name()).collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Bmp => "bmp",
            OutputFormat::Gif => "gif",
            OutputFormat::Icon => "icon",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Webp => "webp",
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Icon => "ico",
            OutputFormat::Jpeg => "jpg",
            other => other.name(),
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Bmp => ImageFormat::Bmp,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Icon => ImageFormat::Ico,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::Webp => ImageFormat::WebP,
        }
    }

    /// Encode `image` into `writer`, converting pixel layouts the encoder
    /// does not accept.
    pub fn encode<W: Write + Seek>(&self, image: &DynamicImage, writer: &mut W) -> image::ImageResult<()> {
        let prepared = self.prepare(image);
        prepared
            .as_ref()
            .unwrap_or(image)
            .write_to(writer, self.image_format())
    }

    /// Returns a converted copy when the encoder cannot take `image` as is.
    fn prepare(&self, image: &DynamicImage) -> Option<DynamicImage> {
        let has_alpha = image.color().has_alpha();
        let eight_bit = image.color().bytes_per_pixel() == image.color().channel_count();

        match self {
            OutputFormat::Png | OutputFormat::Tiff => None,
            OutputFormat::Jpeg => match image {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => None,
                _ => Some(DynamicImage::ImageRgb8(image.to_rgb8())),
            },
            OutputFormat::Gif => match image {
                DynamicImage::ImageRgba8(_) => None,
                _ => Some(DynamicImage::ImageRgba8(image.to_rgba8())),
            },
            OutputFormat::Bmp | OutputFormat::Webp => {
                if eight_bit && !matches!(image, DynamicImage::ImageLumaA8(_)) {
                    None
                } else if has_alpha {
                    Some(DynamicImage::ImageRgba8(image.to_rgba8()))
                } else {
                    Some(DynamicImage::ImageRgb8(image.to_rgb8()))
                }
            }
            OutputFormat::Icon => {
                let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
                if image.width() > ICO_MAX_SIZE || image.height() > ICO_MAX_SIZE {
                    debug!(
                        "Downscaling {}x{} image to fit an icon",
                        image.width(),
                        image.height()
                    );
                    Some(rgba.resize(ICO_MAX_SIZE, ICO_MAX_SIZE, FilterType::Lanczos3))
                } else {
                    Some(rgba)
                }
            }
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Png
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
