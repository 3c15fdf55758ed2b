//! Decoding image XObjects into bitmaps.

use std::io::Read;

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::trace;

use super::Result;
use crate::error::PdfError;

/// Color space of an image XObject, reduced to what we can convert.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette image: `hival + 1` entries in `base`, packed in `lookup`.
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    /// Number of color components per sample.
    pub fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    /// Resolve a `/ColorSpace` value (name, array, or reference).
    pub fn from_object(doc: &Document, obj: &Object) -> Result<Self> {
        let (_, obj) = doc.dereference(obj)?;
        match obj {
            Object::Name(name) => Self::from_name(name),
            Object::Array(arr) => {
                let family = arr
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .ok_or_else(|| PdfError::ImageDict("empty color space array".to_string()))?;
                match family {
                    b"ICCBased" => {
                        let stream = arr
                            .get(1)
                            .and_then(|o| doc.dereference(o).ok())
                            .and_then(|(_, o)| o.as_stream().ok())
                            .ok_or_else(|| PdfError::ImageDict("ICCBased without profile stream".to_string()))?;
                        match stream.dict.get(b"N").and_then(Object::as_i64) {
                            Ok(1) => Ok(ColorSpace::Gray),
                            Ok(3) => Ok(ColorSpace::Rgb),
                            Ok(4) => Ok(ColorSpace::Cmyk),
                            _ => match stream.dict.get(b"Alternate") {
                                Ok(alt) => Self::from_object(doc, alt),
                                Err(_) => Err(PdfError::ImageDict("ICCBased profile without /N".to_string())),
                            },
                        }
                    }
                    b"Indexed" | b"I" => Self::indexed(doc, arr),
                    b"CalGray" | b"CalRGB" | b"CalCMYK" => Self::from_name(family),
                    other => Err(PdfError::UnsupportedColorSpace(
                        String::from_utf8_lossy(other).into_owned(),
                    )),
                }
            }
            other => Err(PdfError::ImageDict(format!("color space is {}", kind(other)))),
        }
    }

    fn from_name(name: &[u8]) -> Result<Self> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" | b"CalCMYK" => Ok(ColorSpace::Cmyk),
            other => Err(PdfError::UnsupportedColorSpace(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    fn indexed(doc: &Document, arr: &[Object]) -> Result<Self> {
        if arr.len() != 4 {
            return Err(PdfError::ImageDict("Indexed color space needs 4 entries".to_string()));
        }
        let base = Self::from_object(doc, &arr[1])?;
        if matches!(base, ColorSpace::Indexed { .. }) {
            return Err(PdfError::UnsupportedColorSpace("nested Indexed".to_string()));
        }
        let hival = doc
            .dereference(&arr[2])?
            .1
            .as_i64()
            .map_err(|_| PdfError::ImageDict("Indexed hival is not a number".to_string()))?
            .clamp(0, 255) as u8;
        let lookup = match doc.dereference(&arr[3])?.1 {
            Object::String(bytes, _) => bytes.clone(),
            Object::Stream(stream) => stream_bytes(stream)?,
            other => {
                return Err(PdfError::ImageDict(format!("Indexed lookup is {}", kind(other))));
            }
        };
        Ok(ColorSpace::Indexed { base: Box::new(base), hival, lookup })
    }
}

/// An image XObject and the dictionary entries needed to decode it.
pub struct PdfImage<'a> {
    doc: &'a Document,
    stream: &'a Stream,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bits per color component.
    pub bits_per_component: u8,
    /// Filter names applied to the stream, outermost first.
    pub filters: Vec<String>,
    /// Whether this is a 1-bit stencil mask.
    pub image_mask: bool,
}

impl<'a> PdfImage<'a> {
    /// Read the image dictionary of an XObject stream.
    pub fn from_stream(doc: &'a Document, stream: &'a Stream) -> Result<Self> {
        let dict = &stream.dict;

        let dimension = |key: &[u8]| -> Result<u32> {
            let value = dict
                .get(key)
                .ok()
                .and_then(|o| doc.dereference(o).ok())
                .and_then(|(_, o)| o.as_i64().ok())
                .ok_or_else(|| {
                    PdfError::ImageDict(format!("missing /{}", String::from_utf8_lossy(key)))
                })?;
            u32::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| PdfError::ImageDict(format!("bad dimension {}", value)))
        };
        let width = dimension(b"Width")?;
        let height = dimension(b"Height")?;

        let image_mask = dict
            .get(b"ImageMask")
            .and_then(Object::as_bool)
            .unwrap_or(false);

        let bits_per_component = if image_mask {
            1
        } else {
            dict.get(b"BitsPerComponent")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(8) as u8
        };

        let filters = match dict.get(b"Filter") {
            Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
            Ok(Object::Array(arr)) => arr
                .iter()
                .filter_map(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self { doc, stream, width, height, bits_per_component, filters, image_mask })
    }

    /// Name of the filter that produced the final encoding, if any.
    pub fn encoding(&self) -> Option<&str> {
        self.filters.last().map(String::as_str)
    }

    /// Decode the image into a bitmap.
    pub fn decode(&self) -> Result<DynamicImage> {
        trace!(
            "Decoding image {}x{}, bits={}, filters={:?}",
            self.width, self.height, self.bits_per_component, self.filters
        );

        match self.encoding() {
            Some("DCTDecode" | "DCT") => {
                let data = self.leading_filters_decoded()?;
                return image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
                    .map_err(|e| PdfError::ImageData(e.to_string()));
            }
            Some(name @ ("JPXDecode" | "JBIG2Decode" | "CCITTFaxDecode" | "CCF")) => {
                return Err(PdfError::UnsupportedFilter(name.to_string()));
            }
            _ => {}
        }

        let data = stream_bytes(self.stream)?;

        if self.image_mask {
            let invert = self.decode_inverted();
            return self.gray_from_samples(&data, invert);
        }

        let color_space = match self.stream.dict.get(b"ColorSpace") {
            Ok(obj) => ColorSpace::from_object(self.doc, obj)?,
            Err(_) => {
                return Err(PdfError::ImageDict("missing /ColorSpace".to_string()));
            }
        };

        match &color_space {
            ColorSpace::Gray => self.gray_from_samples(&data, self.decode_inverted()),
            ColorSpace::Rgb => {
                let samples = self.unpack(&data, 3, true)?;
                RgbImage::from_raw(self.width, self.height, samples)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| PdfError::ImageData("RGB buffer size mismatch".to_string()))
            }
            ColorSpace::Cmyk => {
                let samples = self.unpack(&data, 4, true)?;
                let rgb = samples.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
                RgbImage::from_raw(self.width, self.height, rgb)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| PdfError::ImageData("CMYK buffer size mismatch".to_string()))
            }
            ColorSpace::Indexed { base, hival, lookup } => {
                let indices = self.unpack(&data, 1, false)?;
                self.expand_palette(&indices, base, *hival, lookup)
            }
        }
    }

    /// A `/Decode [1 0]` array on a one-component image inverts samples.
    fn decode_inverted(&self) -> bool {
        let Ok(decode) = self.stream.dict.get(b"Decode").and_then(Object::as_array) else {
            return false;
        };
        let values: Vec<f32> = decode.iter().filter_map(|o| o.as_float().ok()).collect();
        matches!(values.as_slice(), [lo, hi] if lo > hi)
    }

    fn gray_from_samples(&self, data: &[u8], invert: bool) -> Result<DynamicImage> {
        let mut samples = self.unpack(data, 1, true)?;
        if invert {
            samples.iter_mut().for_each(|s| *s = 255 - *s);
        }
        GrayImage::from_raw(self.width, self.height, samples)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| PdfError::ImageData("gray buffer size mismatch".to_string()))
    }

    fn expand_palette(
        &self,
        indices: &[u8],
        base: &ColorSpace,
        hival: u8,
        lookup: &[u8],
    ) -> Result<DynamicImage> {
        let n = base.components();
        let entries = hival as usize + 1;
        if lookup.len() < entries * n {
            return Err(PdfError::ImageData(format!(
                "palette has {} bytes, need {}",
                lookup.len(),
                entries * n
            )));
        }

        let mut rgb = Vec::with_capacity(indices.len() * 3);
        for &index in indices {
            let i = (index.min(hival) as usize) * n;
            let entry = &lookup[i..i + n];
            match base {
                ColorSpace::Gray => rgb.extend_from_slice(&[entry[0]; 3]),
                ColorSpace::Rgb => rgb.extend_from_slice(entry),
                ColorSpace::Cmyk => rgb.extend_from_slice(&cmyk_to_rgb(entry)),
                ColorSpace::Indexed { .. } => {
                    return Err(PdfError::UnsupportedColorSpace("nested Indexed".to_string()));
                }
            }
        }

        RgbImage::from_raw(self.width, self.height, rgb)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| PdfError::ImageData("palette buffer size mismatch".to_string()))
    }

    /// Unpack byte-aligned rows of `components` samples per pixel to one byte
    /// per sample. With `scale`, sub-byte and 16-bit samples are mapped onto
    /// 0..=255; without it, raw values are kept (palette indices).
    fn unpack(&self, data: &[u8], components: usize, scale: bool) -> Result<Vec<u8>> {
        let bpc = self.bits_per_component as usize;
        if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
            return Err(PdfError::ImageData(format!("unsupported bits per component: {}", bpc)));
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let too_large = || PdfError::ImageData(format!("image of {}x{} is too large", width, height));
        let samples_per_row = width.checked_mul(components).ok_or_else(too_large)?;
        let row_bytes = samples_per_row.checked_mul(bpc).ok_or_else(too_large)?.div_ceil(8);
        let expected = row_bytes.checked_mul(height).ok_or_else(too_large)?;
        if data.len() < expected {
            return Err(PdfError::ImageData(format!(
                "expected {} bytes, found {}",
                expected,
                data.len()
            )));
        }

        if bpc == 8 {
            return Ok(data[..expected].to_vec());
        }

        let max = (1u32 << bpc.min(8)) - 1;
        let mut out = Vec::with_capacity(samples_per_row.saturating_mul(height));
        for row in data[..expected].chunks_exact(row_bytes) {
            if bpc == 16 {
                out.extend(row.chunks_exact(2).map(|pair| pair[0]));
                continue;
            }
            for i in 0..samples_per_row {
                let bit = i * bpc;
                let shift = 8 - bpc - (bit % 8);
                let value = ((row[bit / 8] >> shift) as u32) & max;
                out.push(if scale { (value * 255 / max) as u8 } else { value as u8 });
            }
        }
        Ok(out)
    }

    /// Raw stream bytes with every filter before the final image encoding removed.
    fn leading_filters_decoded(&self) -> Result<Vec<u8>> {
        let leading = &self.filters[..self.filters.len().saturating_sub(1)];
        let mut data = self.stream.content.clone();
        for filter in leading {
            data = apply_filter(self.stream, filter, data)?;
        }
        Ok(data)
    }
}

/// Stream content with every filter removed; unfiltered streams are returned as-is.
fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    let filters: Vec<String> = match stream.filters() {
        Ok(names) => names.iter().map(|n| String::from_utf8_lossy(n).into_owned()).collect(),
        Err(_) => return Ok(stream.content.clone()),
    };
    let mut data = stream.content.clone();
    for filter in &filters {
        data = apply_filter(stream, filter, data)?;
    }
    Ok(data)
}

/// Undo one filter of `stream`.
fn apply_filter(stream: &Stream, filter: &str, data: Vec<u8>) -> Result<Vec<u8>> {
    let params = stream.dict.get(b"DecodeParms").ok().filter(|p| p.as_dict().is_ok());
    match filter {
        "ASCIIHexDecode" => ascii_hex_decode(&data),
        "FlateDecode" if params.is_none() => {
            let mut out = Vec::new();
            ZlibDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| PdfError::ImageData(e.to_string()))?;
            Ok(out)
        }
        _ => {
            // lopdf handles the rest, one filter at a time.
            let mut dict = Dictionary::new();
            dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
            if let Some(params) = params {
                dict.set("DecodeParms", params.clone());
            }
            Stream::new(dict, data)
                .decompressed_content()
                .map_err(|e| PdfError::ImageData(format!("failed to decompress {}: {}", filter, e)))
        }
    }
}

fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &c in data {
        let nibble = match c {
            b'>' => break,
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            c if c.is_ascii_whitespace() || c == 0 => continue,
            other => {
                return Err(PdfError::ImageData(format!("bad hex digit {:?}", other as char)));
            }
        };
        match high.take() {
            Some(h) => out.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

fn kind(obj: &Object) -> &'static str {
    match obj {
        Object::Null => "null",
        Object::Boolean(_) => "a boolean",
        Object::Integer(_) | Object::Real(_) => "a number",
        Object::String(..) => "a string",
        Object::Name(_) => "a name",
        Object::Array(_) => "an array",
        Object::Dictionary(_) => "a dictionary",
        Object::Stream(_) => "a stream",
        Object::Reference(_) => "a reference",
    }
}

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 255 - px[3] as u32;
    [
        ((255 - px[0] as u32) * k / 255) as u8,
        ((255 - px[1] as u32) * k / 255) as u8,
        ((255 - px[2] as u32) * k / 255) as u8,
    ]
}
