//! Splitting content streams around inline images (`BI ... ID ... EI`).
//!
//! lopdf rejects a whole content stream when an inline image is filtered or
//! uses a color space it does not know, so inline images are cut out here
//! and the operators between them are decoded separately.

use lopdf::content::Content;
use lopdf::{Dictionary, Object, Stream};

const WHITESPACE: &[u8] = b"\0\t\n\x0c\r ";
const DELIMITERS: &[u8] = b"()<>[]{}/%";

/// A piece of a content stream, in drawing order.
pub(crate) enum Segment<'c> {
    /// Ordinary operators, still encoded.
    Operators(&'c [u8]),
    /// An inline image with its dictionary keys spelled out in full.
    InlineImage(Stream),
    /// An inline image that could not be delimited; nothing follows it.
    Broken(String),
}

/// Cut `content` into operator runs and inline images.
pub(crate) fn split(content: &[u8]) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut pos = 0;

    while let Some((token_start, token_end)) = next_token(content, pos) {
        pos = token_end;
        if &content[token_start..token_end] != b"BI" {
            continue;
        }
        if token_start > start {
            segments.push(Segment::Operators(&content[start..token_start]));
        }
        match read_inline_image(content, token_end) {
            Ok((stream, end)) => {
                segments.push(Segment::InlineImage(stream));
                start = end;
                pos = end;
            }
            Err(reason) => {
                segments.push(Segment::Broken(reason));
                return segments;
            }
        }
    }

    if start < content.len() {
        segments.push(Segment::Operators(&content[start..]));
    }
    segments
}

/// Parse the inline image whose header starts at `header_start` (just after
/// `BI`). Returns the image and the position after its `EI`.
fn read_inline_image(content: &[u8], header_start: usize) -> Result<(Stream, usize), String> {
    let mut pos = header_start;
    let (header_end, id_end) = loop {
        let Some((start, end)) = next_token(content, pos) else {
            return Err("inline image without ID".to_string());
        };
        if &content[start..end] == b"ID" {
            break (start, end);
        }
        pos = end;
    };

    let dict = expand(parse_header(&content[header_start..header_end])?);

    // A single whitespace byte separates ID from the data.
    let data_start = (id_end + 1).min(content.len());
    let by_length = raw_length(&dict)
        .and_then(|len| data_start.checked_add(len))
        .filter(|end| *end <= content.len())
        .and_then(|end| ei_after(content, end).map(|after| (end, after)));

    let (data_end, after) = match by_length {
        Some(found) => found,
        None => find_ei(content, data_start).ok_or_else(|| "inline image without EI".to_string())?,
    };

    Ok((Stream::new(dict, content[data_start..data_end].to_vec()), after))
}

fn parse_header(header: &[u8]) -> Result<Dictionary, String> {
    let mut wrapped = b"<<".to_vec();
    wrapped.extend_from_slice(header);
    wrapped.extend_from_slice(b">> inline");

    let operation = Content::decode(&wrapped)
        .map_err(|e| format!("bad inline image header: {}", e))?
        .operations
        .into_iter()
        .next();
    match operation.and_then(|op| op.operands.into_iter().next()) {
        Some(Object::Dictionary(dict)) => Ok(dict),
        _ => Err("bad inline image header".to_string()),
    }
}

/// Replace abbreviated keys and names with the ones image XObjects use.
fn expand(dict: Dictionary) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict {
        let key = full_key(&key);
        let value = match key {
            b"ColorSpace" => expand_names(value, full_color_space),
            b"Filter" => expand_names(value, full_filter),
            _ => value,
        };
        out.set(key, value);
    }
    out
}

fn expand_names(value: Object, full: fn(&[u8]) -> &[u8]) -> Object {
    match value {
        Object::Name(name) => Object::Name(full(&name).to_vec()),
        Object::Array(items) => Object::Array(items.into_iter().map(|o| expand_names(o, full)).collect()),
        other => other,
    }
}

fn full_key(key: &[u8]) -> &[u8] {
    match key {
        b"BPC" => b"BitsPerComponent",
        b"CS" => b"ColorSpace",
        b"D" => b"Decode",
        b"DP" => b"DecodeParms",
        b"F" => b"Filter",
        b"H" => b"Height",
        b"I" => b"Interpolate",
        b"IM" => b"ImageMask",
        b"W" => b"Width",
        other => other,
    }
}

fn full_color_space(name: &[u8]) -> &[u8] {
    match name {
        b"G" => b"DeviceGray",
        b"RGB" => b"DeviceRGB",
        b"CMYK" => b"DeviceCMYK",
        b"I" => b"Indexed",
        other => other,
    }
}

fn full_filter(name: &[u8]) -> &[u8] {
    match name {
        b"AHx" => b"ASCIIHexDecode",
        b"A85" => b"ASCII85Decode",
        b"LZW" => b"LZWDecode",
        b"Fl" => b"FlateDecode",
        b"RL" => b"RunLengthDecode",
        b"CCF" => b"CCITTFaxDecode",
        b"DCT" => b"DCTDecode",
        other => other,
    }
}

/// Byte length of unfiltered image data, when the dictionary pins it down.
fn raw_length(dict: &Dictionary) -> Option<usize> {
    if dict.get(b"Filter").is_ok() {
        return None;
    }
    let number = |key: &[u8]| {
        dict.get(key)
            .and_then(Object::as_i64)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
    };
    let width = number(b"Width")?;
    let height = number(b"Height")?;

    let image_mask = dict.get(b"ImageMask").and_then(Object::as_bool).unwrap_or(false);
    let (components, bpc) = if image_mask {
        (1, 1)
    } else {
        let components = match dict.get(b"ColorSpace").ok()? {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" => 1,
                b"DeviceRGB" => 3,
                b"DeviceCMYK" => 4,
                _ => return None,
            },
            Object::Array(arr) if matches!(arr.first().and_then(|o| o.as_name().ok()), Some(b"Indexed")) => 1,
            _ => return None,
        };
        (components, number(b"BitsPerComponent")?)
    };

    width
        .checked_mul(components)?
        .checked_mul(bpc)?
        .div_ceil(8)
        .checked_mul(height)
}

/// If `EI` follows `pos` (after optional whitespace), the position after it.
fn ei_after(content: &[u8], mut pos: usize) -> Option<usize> {
    while pos < content.len() && WHITESPACE.contains(&content[pos]) {
        pos += 1;
    }
    let end = pos + 2;
    (content[pos..].starts_with(b"EI") && ends_token(content, end)).then_some(end)
}

/// Search for a whitespace-delimited `EI` at or after `from`. Returns the end
/// of the image data and the position after `EI`.
fn find_ei(content: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 2 <= content.len() {
        let preceded = i == from || WHITESPACE.contains(&content[i - 1]);
        if preceded && content[i..].starts_with(b"EI") && ends_token(content, i + 2) {
            let data_end = if i > from { i - 1 } else { from };
            return Some((data_end, i + 2));
        }
        i += 1;
    }
    None
}

fn ends_token(content: &[u8], pos: usize) -> bool {
    content.get(pos).is_none_or(|c| WHITESPACE.contains(c) || DELIMITERS.contains(c))
}

fn is_regular(c: u8) -> bool {
    !WHITESPACE.contains(&c) && !DELIMITERS.contains(&c)
}

/// Bounds of the next token at or after `pos`, skipping whitespace and comments.
fn next_token(content: &[u8], mut pos: usize) -> Option<(usize, usize)> {
    loop {
        while pos < content.len() && WHITESPACE.contains(&content[pos]) {
            pos += 1;
        }
        if content.get(pos) != Some(&b'%') {
            break;
        }
        while pos < content.len() && !matches!(content[pos], b'\n' | b'\r') {
            pos += 1;
        }
    }
    if pos >= content.len() {
        return None;
    }

    let start = pos;
    let end = match content[pos] {
        b'(' => skip_literal_string(content, pos),
        b'<' | b'>' if content.get(pos + 1) == Some(&content[pos]) => pos + 2,
        b'<' => content[pos..]
            .iter()
            .position(|&c| c == b'>')
            .map_or(content.len(), |i| pos + i + 1),
        b'/' => skip_regular(content, pos + 1),
        c if DELIMITERS.contains(&c) => pos + 1,
        _ => skip_regular(content, pos),
    };
    Some((start, end))
}

fn skip_regular(content: &[u8], mut pos: usize) -> usize {
    while pos < content.len() && is_regular(content[pos]) {
        pos += 1;
    }
    pos
}

fn skip_literal_string(content: &[u8], mut pos: usize) -> usize {
    let mut depth = 0usize;
    while pos < content.len() {
        match content[pos] {
            b'\\' => pos += 1,
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return pos + 1;
                }
            }
            _ => {}
        }
        pos += 1;
    }
    content.len()
}
