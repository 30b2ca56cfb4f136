//! Reader for the IDX format MNIST ships in.
//!
//! # IDX3 image file layout
//! ```text
//! bytes  0-3:   magic 2051  (big-endian u32)
//! bytes  4-7:   N           (number of images, big-endian u32)
//! bytes  8-11:  rows        (image height in pixels, big-endian u32)
//! bytes 12-15:  cols        (image width in pixels, big-endian u32)
//! bytes 16..:   N * rows * cols bytes, row-major, uint8
//! ```
//!
//! # IDX1 label file layout
//! ```text
//! bytes  0-3:   magic 2049  (big-endian u32)
//! bytes  4-7:   N           (number of labels, big-endian u32)
//! bytes  8..:   N bytes, one class index each
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};

pub const IMAGES_MAGIC: u32 = 2051;
pub const LABELS_MAGIC: u32 = 2049;

/// Decoded IDX3 payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    /// `count * rows * cols` pixels, image after image.
    pub pixels: Vec<u8>,
}

/// Reads a whole file, transparently gunzipping names ending in `.gz`.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let mut reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn read_u32_be(bytes: &[u8], offset: usize, what: &str) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::MalformedIdx(format!("file ends before the {what} field at byte {offset}")))
}

fn check_magic(bytes: &[u8], expected: u32, path: &Path) -> Result<()> {
    let actual = read_u32_be(bytes, 0, "magic")?;
    if actual != expected {
        return Err(Error::InvalidMagic {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Parses an in-memory IDX3 image file. `path` is only used in errors.
pub fn parse_images(bytes: &[u8], path: &Path) -> Result<IdxImages> {
    check_magic(bytes, IMAGES_MAGIC, path)?;
    let count = read_u32_be(bytes, 4, "image count")? as usize;
    let rows = read_u32_be(bytes, 8, "row count")? as usize;
    let cols = read_u32_be(bytes, 12, "column count")? as usize;

    let needed = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| Error::MalformedIdx(format!("{count} images of {rows}x{cols} overflow usize")))?;
    let data = &bytes[16..];
    if data.len() < needed {
        return Err(Error::MalformedIdx(format!(
            "header declares {count} images of {rows}x{cols} pixels ({needed} bytes) but only {} bytes follow",
            data.len()
        )));
    }

    Ok(IdxImages {
        count,
        rows,
        cols,
        pixels: data[..needed].to_vec(),
    })
}

/// Parses an in-memory IDX1 label file.
pub fn parse_labels(bytes: &[u8], path: &Path) -> Result<Vec<u8>> {
    check_magic(bytes, LABELS_MAGIC, path)?;
    let count = read_u32_be(bytes, 4, "label count")? as usize;
    let data = &bytes[8..];
    if data.len() < count {
        return Err(Error::MalformedIdx(format!(
            "header declares {count} labels but only {} bytes follow",
            data.len()
        )));
    }
    Ok(data[..count].to_vec())
}

pub fn load_images(path: &Path) -> Result<IdxImages> {
    parse_images(&read_bytes(path)?, path)
}

pub fn load_labels(path: &Path) -> Result<Vec<u8>> {
    parse_labels(&read_bytes(path)?, path)
}

/// Encodes an IDX3 file. Used to write fixtures and unpacked archives.
pub fn encode_images(images: &IdxImages) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + images.pixels.len());
    out.extend_from_slice(&IMAGES_MAGIC.to_be_bytes());
    out.extend_from_slice(&(images.count as u32).to_be_bytes());
    out.extend_from_slice(&(images.rows as u32).to_be_bytes());
    out.extend_from_slice(&(images.cols as u32).to_be_bytes());
    out.extend_from_slice(&images.pixels);
    out
}

pub fn encode_labels(labels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + labels.len());
    out.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
    out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    out.extend_from_slice(labels);
    out
}
