//! Wire format shared by the parameter server and its workers.
//!
//! Both directions carry the same payload: every parameter tensor in network
//! order, little-endian throughout.
//!
//! ```text
//! u32            tensor count
//! repeated:
//!   u32 u32      rows, cols
//!   f32 * r*c    values, row-major
//! ```

use crate::error::{Error, Result};
use crate::math::matrix::{Matrix, Shape};

pub const WEIGHTS_PATH: &str = "/weights";
pub const GRADIENTS_PATH: &str = "/gradients";
pub const CONTENT_TYPE: &str = "application/octet-stream";

pub fn encode<'a, I>(tensors: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Matrix>,
{
    let tensors: Vec<&Matrix> = tensors.into_iter().collect();
    let values: usize = tensors.iter().map(|m| m.len()).sum();
    let mut out = Vec::with_capacity(4 + tensors.len() * 8 + values * 4);
    out.extend_from_slice(&(tensors.len() as u32).to_le_bytes());
    for m in tensors {
        out.extend_from_slice(&(m.rows as u32).to_le_bytes());
        out.extend_from_slice(&(m.cols as u32).to_le_bytes());
        for v in &m.data {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                Error::Payload(format!(
                    "truncated: needed {n} bytes at offset {}, have {}",
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

pub fn decode(bytes: &[u8]) -> Result<Vec<Matrix>> {
    let mut reader = Reader { bytes, pos: 0 };
    let count = reader.u32()? as usize;
    let mut tensors = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let rows = reader.u32()? as usize;
        let cols = reader.u32()? as usize;
        let len = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::Payload(format!("tensor of {rows}x{cols} overflows")))?;
        let data = reader
            .take(len)?
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        tensors.push(Matrix::from_vec(rows, cols, data)?);
    }
    if reader.pos != bytes.len() {
        return Err(Error::Payload(format!(
            "{} trailing bytes after {count} tensors",
            bytes.len() - reader.pos
        )));
    }
    Ok(tensors)
}

/// Decodes `bytes` and checks that the tensors have exactly `layout`'s shapes.
pub fn decode_expecting(bytes: &[u8], layout: &[Shape]) -> Result<Vec<Matrix>> {
    let tensors = decode(bytes)?;
    if tensors.len() != layout.len() {
        return Err(Error::Payload(format!(
            "expected {} tensors, got {}",
            layout.len(),
            tensors.len()
        )));
    }
    for (i, (tensor, &shape)) in tensors.iter().zip(layout).enumerate() {
        if tensor.shape() != shape {
            return Err(Error::Payload(format!(
                "tensor {i} has shape {:?}, expected {shape:?}",
                tensor.shape()
            )));
        }
    }
    Ok(tensors)
}
