//! Text and image renderings of dataset batches, for eyeballing what a
//! loader produces.

use std::fmt::Write;
use std::path::Path;

use image::{GrayImage, Luma};

use crate::autograd::Graph;
use crate::data::mnist::Batch;
use crate::error::Result;

/// Darkest to brightest.
pub const RAMP: &str = " .:-=+*#%@";

/// Renders one `rows × cols` image with pixels in `[0, 1]` as ASCII art,
/// one text line per pixel row.
pub fn ascii_image(pixels: &[f32], rows: usize, cols: usize) -> String {
    let ramp = RAMP.as_bytes();
    let top = ramp.len() - 1;
    let mut out = String::with_capacity(rows * (cols + 1));
    for i in 0..rows {
        for &px in &pixels[i * cols..(i + 1) * cols] {
            let index = ((px.clamp(0.0, 1.0) * top as f32) as usize).min(top);
            out.push(ramp[index] as char);
        }
        out.push('\n');
    }
    out
}

/// Every image of `batch`, each preceded by a `Label: n` line.
pub fn ascii_batch(graph: &Graph, batch: &Batch, rows: usize, cols: usize) -> String {
    let images = graph.value(batch.images);
    let labels = graph.value(batch.labels);
    let mut out = String::new();
    for k in 0..images.rows {
        let _ = writeln!(out, "Label: {}", labels.data[k] as u32);
        out.push_str(&ascii_image(images.row(k), rows, cols));
    }
    out
}

/// Tiles the batch into a grid `per_row` images wide.
pub fn contact_sheet(graph: &Graph, batch: &Batch, rows: usize, cols: usize, per_row: usize) -> GrayImage {
    let images = graph.value(batch.images);
    let per_row = per_row.max(1);
    let grid_rows = images.rows.div_ceil(per_row);
    let mut sheet = GrayImage::new((per_row * cols) as u32, (grid_rows * rows) as u32);
    for k in 0..images.rows {
        let (ox, oy) = ((k % per_row) * cols, (k / per_row) * rows);
        let pixels = images.row(k);
        for i in 0..rows {
            for j in 0..cols {
                let value = (pixels[i * cols + j].clamp(0.0, 1.0) * 255.0).round() as u8;
                sheet.put_pixel((ox + j) as u32, (oy + i) as u32, Luma([value]));
            }
        }
    }
    sheet
}

pub fn save_png(sheet: &GrayImage, path: &Path) -> Result<()> {
    sheet.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
