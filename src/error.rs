use std::path::PathBuf;

use crate::math::matrix::Shape;

/// Every failure the library can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shape mismatch in {op}: {left:?} vs {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: Shape,
        right: Shape,
    },

    #[error("expected {expected} elements for a {rows}x{cols} matrix, got {actual}")]
    DataLength {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },

    #[error("backward() needs a 1x1 root, got {0:?}")]
    NonScalarRoot(Shape),

    #[error("item() called on a non-scalar tensor of shape {0:?}")]
    NotAScalar(Shape),

    #[error("unsupported dimension {0} (only 0 and 1 exist)")]
    InvalidDim(usize),

    #[error("class index {index} out of range for {classes} classes")]
    ClassOutOfRange { index: usize, classes: usize },

    #[error("loss became non-finite at iteration {iteration}")]
    NonFiniteLoss { iteration: usize },

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid IDX magic in {}: expected {expected}, got {actual}", path.display())]
    InvalidMagic {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error("malformed IDX data: {0}")]
    MalformedIdx(String),

    #[error("range {start}..{end} is out of bounds for a dataset of {len} examples")]
    SplitOutOfRange { start: usize, end: usize, len: usize },

    #[error("malformed parameter payload: {0}")]
    Payload(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("parameter server rejected the request with status {0}")]
    ServerStatus(u16),

    #[error("download of {url} failed with status {status}")]
    Download { url: String, status: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
