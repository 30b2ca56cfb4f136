pub mod download;
pub mod idx;
pub mod mnist;
pub mod preview;

pub use mnist::{Batch, DataLoader, MnistDataset};
