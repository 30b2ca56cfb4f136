use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::autograd::{Graph, TensorId};
use crate::data::idx;
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// Images and labels kept as raw bytes. Pixels are scaled to `[0, 1]` only
/// when a batch is materialised.
#[derive(Debug, Clone, PartialEq)]
pub struct MnistDataset {
    pub images: Vec<u8>,
    pub labels: Vec<u8>,
    pub rows: usize,
    pub cols: usize,
}

impl MnistDataset {
    /// Loads an IDX3 image file and its IDX1 label file (either may be
    /// gzipped).
    pub fn load(images_path: &Path, labels_path: &Path) -> Result<MnistDataset> {
        let images = idx::load_images(images_path)?;
        let labels = idx::load_labels(labels_path)?;
        if images.count != labels.len() {
            return Err(Error::MalformedIdx(format!(
                "{} declares {} images but {} declares {} labels",
                images_path.display(),
                images.count,
                labels_path.display(),
                labels.len()
            )));
        }
        info!(
            images = images.count,
            rows = images.rows,
            cols = images.cols,
            path = %images_path.display(),
            "loaded dataset"
        );
        Ok(MnistDataset {
            images: images.pixels,
            labels,
            rows: images.rows,
            cols: images.cols,
        })
    }

    /// Training split from a directory holding the raw (or `.gz`) files.
    pub fn load_training(dir: &Path) -> Result<MnistDataset> {
        MnistDataset::load(&resolve(dir, TRAIN_IMAGES), &resolve(dir, TRAIN_LABELS))
    }

    pub fn load_test(dir: &Path) -> Result<MnistDataset> {
        MnistDataset::load(&resolve(dir, TEST_IMAGES), &resolve(dir, TEST_LABELS))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Pixels per image.
    pub fn image_size(&self) -> usize {
        self.rows * self.cols
    }

    pub fn image(&self, index: usize) -> &[u8] {
        let size = self.image_size();
        &self.images[index * size..(index + 1) * size]
    }

    /// Copies examples `start..start + len` into a new dataset.
    pub fn split(&self, start: usize, len: usize) -> Result<MnistDataset> {
        let end = start + len;
        if end > self.len() {
            return Err(Error::SplitOutOfRange {
                start,
                end,
                len: self.len(),
            });
        }
        let size = self.image_size();
        Ok(MnistDataset {
            images: self.images[start * size..end * size].to_vec(),
            labels: self.labels[start..end].to_vec(),
            rows: self.rows,
            cols: self.cols,
        })
    }

    /// The first `⌊len · fraction⌋` examples train, the rest validate.
    pub fn train_validation_split(&self, fraction: f32) -> Result<(MnistDataset, MnistDataset)> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::Config(format!("training split {fraction} is not in [0, 1]")));
        }
        let train = (self.len() as f32 * fraction) as usize;
        Ok((self.split(0, train)?, self.split(train, self.len() - train)?))
    }
}

/// Prefers the unpacked file, falling back to the `.gz` archive.
fn resolve(dir: &Path, name: &str) -> PathBuf {
    let raw = dir.join(name);
    let gz = dir.join(format!("{name}.gz"));
    if !raw.exists() && gz.exists() {
        gz
    } else {
        raw
    }
}

/// Graph tensors for one batch.
#[derive(Debug, Clone, Copy)]
pub struct Batch {
    /// `batch × (rows·cols)`, pixels scaled to `[0, 1]`.
    pub images: TensorId,
    /// `batch × 1` class indices.
    pub labels: TensorId,
}

#[derive(Debug)]
pub enum Sampler {
    /// Consecutive examples, in dataset order.
    Sequential,
    /// Each example drawn uniformly, with replacement.
    Random(StdRng),
}

/// Cuts a dataset into fixed-size batches.
///
/// [`DataLoader::next_batch`] returns `None` once fewer than `batch_size`
/// examples remain in the epoch and rewinds to the start, so
/// `while let Some(batch) = loader.next_batch(..)` runs exactly one epoch.
/// A trailing partial batch is skipped.
#[derive(Debug)]
pub struct DataLoader {
    pub dataset: MnistDataset,
    pub batch_size: usize,
    cursor: usize,
    sampler: Sampler,
}

impl DataLoader {
    pub fn sequential(dataset: MnistDataset, batch_size: usize) -> DataLoader {
        DataLoader {
            dataset,
            batch_size,
            cursor: 0,
            sampler: Sampler::Sequential,
        }
    }

    pub fn random(dataset: MnistDataset, batch_size: usize, seed: u64) -> DataLoader {
        DataLoader {
            dataset,
            batch_size,
            cursor: 0,
            sampler: Sampler::Random(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn batches_per_epoch(&self) -> usize {
        if self.batch_size == 0 {
            0
        } else {
            self.dataset.len() / self.batch_size
        }
    }

    /// Dataset indices of the next batch, or `None` at the end of the epoch.
    pub fn next_indices(&mut self) -> Option<Vec<usize>> {
        let n = self.dataset.len();
        if self.batch_size == 0 || self.cursor + self.batch_size > n {
            self.cursor = 0;
            return None;
        }
        let indices = match &mut self.sampler {
            Sampler::Sequential => (self.cursor..self.cursor + self.batch_size).collect(),
            Sampler::Random(rng) => (0..self.batch_size).map(|_| rng.gen_range(0..n)).collect(),
        };
        self.cursor += self.batch_size;
        Some(indices)
    }

    /// Materialises the next batch as two leaves on `graph`.
    pub fn next_batch(&mut self, graph: &mut Graph) -> Option<Batch> {
        let indices = self.next_indices()?;
        let (images, labels) = self.gather(&indices);
        Some(Batch {
            images: graph.tensor(images, false),
            labels: graph.tensor(labels, false),
        })
    }

    fn gather(&self, indices: &[usize]) -> (Matrix, Matrix) {
        let size = self.dataset.image_size();
        let mut images = Matrix::zeros(indices.len(), size);
        let mut labels = Matrix::zeros(indices.len(), 1);
        for (k, &index) in indices.iter().enumerate() {
            for (dst, &px) in images.data[k * size..(k + 1) * size]
                .iter_mut()
                .zip(self.dataset.image(index))
            {
                *dst = px as f32 / 255.0;
            }
            labels.data[k] = self.dataset.labels[index] as f32;
        }
        (images, labels)
    }
}
