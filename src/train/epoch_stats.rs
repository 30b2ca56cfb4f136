use serde::{Deserialize, Serialize};

/// Per-epoch statistics reported by `train_classifier`.
///
/// Epoch 0 is the baseline evaluation before any update; it carries no
/// training loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    /// Mean batch loss over the epoch.
    pub mean_loss: Option<f32>,
    /// Percentage of validation examples classified correctly.
    pub validation_accuracy: f32,
    /// Wall-clock duration of the epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// What `train_classifier` reports while it runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress<'a> {
    /// Batch loss, every `log_every` iterations of an epoch.
    Iteration { epoch: usize, iteration: usize, loss: f32 },
    /// A finished epoch, or the epoch-0 baseline.
    Epoch(&'a EpochStats),
}
