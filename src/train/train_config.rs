use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hyperparameters for [`train_classifier`](crate::train::train_classifier).
///
/// # Fields
/// - `epochs`: full passes over the training split
/// - `train_batch_size`: examples per optimisation step
/// - `validation_batch_size`: examples per evaluation batch
/// - `learning_rate`: step size handed to the optimizer
/// - `seed`: seeds weight initialisation and batch sampling
/// - `log_every`: iterations between batch-loss progress reports (0 disables them)
/// - `training_split`: fraction of the dataset used for training;
///   the remainder validates
/// - `stop_flag`: optional atomic flag; when set from another
///   thread the loop stops after the current epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub train_batch_size: usize,
    pub validation_batch_size: usize,
    pub learning_rate: f32,
    pub seed: u64,
    pub log_every: usize,
    pub training_split: f32,
    #[serde(skip)]
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 5,
            train_batch_size: 64,
            validation_batch_size: 128,
            learning_rate: 0.01,
            seed: 234521,
            log_every: 100,
            training_split: 0.8,
            stop_flag: None,
        }
    }
}

impl TrainConfig {
    /// Reads a JSON file; missing fields keep their defaults.
    pub fn load_json(path: &Path) -> Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let config: TrainConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.train_batch_size == 0 || self.validation_batch_size == 0 {
            return Err(Error::Config("batch sizes must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.training_split) {
            return Err(Error::Config(format!(
                "training_split {} is not in [0, 1]",
                self.training_split
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: TrainConfig = serde_json::from_str(r#"{"epochs": 2, "learning_rate": 0.5}"#).unwrap();
        assert_eq!(config.epochs, 2);
        assert_eq!(config.learning_rate, 0.5);
        assert_eq!(config.train_batch_size, 64);
        assert_eq!(config.seed, 234521);
    }

    #[test]
    fn rejects_zero_batch() {
        let config = TrainConfig {
            train_batch_size: 0,
            ..TrainConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn load_json_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        std::fs::write(&path, r#"{"training_split": 1.5}"#).unwrap();
        assert!(matches!(TrainConfig::load_json(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{"epochs": 3}"#).unwrap();
        assert_eq!(TrainConfig::load_json(&path).unwrap().epochs, 3);
    }
}
