pub mod epoch_stats;
pub mod loop_fn;
pub mod train_config;

pub use epoch_stats::{EpochStats, Progress};
pub use loop_fn::{evaluate_accuracy, train_classifier};
pub use train_config::TrainConfig;
