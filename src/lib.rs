pub mod activation;
pub mod autograd;
pub mod data;
pub mod distributed;
pub mod error;
pub mod layers;
pub mod logging;
pub mod loss;
pub mod math;
pub mod network;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use activation::Activation;
pub use autograd::{Graph, TensorId};
pub use data::{Batch, DataLoader, MnistDataset};
pub use error::{Error, Result};
pub use layers::Dense;
pub use loss::LossType;
pub use math::Matrix;
pub use network::{Network, NetworkSpec, NetworkWeights};
pub use optim::Optimizer;
pub use train::{train_classifier, TrainConfig};
