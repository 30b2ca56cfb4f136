pub mod network;
pub mod spec;
pub mod weights;

pub use network::Network;
pub use spec::{LayerSpec, NetworkSpec};
pub use weights::{LayerWeights, NetworkWeights};
