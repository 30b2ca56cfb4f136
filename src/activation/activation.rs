use serde::{Deserialize, Serialize};

use crate::autograd::{Graph, TensorId};

/// Element-wise non-linearity applied after a dense layer's affine map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Sigmoid,
    ReLU,
    Tanh,
    Identity,
}

impl Activation {
    /// Records the activation on `graph`. `Identity` returns `x` unchanged
    /// without adding a node.
    pub fn apply(self, graph: &mut Graph, x: TensorId) -> TensorId {
        match self {
            Activation::Sigmoid => graph.sigmoid(x),
            Activation::ReLU => graph.relu(x),
            Activation::Tanh => graph.tanh(x),
            Activation::Identity => x,
        }
    }
}
