use rand::Rng;

use crate::activation::Activation;
use crate::autograd::{Graph, TensorId};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Fully connected layer computing `act(x · W + b)`.
///
/// `W` is `input_size × size` and `b` is `1 × size`, broadcast over the
/// batch rows of `x`. Both live in the graph as trainable leaves.
#[derive(Debug, Clone, Copy)]
pub struct Dense {
    pub size: usize,
    pub input_size: usize,
    pub weights: TensorId,
    pub biases: TensorId,
    pub activation: Activation,
}

impl Dense {
    /// Weights and biases drawn uniformly from `[-1, 1)`.
    pub fn new<R: Rng + ?Sized>(
        graph: &mut Graph,
        input_size: usize,
        size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Dense {
        let weights = graph.parameter(input_size, size, rng);
        let biases = graph.parameter(1, size, rng);
        Dense {
            size,
            input_size,
            weights,
            biases,
            activation,
        }
    }

    /// Layer with explicit initial values.
    pub fn from_matrices(graph: &mut Graph, weights: Matrix, biases: Matrix, activation: Activation) -> Result<Dense> {
        if biases.shape() != (1, weights.cols) {
            return Err(Error::ShapeMismatch {
                op: "dense",
                left: weights.shape(),
                right: biases.shape(),
            });
        }
        let (input_size, size) = weights.shape();
        Ok(Dense {
            size,
            input_size,
            weights: graph.tensor(weights, true),
            biases: graph.tensor(biases, true),
            activation,
        })
    }

    pub fn forward(&self, graph: &mut Graph, input: TensorId) -> Result<TensorId> {
        let z = graph.matmul(input, self.weights)?;
        let z = graph.add(z, self.biases)?;
        Ok(self.activation.apply(graph, z))
    }

    pub fn params(&self) -> [TensorId; 2] {
        [self.weights, self.biases]
    }
}
