use rand::Rng;

use crate::autograd::{Graph, TensorId};
use crate::error::Result;
use crate::layers::dense::Dense;
use crate::network::spec::LayerSpec;
use crate::network::weights::NetworkWeights;

/// Stack of dense layers whose parameters live in a [`Graph`].
#[derive(Debug, Clone)]
pub struct Network {
    pub layers: Vec<Dense>,
}

impl Network {
    /// Builds a network from layer specs, drawing every parameter uniformly
    /// from `[-1, 1)`.
    pub fn new<R: Rng + ?Sized>(graph: &mut Graph, specs: &[LayerSpec], rng: &mut R) -> Network {
        let layers = specs
            .iter()
            .map(|spec| Dense::new(graph, spec.input_size, spec.size, spec.activation, rng))
            .collect();
        Network { layers }
    }

    /// Builds a network whose parameters start from a snapshot.
    pub fn from_weights(graph: &mut Graph, weights: &NetworkWeights) -> Result<Network> {
        let layers = weights
            .layers
            .iter()
            .map(|layer| Dense::from_matrices(graph, layer.weights.clone(), layer.biases.clone(), layer.activation))
            .collect::<Result<Vec<_>>>()?;
        Ok(Network { layers })
    }

    pub fn forward(&self, graph: &mut Graph, input: TensorId) -> Result<TensorId> {
        let mut current = input;
        for layer in &self.layers {
            current = layer.forward(graph, current)?;
        }
        Ok(current)
    }

    /// Forward pass followed by a row-wise log-softmax.
    pub fn output_log_softmax(&self, graph: &mut Graph, input: TensorId) -> Result<TensorId> {
        let logits = self.forward(graph, input)?;
        graph.log_softmax(logits, 1)
    }

    /// Every trainable tensor, layer by layer, weights before biases.
    pub fn params(&self) -> Vec<TensorId> {
        self.layers.iter().flat_map(|layer| layer.params()).collect()
    }
}
