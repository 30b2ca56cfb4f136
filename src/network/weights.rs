use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::autograd::Graph;
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;
use crate::network::network::Network;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub weights: Matrix,
    pub biases: Matrix,
    pub activation: Activation,
}

/// Detached copy of every parameter of a [`Network`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkWeights {
    pub layers: Vec<LayerWeights>,
}

impl NetworkWeights {
    pub fn snapshot(graph: &Graph, network: &Network) -> NetworkWeights {
        let layers = network
            .layers
            .iter()
            .map(|layer| LayerWeights {
                weights: graph.value(layer.weights).clone(),
                biases: graph.value(layer.biases).clone(),
                activation: layer.activation,
            })
            .collect();
        NetworkWeights { layers }
    }

    /// Writes the stored values back into `network`'s parameters. The layer
    /// count and every shape must match.
    pub fn restore(&self, graph: &mut Graph, network: &Network) -> Result<()> {
        if self.layers.len() != network.layers.len() {
            return Err(Error::Config(format!(
                "snapshot has {} layers, network has {}",
                self.layers.len(),
                network.layers.len()
            )));
        }
        for (stored, layer) in self.layers.iter().zip(&network.layers) {
            graph.set_value(layer.weights, stored.weights.clone())?;
            graph.set_value(layer.biases, stored.biases.clone())?;
        }
        Ok(())
    }

    /// Serializes the snapshot to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reads a snapshot written by `save_json`.
    pub fn load_json(path: &str) -> Result<NetworkWeights> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
