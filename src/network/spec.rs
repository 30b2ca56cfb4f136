use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::Result;
use crate::loss::LossType;

/// Describes one layer in a network specification.
///
/// Fields:
/// - `size`: number of neurons in this layer
/// - `input_size`: width of the layer's input (the previous layer's `size`,
///   or the raw input dimension for the first layer)
/// - `activation`: activation applied after the affine map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    pub activation: Activation,
}

/// Architecture plus the loss it is trained with, independent of any
/// weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub layers: Vec<LayerSpec>,
    pub loss: LossType,
}

impl NetworkSpec {
    /// `784 → hidden (ReLU) → 10` classifier trained with NLL on log-softmax
    /// outputs.
    pub fn mnist_mlp(hidden: usize) -> NetworkSpec {
        NetworkSpec {
            name: "mnist_mlp".to_string(),
            layers: vec![
                LayerSpec {
                    size: hidden,
                    input_size: 784,
                    activation: Activation::ReLU,
                },
                LayerSpec {
                    size: 10,
                    input_size: hidden,
                    activation: Activation::Identity,
                },
            ],
            loss: LossType::Nll,
        }
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnist_mlp_round_trips_through_json() {
        let spec = NetworkSpec::mnist_mlp(32);
        assert_eq!(spec.layers[1].input_size, 32);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.json");
        let path = path.to_str().unwrap();
        spec.save_json(path).unwrap();
        assert_eq!(NetworkSpec::load_json(path).unwrap(), spec);
    }
}
