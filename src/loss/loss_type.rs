use serde::{Deserialize, Serialize};

use crate::autograd::{Graph, TensorId};
use crate::error::Result;

/// Selects which loss a training script reduces.
///
/// - `SumSquared`: `Σ (pred - target)²` over the whole batch; pair with a
///   linear output.
/// - `Mse`: `0.5 / batch · Σ (pred - target)²`.
/// - `MeanSquared`: `Σ (pred - target)²` divided by the element count.
/// - `Nll`: mean negative log-likelihood; `pred` must already be
///   log-probabilities and `target` an `n×1` column of class indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    SumSquared,
    Mse,
    MeanSquared,
    Nll,
}

impl LossType {
    /// Records the loss on `graph` and returns the `1×1` node.
    pub fn apply(self, graph: &mut Graph, pred: TensorId, target: TensorId) -> Result<TensorId> {
        match self {
            LossType::SumSquared => {
                let diff = graph.sub(pred, target)?;
                let squared = graph.square(diff);
                Ok(graph.sum_all(squared))
            }
            LossType::Mse => graph.mse_loss(pred, target),
            LossType::MeanSquared => graph.mean_squared_loss(pred, target),
            LossType::Nll => graph.nll_loss(pred, target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;

    #[test]
    fn sum_squared_and_mse_differ_by_batch_scale() {
        let mut graph = Graph::new();
        let pred = graph.from_slice(&[1.0, 2.0, 3.0, 4.0], 4, 1).unwrap();
        let target = graph.zeros((4, 1));
        let sse = LossType::SumSquared.apply(&mut graph, pred, target).unwrap();
        let mse = LossType::Mse.apply(&mut graph, pred, target).unwrap();
        assert!((graph.item(sse).unwrap() - 30.0).abs() < 1e-5);
        assert!((graph.item(mse).unwrap() - 3.75).abs() < 1e-5);
    }

    #[test]
    fn mean_squared_divides_by_element_count() {
        let mut graph = Graph::new();
        let pred = graph.from_slice(&[1.0, 2.0, 3.0, 4.0], 4, 1).unwrap();
        let target = graph.zeros((4, 1));
        let loss = LossType::MeanSquared.apply(&mut graph, pred, target).unwrap();
        assert!((graph.item(loss).unwrap() - 7.5).abs() < 1e-5);

        graph.backward(loss).unwrap();
        // d/dp mean(p²) = 2p / 4
        assert!(graph.grad(pred).all_close(&Matrix::from_vec(4, 1, vec![0.5, 1.0, 1.5, 2.0]).unwrap(), 1e-6));
    }

    #[test]
    fn serde_names_are_snake_case() {
        let json = serde_json::to_string(&LossType::SumSquared).unwrap();
        assert_eq!(json, "\"sum_squared\"");
        let back: LossType = serde_json::from_str("\"nll\"").unwrap();
        assert_eq!(back, LossType::Nll);
    }
}
