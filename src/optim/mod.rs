pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::Sgd;

use serde::{Deserialize, Serialize};

use crate::autograd::{Graph, TensorId};
use crate::math::matrix::Matrix;

/// Update rule applied by an [`Optimizer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd(Sgd),
    Adam(Adam),
}

#[derive(Debug)]
struct ParamState {
    id: TensorId,
    /// SGD: `[momentum]`. Adam: `[m, v]`.
    buffers: Vec<Matrix>,
}

/// Owns the list of trainable tensors and their per-parameter state.
#[derive(Debug)]
pub struct Optimizer {
    kind: OptimizerKind,
    pub learning_rate: f32,
    /// Number of completed [`Optimizer::step`] calls.
    pub iteration: u32,
    params: Vec<ParamState>,
}

impl Optimizer {
    pub fn new(kind: OptimizerKind, learning_rate: f32) -> Self {
        Optimizer {
            kind,
            learning_rate,
            iteration: 0,
            params: Vec::new(),
        }
    }

    /// Plain SGD.
    pub fn sgd(learning_rate: f32) -> Self {
        Optimizer::new(OptimizerKind::Sgd(Sgd::default()), learning_rate)
    }

    /// Adam with the usual betas. A learning rate of zero selects 0.001.
    pub fn adam(learning_rate: f32) -> Self {
        let lr = if learning_rate == 0.0 {
            adam::DEFAULT_LEARNING_RATE
        } else {
            learning_rate
        };
        Optimizer::new(OptimizerKind::Adam(Adam::default()), lr)
    }

    /// The update rule, fixed at construction so every parameter's state
    /// matches it.
    pub fn kind(&self) -> &OptimizerKind {
        &self.kind
    }

    /// Registers a parameter. Its state buffers are shaped after the
    /// tensor's current value.
    pub fn add_param(&mut self, graph: &Graph, id: TensorId) {
        let (rows, cols) = graph.shape(id);
        let count = match self.kind {
            OptimizerKind::Sgd(_) => 1,
            OptimizerKind::Adam(_) => 2,
        };
        self.params.push(ParamState {
            id,
            buffers: vec![Matrix::zeros(rows, cols); count],
        });
    }

    pub fn add_params(&mut self, graph: &Graph, ids: &[TensorId]) {
        for &id in ids {
            self.add_param(graph, id);
        }
    }

    pub fn params(&self) -> Vec<TensorId> {
        self.params.iter().map(|p| p.id).collect()
    }

    /// Applies one update to every registered parameter using its current
    /// gradient.
    pub fn step(&mut self, graph: &mut Graph) {
        self.iteration += 1;
        let t = self.iteration;
        let lr = self.learning_rate;
        for param in &mut self.params {
            let (theta, grad) = graph.value_and_grad_mut(param.id);
            match (&self.kind, param.buffers.as_mut_slice()) {
                (OptimizerKind::Sgd(sgd), [buffer]) => sgd.update(theta, grad, buffer, lr, t == 1),
                (OptimizerKind::Adam(adam), [m, v]) => adam.update(theta, grad, m, v, lr, t),
                _ => unreachable!("optimizer state does not match its kind"),
            }
        }
    }

    pub fn zero_grad(&self, graph: &mut Graph) {
        for param in &self.params {
            graph.zero_grad(&[param.id]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_descends_on_registered_params_only() {
        let mut graph = Graph::new();
        let w = graph.tensor(Matrix::filled(1, 1, 3.0), true);
        let frozen = graph.tensor(Matrix::filled(1, 1, 3.0), false);
        let mut opt = Optimizer::sgd(0.1);
        opt.add_param(&graph, w);

        let prod = graph.mul(w, frozen).unwrap();
        let loss = graph.square(prod);
        graph.backward(loss).unwrap();
        opt.step(&mut graph);

        // d(w*3)^2/dw = 2 * 9 * 3 = 54
        assert!((graph.value(w).data[0] - (3.0 - 5.4)).abs() < 1e-5);
        assert_eq!(graph.value(frozen).data[0], 3.0);
        assert_eq!(opt.iteration, 1);

        opt.zero_grad(&mut graph);
        assert_eq!(graph.grad(w).data[0], 0.0);
    }

    #[test]
    fn state_follows_the_construction_kind() {
        let mut graph = Graph::new();
        let w = graph.tensor(Matrix::filled(2, 1, 1.0), true);
        let mut opt = Optimizer::new(OptimizerKind::Adam(Adam::default()), 0.1);
        opt.add_param(&graph, w);
        assert_eq!(opt.params[0].buffers.len(), 2);
        assert!(matches!(opt.kind(), OptimizerKind::Adam(_)));

        let loss = graph.sum_all(w);
        graph.backward(loss).unwrap();
        opt.step(&mut graph);
        assert!(graph.value(w).all_close(&Matrix::filled(2, 1, 0.9), 1e-5));

        let opt = Optimizer::sgd(0.1);
        assert!(matches!(opt.kind(), OptimizerKind::Sgd(_)));
    }

    #[test]
    fn adam_defaults_learning_rate() {
        assert_eq!(Optimizer::adam(0.0).learning_rate, 0.001);
        assert_eq!(Optimizer::adam(0.03).learning_rate, 0.03);
    }
}
