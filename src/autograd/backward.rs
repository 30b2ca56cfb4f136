use tracing::trace;

use crate::autograd::graph::{Graph, TensorId};
use crate::autograd::op::Op;
use crate::autograd::ops::class_index;
use crate::error::{Error, Result};
use crate::math::matrix::{lanes, Matrix};

impl Graph {
    /// Reverse-mode pass from a `1×1` `root`.
    ///
    /// Every node reachable from `root` adds its contribution to the
    /// gradients of its inputs, so a tensor used twice collects both terms.
    /// Gradients are never cleared here; call [`Graph::zero_grad`] between
    /// steps.
    pub fn backward(&mut self, root: TensorId) -> Result<()> {
        let shape = self.shape(root);
        if shape != (1, 1) {
            return Err(Error::NonScalarRoot(shape));
        }

        let mut reachable = vec![false; root.0 + 1];
        reachable[root.0] = true;
        for i in (0..=root.0).rev() {
            if reachable[i] {
                for input in self.nodes[i].op.inputs() {
                    reachable[input.0] = true;
                }
            }
        }

        self.nodes[root.0].grad.data[0] = 1.0;

        for i in (0..=root.0).rev() {
            if !reachable[i] || self.nodes[i].op == Op::Leaf {
                continue;
            }
            trace!(node = i, op = self.nodes[i].op.name(), "backward");
            for (input, delta) in self.input_deltas(i)? {
                self.nodes[input.0].grad.add_assign_scaled(&delta, 1.0)?;
            }
        }
        Ok(())
    }

    /// Gradient contributions of node `i` to each of its inputs.
    fn input_deltas(&self, i: usize) -> Result<Vec<(TensorId, Matrix)>> {
        let node = &self.nodes[i];
        let g = &node.grad;
        let out = &node.value;

        let deltas = match &node.op {
            Op::Leaf => vec![],
            Op::Add(a, b) | Op::BroadcastAdd(a, b) => vec![
                (*a, g.reduce_to(self.shape(*a))?),
                (*b, g.reduce_to(self.shape(*b))?),
            ],
            Op::Sub(a, b) => vec![
                (*a, g.reduce_to(self.shape(*a))?),
                (*b, g.reduce_to(self.shape(*b))?.scale(-1.0)),
            ],
            Op::Mul(a, b) => vec![
                (*a, g.hadamard(self.value(*b))?),
                (*b, g.hadamard(self.value(*a))?),
            ],
            Op::Scale(a, factor) => vec![(*a, g.scale(*factor))],
            Op::MatMul(a, b) => {
                let (a_value, b_value) = (self.value(*a), self.value(*b));
                let mut da = Matrix::zeros(a_value.rows, a_value.cols);
                Matrix::matmul_add_transpose_right(g, b_value, &mut da)?;
                let mut db = Matrix::zeros(b_value.rows, b_value.cols);
                Matrix::matmul_add_transpose_left(a_value, g, &mut db)?;
                vec![(*a, da), (*b, db)]
            }
            Op::Sigmoid(a) => {
                let local = out.map(|y| y * (1.0 - y));
                vec![(*a, g.hadamard(&local)?)]
            }
            Op::Relu(a) => {
                let mask = self.value(*a).map(|x| if x > 0.0 { 1.0 } else { 0.0 });
                vec![(*a, g.hadamard(&mask)?)]
            }
            Op::Tanh(a) => {
                let local = out.map(|y| 1.0 - y * y);
                vec![(*a, g.hadamard(&local)?)]
            }
            Op::Square(a) => {
                let local = self.value(*a).scale(2.0);
                vec![(*a, g.hadamard(&local)?)]
            }
            Op::Reshape(a) => {
                let (rows, cols) = self.shape(*a);
                vec![(*a, g.reshape(rows, cols)?)]
            }
            Op::Copy(a) => vec![(*a, g.clone())],
            Op::LogSoftmax { input, dim } => {
                // dx_j = g_j - softmax_j * sum_k g_k, per lane.
                let probs = out.map(f32::exp);
                let mut dx = g.clone();
                for lane in lanes(out.shape(), *dim)? {
                    let total: f32 = lane.iter().map(|&idx| g.data[idx]).sum();
                    for &idx in &lane {
                        dx.data[idx] -= probs.data[idx] * total;
                    }
                }
                vec![(*input, dx)]
            }
            Op::NllLoss { log_probs, targets } => {
                let lp = self.value(*log_probs);
                let scale = g.data[0] / lp.rows as f32;
                let mut dx = Matrix::zeros(lp.rows, lp.cols);
                for (row, &target) in self.value(*targets).data.iter().enumerate() {
                    let class = class_index(target, lp.cols)?;
                    dx.set(row, class, -scale);
                }
                vec![(*log_probs, dx)]
            }
            Op::SumAll(a) => {
                let (rows, cols) = self.shape(*a);
                vec![(*a, Matrix::filled(rows, cols, g.data[0]))]
            }
            Op::SelectRows { input, indices } => {
                let (rows, cols) = self.shape(*input);
                let mut dx = Matrix::zeros(rows, cols);
                for (k, &row) in indices.iter().enumerate() {
                    for (o, &v) in dx.data[row * cols..(row + 1) * cols].iter_mut().zip(g.row(k)) {
                        *o += v;
                    }
                }
                vec![(*input, dx)]
            }
        };
        Ok(deltas)
    }
}
