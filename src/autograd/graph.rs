use rand::Rng;

use crate::autograd::op::Op;
use crate::error::{Error, Result};
use crate::math::matrix::{Matrix, Shape};

/// Two values closer than this compare equal in [`Graph::equal`].
pub const EQUAL_EPS: f32 = 1e-4;

/// Handle to a tensor stored in a [`Graph`].
///
/// Ids are plain indices into the graph's node list. An id stays valid until
/// the graph is rewound to a checkpoint taken before the id was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub(crate) usize);

impl TensorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Position in the tape returned by [`Graph::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) value: Matrix,
    pub(crate) grad: Matrix,
    pub(crate) requires_grad: bool,
    pub(crate) op: Op,
}

/// Owns every tensor, its gradient and the operation that produced it.
///
/// Nodes are only ever appended, so creation order is a valid topological
/// order for the backward pass. Long-lived tensors (parameters) are created
/// first. Everything a single training step builds on top of them is dropped
/// again with [`Graph::rewind`].
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Graph { nodes: Vec::new() }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.nodes.len())
    }

    /// Drops every node created after `checkpoint` and returns how many were
    /// removed.
    pub fn rewind(&mut self, checkpoint: Checkpoint) -> usize {
        let old_len = self.nodes.len();
        self.nodes.truncate(checkpoint.0);
        old_len.saturating_sub(checkpoint.0)
    }

    pub(crate) fn push(&mut self, value: Matrix, requires_grad: bool, op: Op) -> TensorId {
        let id = TensorId(self.nodes.len());
        let grad = Matrix::zeros(value.rows, value.cols);
        self.nodes.push(Node {
            value,
            grad,
            requires_grad,
            op,
        });
        id
    }

    // -----------------------------------------------------------------------
    // Leaves
    // -----------------------------------------------------------------------

    pub fn tensor(&mut self, value: Matrix, requires_grad: bool) -> TensorId {
        self.push(value, requires_grad, Op::Leaf)
    }

    /// Leaf built from row-major `data`, not tracked for optimisation.
    pub fn from_slice(&mut self, data: &[f32], rows: usize, cols: usize) -> Result<TensorId> {
        let value = Matrix::from_vec(rows, cols, data.to_vec())?;
        Ok(self.tensor(value, false))
    }

    pub fn constant(&mut self, shape: Shape, value: f32) -> TensorId {
        self.tensor(Matrix::filled(shape.0, shape.1, value), false)
    }

    pub fn ones(&mut self, shape: Shape) -> TensorId {
        self.constant(shape, 1.0)
    }

    pub fn zeros(&mut self, shape: Shape) -> TensorId {
        self.constant(shape, 0.0)
    }

    pub fn linspace(&mut self, shape: Shape, lo: f32, hi: f32) -> TensorId {
        self.tensor(Matrix::linspace(shape.0, shape.1, lo, hi), false)
    }

    /// Trainable leaf initialised uniformly in `[-1, 1)`.
    pub fn parameter<R: Rng + ?Sized>(&mut self, rows: usize, cols: usize, rng: &mut R) -> TensorId {
        self.tensor(Matrix::uniform(rows, cols, -1.0, 1.0, rng), true)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn value(&self, id: TensorId) -> &Matrix {
        &self.nodes[id.0].value
    }

    pub fn grad(&self, id: TensorId) -> &Matrix {
        &self.nodes[id.0].grad
    }

    pub fn shape(&self, id: TensorId) -> Shape {
        self.nodes[id.0].value.shape()
    }

    pub fn requires_grad(&self, id: TensorId) -> bool {
        self.nodes[id.0].requires_grad
    }

    /// Replaces the stored value of a leaf. The new value must keep its shape.
    pub fn set_value(&mut self, id: TensorId, value: Matrix) -> Result<()> {
        self.nodes[id.0].value.check_same_shape(&value, "set_value")?;
        self.nodes[id.0].value = value;
        Ok(())
    }

    /// `grad(id) += delta`
    pub fn accumulate_grad(&mut self, id: TensorId, delta: &Matrix) -> Result<()> {
        self.nodes[id.0].grad.add_assign_scaled(delta, 1.0)
    }

    /// Mutable value together with the current gradient, for optimizers.
    pub fn value_and_grad_mut(&mut self, id: TensorId) -> (&mut Matrix, &Matrix) {
        let node = &mut self.nodes[id.0];
        (&mut node.value, &node.grad)
    }

    pub fn zero_grad(&mut self, ids: &[TensorId]) {
        for id in ids {
            self.nodes[id.0].grad.data.fill(0.0);
        }
    }

    /// Value of a `1×1` tensor.
    pub fn item(&self, id: TensorId) -> Result<f32> {
        let value = self.value(id);
        if value.shape() != (1, 1) {
            return Err(Error::NotAScalar(value.shape()));
        }
        Ok(value.data[0])
    }

    pub fn all_close(&self, a: TensorId, b: TensorId, eps: f32) -> bool {
        self.value(a).all_close(self.value(b), eps)
    }

    // -----------------------------------------------------------------------
    // Non-differentiable queries
    // -----------------------------------------------------------------------

    /// `rows×1` column holding the index of each row's largest entry.
    pub fn argmax(&mut self, x: TensorId) -> TensorId {
        let value = self.value(x).argmax_rows();
        self.tensor(value, false)
    }

    /// 1.0 wherever `a` and `b` agree to within [`EQUAL_EPS`], 0.0 elsewhere.
    pub fn equal(&mut self, a: TensorId, b: TensorId) -> Result<TensorId> {
        let left = self.value(a);
        let right = self.value(b);
        left.check_same_shape(right, "equal")?;
        let data = left
            .data
            .iter()
            .zip(&right.data)
            .map(|(x, y)| if (x - y).abs() < EQUAL_EPS { 1.0 } else { 0.0 })
            .collect();
        let value = Matrix::from_vec(left.rows, left.cols, data)?;
        Ok(self.tensor(value, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rewind_keeps_nodes_before_checkpoint() {
        let mut graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(7);
        let w = graph.parameter(2, 2, &mut rng);
        let mark = graph.checkpoint();
        graph.ones((3, 3));
        graph.ones((1, 1));
        assert_eq!(graph.rewind(mark), 2);
        assert_eq!(graph.len(), 1);
        assert!(graph.requires_grad(w));
        assert!(graph.value(w).data.iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn item_requires_scalar() {
        let mut graph = Graph::new();
        let t = graph.ones((1, 2));
        assert!(matches!(graph.item(t), Err(Error::NotAScalar((1, 2)))));
        let s = graph.constant((1, 1), 4.0);
        assert_eq!(graph.item(s).unwrap(), 4.0);
    }

    #[test]
    fn equal_uses_tolerance() {
        let mut graph = Graph::new();
        let a = graph.from_slice(&[1.0, 2.0, 3.0], 3, 1).unwrap();
        let b = graph.from_slice(&[1.00001, 2.5, 3.0], 3, 1).unwrap();
        let e = graph.equal(a, b).unwrap();
        assert_eq!(graph.value(e).data, vec![1.0, 0.0, 1.0]);
    }
}
