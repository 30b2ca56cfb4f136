use crate::autograd::graph::{Graph, TensorId};
use crate::autograd::op::Op;
use crate::error::{Error, Result};
use crate::math::matrix::{Matrix, Shape};

impl Graph {
    fn record(&mut self, value: Matrix, op: Op) -> TensorId {
        let requires_grad = op.inputs().iter().any(|id| self.requires_grad(*id));
        self.push(value, requires_grad, op)
    }

    fn mismatch(&self, op: &'static str, a: TensorId, b: TensorId) -> Error {
        Error::ShapeMismatch {
            op,
            left: self.shape(a),
            right: self.shape(b),
        }
    }

    /// `a + b`. If the shapes differ, the smaller operand is broadcast along
    /// its length-1 axes.
    pub fn add(&mut self, a: TensorId, b: TensorId) -> Result<TensorId> {
        if self.shape(a) == self.shape(b) {
            let value = self.value(a).add(self.value(b))?;
            return Ok(self.record(value, Op::Add(a, b)));
        }
        let (big, small) = if self.value(a).broadcasts_from(self.value(b)) {
            (a, b)
        } else if self.value(b).broadcasts_from(self.value(a)) {
            (b, a)
        } else {
            return Err(self.mismatch("add", a, b));
        };
        let value = self.value(big).broadcast_add(self.value(small))?;
        Ok(self.record(value, Op::BroadcastAdd(big, small)))
    }

    /// `a - b`, where `b` may be broadcast onto `a`.
    pub fn sub(&mut self, a: TensorId, b: TensorId) -> Result<TensorId> {
        if !self.value(a).broadcasts_from(self.value(b)) {
            return Err(self.mismatch("sub", a, b));
        }
        let negated = self.value(b).scale(-1.0);
        let value = self.value(a).broadcast_add(&negated)?;
        Ok(self.record(value, Op::Sub(a, b)))
    }

    /// Element-wise product of two equally shaped tensors.
    pub fn mul(&mut self, a: TensorId, b: TensorId) -> Result<TensorId> {
        let value = self.value(a).hadamard(self.value(b))?;
        Ok(self.record(value, Op::Mul(a, b)))
    }

    pub fn scale(&mut self, a: TensorId, factor: f32) -> TensorId {
        let value = self.value(a).scale(factor);
        self.record(value, Op::Scale(a, factor))
    }

    pub fn matmul(&mut self, a: TensorId, b: TensorId) -> Result<TensorId> {
        let value = self.value(a).matmul(self.value(b))?;
        Ok(self.record(value, Op::MatMul(a, b)))
    }

    pub fn sigmoid(&mut self, a: TensorId) -> TensorId {
        let value = self.value(a).map(|x| 1.0 / (1.0 + (-x).exp()));
        self.record(value, Op::Sigmoid(a))
    }

    pub fn relu(&mut self, a: TensorId) -> TensorId {
        let value = self.value(a).map(|x| x.max(0.0));
        self.record(value, Op::Relu(a))
    }

    pub fn tanh(&mut self, a: TensorId) -> TensorId {
        let value = self.value(a).map(f32::tanh);
        self.record(value, Op::Tanh(a))
    }

    pub fn square(&mut self, a: TensorId) -> TensorId {
        let value = self.value(a).map(|x| x * x);
        self.record(value, Op::Square(a))
    }

    pub fn reshape(&mut self, a: TensorId, shape: Shape) -> Result<TensorId> {
        let value = self.value(a).reshape(shape.0, shape.1)?;
        Ok(self.record(value, Op::Reshape(a)))
    }

    pub fn copy(&mut self, a: TensorId) -> TensorId {
        let value = self.value(a).clone();
        self.record(value, Op::Copy(a))
    }

    /// Log-probabilities along `dim` (1: per row, 0: per column).
    pub fn log_softmax(&mut self, input: TensorId, dim: usize) -> Result<TensorId> {
        let value = self.value(input).log_softmax(dim)?;
        Ok(self.record(value, Op::LogSoftmax { input, dim }))
    }

    /// Mean negative log-likelihood of `targets` (an `n×1` column of class
    /// indices) under the row-wise `log_probs`.
    pub fn nll_loss(&mut self, log_probs: TensorId, targets: TensorId) -> Result<TensorId> {
        let lp = self.value(log_probs);
        let t = self.value(targets);
        if t.shape() != (lp.rows, 1) {
            return Err(self.mismatch("nll_loss", log_probs, targets));
        }
        let mut total = 0.0;
        for (i, &target) in t.data.iter().enumerate() {
            let class = class_index(target, lp.cols)?;
            total -= lp.get(i, class);
        }
        let value = Matrix::filled(1, 1, total / lp.rows as f32);
        Ok(self.record(value, Op::NllLoss { log_probs, targets }))
    }

    /// Sum along `axis`: 0 collapses the rows (`1×cols`), 1 the columns
    /// (`rows×1`). Expressed as a product with a vector of ones.
    pub fn sum(&mut self, x: TensorId, axis: usize) -> Result<TensorId> {
        let (rows, cols) = self.shape(x);
        match axis {
            0 => {
                let ones = self.ones((1, rows));
                self.matmul(ones, x)
            }
            1 => {
                let ones = self.ones((cols, 1));
                self.matmul(x, ones)
            }
            other => Err(Error::InvalidDim(other)),
        }
    }

    pub fn sum_all(&mut self, a: TensorId) -> TensorId {
        let value = Matrix::filled(1, 1, self.value(a).sum_all());
        self.record(value, Op::SumAll(a))
    }

    /// `0.5 / batch * Σ (pred - target)²`, where `batch` is the row count.
    pub fn mse_loss(&mut self, pred: TensorId, target: TensorId) -> Result<TensorId> {
        let batch = self.shape(pred).0.max(1);
        let diff = self.sub(pred, target)?;
        let squared = self.square(diff);
        let total = self.sum_all(squared);
        Ok(self.scale(total, 0.5 / batch as f32))
    }

    /// Mean of `(pred - target)²` over every element.
    pub fn mean_squared_loss(&mut self, pred: TensorId, target: TensorId) -> Result<TensorId> {
        let count = self.value(pred).len().max(1);
        let diff = self.sub(pred, target)?;
        let squared = self.square(diff);
        let total = self.sum_all(squared);
        Ok(self.scale(total, 1.0 / count as f32))
    }

    /// Gathers the given rows of `input` into a new `indices.len()×cols` tensor.
    pub fn select_rows(&mut self, input: TensorId, indices: &[usize]) -> Result<TensorId> {
        let source = self.value(input);
        let mut data = Vec::with_capacity(indices.len() * source.cols);
        for &row in indices {
            if row >= source.rows {
                return Err(Error::ShapeMismatch {
                    op: "select_rows",
                    left: source.shape(),
                    right: (row, source.cols),
                });
            }
            data.extend_from_slice(source.row(row));
        }
        let value = Matrix::from_vec(indices.len(), source.cols, data)?;
        Ok(self.record(
            value,
            Op::SelectRows {
                input,
                indices: indices.to_vec(),
            },
        ))
    }
}

pub(crate) fn class_index(target: f32, classes: usize) -> Result<usize> {
    if target < 0.0 || target as usize >= classes {
        return Err(Error::ClassOutOfRange {
            index: target.max(0.0) as usize,
            classes,
        });
    }
    Ok(target as usize)
}
