use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `(rows, cols)`.
pub type Shape = (usize, usize);

/// Offset added inside `ln` so that a zero probability never yields `-inf`.
pub const LOG_EPS: f32 = 1e-10;

/// Dense row-major 2-D matrix of `f32`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f32) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Wraps `data` (row-major) without copying. Fails if the length does not
    /// match `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Matrix> {
        if data.len() != rows * cols {
            return Err(Error::DataLength {
                rows,
                cols,
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Evenly spaced values from `lo` towards `hi` (exclusive), filled in
    /// row-major order.
    pub fn linspace(rows: usize, cols: usize, lo: f32, hi: f32) -> Matrix {
        let n = rows * cols;
        let step = if n == 0 { 0.0 } else { (hi - lo) / n as f32 };
        Matrix {
            rows,
            cols,
            data: (0..n).map(|i| lo + step * i as f32).collect(),
        }
    }

    /// Samples every entry uniformly from `[lo, hi)`.
    pub fn uniform<R: Rng + ?Sized>(rows: usize, cols: usize, lo: f32, hi: f32, rng: &mut R) -> Matrix {
        Matrix {
            rows,
            cols,
            data: (0..rows * cols).map(|_| rng.gen_range(lo..hi)).collect(),
        }
    }

    pub fn shape(&self) -> Shape {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    /// Same data, different shape. The element count must be preserved.
    pub fn reshape(&self, rows: usize, cols: usize) -> Result<Matrix> {
        if rows * cols != self.len() {
            return Err(Error::ShapeMismatch {
                op: "reshape",
                left: self.shape(),
                right: (rows, cols),
            });
        }
        Ok(Matrix {
            rows,
            cols,
            data: self.data.clone(),
        })
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f32) -> f32,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    fn zip_with<F>(&self, other: &Matrix, op: &'static str, functor: F) -> Result<Matrix>
    where
        F: Fn(f32, f32) -> f32,
    {
        self.check_same_shape(other, op)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| functor(a, b))
                .collect(),
        })
    }

    pub fn check_same_shape(&self, other: &Matrix, op: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                op,
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "sub", |a, b| a - b)
    }

    /// Element-wise product.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "hadamard", |a, b| a * b)
    }

    pub fn scale(&self, factor: f32) -> Matrix {
        self.map(|x| x * factor)
    }

    /// `self += factor * other`, in place.
    pub fn add_assign_scaled(&mut self, other: &Matrix, factor: f32) -> Result<()> {
        self.check_same_shape(other, "add_assign")?;
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a += factor * b;
        }
        Ok(())
    }

    /// Whether `other` can be broadcast onto a matrix of this shape: it must
    /// match exactly, or be a `1×cols` row, a `rows×1` column, or a `1×1`.
    pub fn broadcasts_from(&self, other: &Matrix) -> bool {
        let (r, c) = other.shape();
        (r == self.rows || r == 1) && (c == self.cols || c == 1)
    }

    /// `self + other`, where `other` is repeated along any axis of length 1.
    pub fn broadcast_add(&self, other: &Matrix) -> Result<Matrix> {
        if !self.broadcasts_from(other) {
            return Err(Error::ShapeMismatch {
                op: "broadcast_add",
                left: self.shape(),
                right: other.shape(),
            });
        }
        let mut res = self.clone();
        for i in 0..self.rows {
            let oi = if other.rows == 1 { 0 } else { i };
            for j in 0..self.cols {
                let oj = if other.cols == 1 { 0 } else { j };
                res.data[i * self.cols + j] += other.data[oi * other.cols + oj];
            }
        }
        Ok(res)
    }

    /// Sums `self` down to `shape` along every axis on which `shape` has
    /// length 1. This is the adjoint of `broadcast_add`.
    pub fn reduce_to(&self, shape: Shape) -> Result<Matrix> {
        let (r, c) = shape;
        if !((r == self.rows || r == 1) && (c == self.cols || c == 1)) {
            return Err(Error::ShapeMismatch {
                op: "reduce_to",
                left: self.shape(),
                right: shape,
            });
        }
        let mut res = Matrix::zeros(r, c);
        for i in 0..self.rows {
            let ri = if r == 1 { 0 } else { i };
            for j in 0..self.cols {
                let rj = if c == 1 { 0 } else { j };
                res.data[ri * c + rj] += self.data[i * self.cols + j];
            }
        }
        Ok(res)
    }

    pub fn matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(Error::ShapeMismatch {
                op: "matmul",
                left: self.shape(),
                right: rhs.shape(),
            });
        }
        let mut res = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
                let out_row = &mut res.data[i * rhs.cols..(i + 1) * rhs.cols];
                for (o, &b) in out_row.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }
        Ok(res)
    }

    /// `c += a · bᵀ`
    pub fn matmul_add_transpose_right(a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        if a.cols != b.cols || c.rows != a.rows || c.cols != b.rows {
            return Err(Error::ShapeMismatch {
                op: "matmul_add_transpose_right",
                left: a.shape(),
                right: b.shape(),
            });
        }
        for i in 0..a.rows {
            let a_row = a.row(i);
            for j in 0..b.rows {
                let dot: f32 = a_row.iter().zip(b.row(j)).map(|(x, y)| x * y).sum();
                c.data[i * c.cols + j] += dot;
            }
        }
        Ok(())
    }

    /// `c += aᵀ · b`
    pub fn matmul_add_transpose_left(a: &Matrix, b: &Matrix, c: &mut Matrix) -> Result<()> {
        if a.rows != b.rows || c.rows != a.cols || c.cols != b.cols {
            return Err(Error::ShapeMismatch {
                op: "matmul_add_transpose_left",
                left: a.shape(),
                right: b.shape(),
            });
        }
        for k in 0..a.rows {
            let b_row = b.row(k);
            for i in 0..a.cols {
                let x = a.data[k * a.cols + i];
                let out_row = &mut c.data[i * c.cols..(i + 1) * c.cols];
                for (o, &y) in out_row.iter_mut().zip(b_row) {
                    *o += x * y;
                }
            }
        }
        Ok(())
    }

    /// Softmax along `dim` (1 normalises each row, 0 each column).
    pub fn softmax(&self, dim: usize) -> Result<Matrix> {
        let mut res = self.clone();
        for lane in lanes(self.shape(), dim)? {
            let max = lane
                .iter()
                .map(|&idx| self.data[idx])
                .fold(f32::NEG_INFINITY, f32::max);
            let mut total = 0.0;
            for &idx in &lane {
                let e = (self.data[idx] - max).exp();
                res.data[idx] = e;
                total += e;
            }
            for &idx in &lane {
                res.data[idx] /= total;
            }
        }
        Ok(res)
    }

    pub fn log_softmax(&self, dim: usize) -> Result<Matrix> {
        Ok(self.softmax(dim)?.map(|p| (p + LOG_EPS).ln()))
    }

    /// Column vector holding the index of the largest entry of each row.
    /// Ties resolve to the first maximum.
    pub fn argmax_rows(&self) -> Matrix {
        let mut res = Matrix::zeros(self.rows, 1);
        for i in 0..self.rows {
            let mut best = 0;
            let row = self.row(i);
            for (j, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = j;
                }
            }
            res.data[i] = best as f32;
        }
        res
    }

    /// `1×cols`: each column summed over the rows.
    pub fn sum_rows(&self) -> Matrix {
        let mut res = Matrix::zeros(1, self.cols);
        for i in 0..self.rows {
            for (o, &v) in res.data.iter_mut().zip(self.row(i)) {
                *o += v;
            }
        }
        res
    }

    /// `rows×1`: each row summed over the columns.
    pub fn sum_cols(&self) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: 1,
            data: (0..self.rows).map(|i| self.row(i).iter().sum()).collect(),
        }
    }

    pub fn sum_all(&self) -> f32 {
        self.data.iter().sum()
    }

    pub fn all_close(&self, other: &Matrix, eps: f32) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix {
            rows: 0,
            cols: 0,
            data: vec![],
        }
    }
}

/// Flat indices of every row (`dim == 1`) or every column (`dim == 0`).
pub(crate) fn lanes(shape: Shape, dim: usize) -> Result<Vec<Vec<usize>>> {
    let (rows, cols) = shape;
    match dim {
        1 => Ok((0..rows)
            .map(|i| (0..cols).map(|j| i * cols + j).collect())
            .collect()),
        0 => Ok((0..cols)
            .map(|j| (0..rows).map(|i| i * cols + j).collect())
            .collect()),
        other => Err(Error::InvalidDim(other)),
    }
}
