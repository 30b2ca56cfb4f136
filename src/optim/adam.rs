use serde::{Deserialize, Serialize};

use crate::math::matrix::Matrix;

pub const DEFAULT_LEARNING_RATE: f32 = 0.001;

/// Adam with bias-corrected first and second moment estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
}

impl Default for Adam {
    fn default() -> Self {
        Adam {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

impl Adam {
    /// One update at 1-based step `t`.
    pub(crate) fn update(&self, theta: &mut Matrix, grad: &Matrix, m: &mut Matrix, v: &mut Matrix, lr: f32, t: u32) {
        let correction1 = 1.0 - self.beta1.powi(t as i32);
        let correction2 = 1.0 - self.beta2.powi(t as i32);
        for i in 0..theta.data.len() {
            let g = grad.data[i];
            m.data[i] = self.beta1 * m.data[i] + (1.0 - self.beta1) * g;
            v.data[i] = self.beta2 * v.data[i] + (1.0 - self.beta2) * g * g;
            let m_hat = m.data[i] / correction1;
            let v_hat = v.data[i] / correction2;
            theta.data[i] -= lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        // With bias correction the first step is lr * g / |g|.
        let adam = Adam::default();
        let mut theta = Matrix::from_vec(1, 2, vec![1.0, 1.0]).unwrap();
        let grad = Matrix::from_vec(1, 2, vec![4.0, -0.5]).unwrap();
        let mut m = Matrix::zeros(1, 2);
        let mut v = Matrix::zeros(1, 2);
        adam.update(&mut theta, &grad, &mut m, &mut v, 0.01, 1);
        assert!(theta.all_close(&Matrix::from_vec(1, 2, vec![0.99, 1.01]).unwrap(), 1e-5));
    }
}
