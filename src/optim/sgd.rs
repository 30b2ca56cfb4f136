use serde::{Deserialize, Serialize};

use crate::math::matrix::Matrix;

/// Stochastic gradient descent with optional momentum, dampening, weight
/// decay and Nesterov momentum. Everything defaults to off, which gives the
/// plain `θ -= lr · g` update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sgd {
    pub momentum: f32,
    pub dampening: f32,
    pub weight_decay: f32,
    pub nesterov: bool,
}

impl Sgd {
    pub fn with_momentum(momentum: f32) -> Self {
        Sgd {
            momentum,
            ..Sgd::default()
        }
    }

    /// Updates `theta` in place. `buffer` is the momentum buffer for this
    /// parameter and `first_step` marks the optimizer's first iteration.
    pub(crate) fn update(&self, theta: &mut Matrix, grad: &Matrix, buffer: &mut Matrix, lr: f32, first_step: bool) {
        for i in 0..theta.data.len() {
            let mut g = grad.data[i];
            if self.weight_decay != 0.0 {
                g += self.weight_decay * theta.data[i];
            }

            if self.momentum != 0.0 {
                let b = &mut buffer.data[i];
                *b = if first_step {
                    g
                } else {
                    self.momentum * *b + (1.0 - self.dampening) * g
                };
                g = if self.nesterov { g + self.momentum * *b } else { *b };
            }

            theta.data[i] -= lr * g;
        }
    }
}
