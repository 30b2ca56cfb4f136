use crate::autograd::graph::TensorId;

/// The operation that produced a node, with the ids of its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Leaf,
    Add(TensorId, TensorId),
    /// Second operand is broadcast onto the first.
    BroadcastAdd(TensorId, TensorId),
    Sub(TensorId, TensorId),
    /// Element-wise product.
    Mul(TensorId, TensorId),
    Scale(TensorId, f32),
    MatMul(TensorId, TensorId),
    Sigmoid(TensorId),
    Relu(TensorId),
    Tanh(TensorId),
    Square(TensorId),
    Reshape(TensorId),
    Copy(TensorId),
    LogSoftmax { input: TensorId, dim: usize },
    /// Mean negative log-likelihood. `targets` holds class indices and never
    /// receives a gradient.
    NllLoss { log_probs: TensorId, targets: TensorId },
    SumAll(TensorId),
    SelectRows { input: TensorId, indices: Vec<usize> },
}

impl Op {
    /// Inputs that gradients flow back into.
    pub fn inputs(&self) -> Vec<TensorId> {
        match self {
            Op::Leaf => vec![],
            Op::Add(a, b)
            | Op::BroadcastAdd(a, b)
            | Op::Sub(a, b)
            | Op::Mul(a, b)
            | Op::MatMul(a, b) => vec![*a, *b],
            Op::Scale(a, _)
            | Op::Sigmoid(a)
            | Op::Relu(a)
            | Op::Tanh(a)
            | Op::Square(a)
            | Op::Reshape(a)
            | Op::Copy(a)
            | Op::SumAll(a) => vec![*a],
            Op::LogSoftmax { input, .. } | Op::SelectRows { input, .. } => vec![*input],
            Op::NllLoss { log_probs, .. } => vec![*log_probs],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Leaf => "leaf",
            Op::Add(..) => "add",
            Op::BroadcastAdd(..) => "broadcast_add",
            Op::Sub(..) => "sub",
            Op::Mul(..) => "mul",
            Op::Scale(..) => "scale",
            Op::MatMul(..) => "matmul",
            Op::Sigmoid(..) => "sigmoid",
            Op::Relu(..) => "relu",
            Op::Tanh(..) => "tanh",
            Op::Square(..) => "square",
            Op::Reshape(..) => "reshape",
            Op::Copy(..) => "copy",
            Op::LogSoftmax { .. } => "log_softmax",
            Op::NllLoss { .. } => "nll_loss",
            Op::SumAll(..) => "sum_all",
            Op::SelectRows { .. } => "select_rows",
        }
    }
}
