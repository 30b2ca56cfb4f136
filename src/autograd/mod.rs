mod backward;
pub mod graph;
pub mod op;
mod ops;

pub use graph::{Checkpoint, Graph, TensorId, EQUAL_EPS};
pub use op::Op;
