use ferrite_grad::optim::{Adam, OptimizerKind, Sgd};
use ferrite_grad::{Graph, Matrix, Optimizer, TensorId};

fn close(actual: &[f32], expected: &[f32]) -> bool {
    actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, e)| (a - e).abs() < 1e-5)
}

/// One parameter `w` and loss `Σ w²`, so the gradient is `2w`.
fn quadratic(graph: &mut Graph, init: &[f32]) -> TensorId {
    let value = Matrix::from_vec(1, init.len(), init.to_vec()).unwrap();
    graph.tensor(value, true)
}

fn step(graph: &mut Graph, optimizer: &mut Optimizer, w: TensorId) {
    let mark = graph.checkpoint();
    optimizer.zero_grad(graph);
    let sq = graph.square(w);
    let loss = graph.sum_all(sq);
    graph.backward(loss).unwrap();
    optimizer.step(graph);
    graph.rewind(mark);
}

#[test]
fn test_plain_sgd_step() {
    let mut graph = Graph::new();
    let w = quadratic(&mut graph, &[1.0, -2.0]);
    let mut optimizer = Optimizer::sgd(0.1);
    optimizer.add_param(&graph, w);

    step(&mut graph, &mut optimizer, w);
    // w - 0.1 * 2w = 0.8w
    assert!(close(&graph.value(w).data, &[0.8, -1.6]));
    assert_eq!(optimizer.iteration, 1);
}

#[test]
fn test_sgd_momentum_uses_gradient_on_first_step() {
    let mut graph = Graph::new();
    let w = quadratic(&mut graph, &[1.0]);
    let sgd = Sgd::with_momentum(0.9);
    let mut optimizer = Optimizer::new(OptimizerKind::Sgd(sgd), 0.1);
    optimizer.add_param(&graph, w);

    // t=1: buffer = g = 2, w = 1 - 0.2 = 0.8
    step(&mut graph, &mut optimizer, w);
    assert!(close(&graph.value(w).data, &[0.8]));

    // t=2: g = 1.6, buffer = 0.9 * 2 + 1.6 = 3.4, w = 0.8 - 0.34 = 0.46
    step(&mut graph, &mut optimizer, w);
    assert!(close(&graph.value(w).data, &[0.46]));
}

#[test]
fn test_sgd_nesterov_and_weight_decay() {
    let mut graph = Graph::new();
    let w = quadratic(&mut graph, &[1.0]);
    let sgd = Sgd {
        momentum: 0.5,
        dampening: 0.0,
        weight_decay: 0.1,
        nesterov: true,
    };
    let mut optimizer = Optimizer::new(OptimizerKind::Sgd(sgd), 0.1);
    optimizer.add_param(&graph, w);

    // g = 2 + 0.1 = 2.1, buffer = 2.1, nesterov g = 2.1 + 0.5 * 2.1 = 3.15
    step(&mut graph, &mut optimizer, w);
    assert!(close(&graph.value(w).data, &[1.0 - 0.315]));
}

#[test]
fn test_adam_first_step_moves_by_learning_rate() {
    let mut graph = Graph::new();
    let w = quadratic(&mut graph, &[3.0, -0.5]);
    let mut optimizer = Optimizer::adam(0.01);
    optimizer.add_param(&graph, w);

    step(&mut graph, &mut optimizer, w);
    // With bias correction m̂/√v̂ = sign(g) on the first step.
    assert!(close(&graph.value(w).data, &[2.99, -0.49]));
}

#[test]
fn test_adam_zero_learning_rate_selects_default() {
    let optimizer = Optimizer::adam(0.0);
    assert_eq!(optimizer.learning_rate, 0.001);
    assert!(matches!(optimizer.kind(), OptimizerKind::Adam(Adam { .. })));
}

#[test]
fn test_zero_grad_clears_registered_params_only() {
    let mut graph = Graph::new();
    let w = quadratic(&mut graph, &[1.0]);
    let other = quadratic(&mut graph, &[1.0]);
    let mut optimizer = Optimizer::sgd(0.1);
    optimizer.add_param(&graph, w);

    let both = graph.mul(w, other).unwrap();
    graph.backward(both).unwrap();
    optimizer.zero_grad(&mut graph);

    assert_eq!(graph.grad(w).data, vec![0.0]);
    assert_eq!(graph.grad(other).data, vec![1.0]);
    assert_eq!(optimizer.params(), vec![w]);
}

#[test]
fn test_optimizer_kind_from_json() {
    let kind: OptimizerKind = serde_json::from_str(r#"{"type": "sgd", "momentum": 0.9}"#).unwrap();
    assert_eq!(kind, OptimizerKind::Sgd(Sgd::with_momentum(0.9)));
    let kind: OptimizerKind = serde_json::from_str(r#"{"type": "adam"}"#).unwrap();
    assert_eq!(kind, OptimizerKind::Adam(Adam::default()));
}
