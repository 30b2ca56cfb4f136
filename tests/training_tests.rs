use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use ferrite_grad::network::LayerSpec;
use ferrite_grad::train::Progress;
use ferrite_grad::{
    train_classifier, Activation, DataLoader, Dense, Graph, LossType, Matrix, MnistDataset, Network, NetworkWeights,
    Optimizer, TrainConfig,
};

/// The 32-epoch XOR run: ReLU hidden layer, sum-squared loss, SGD 0.01.
fn xor_losses() -> Vec<f32> {
    let mut graph = Graph::new();
    let x = graph.from_slice(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0], 4, 2).unwrap();
    let y = graph.from_slice(&[0.0, 1.0, 1.0, 0.0], 4, 1).unwrap();
    let hidden = Dense::from_matrices(
        &mut graph,
        Matrix::from_vec(2, 2, vec![0.15, -0.61, -0.26, 0.35]).unwrap(),
        Matrix::from_vec(1, 2, vec![-0.25, 0.68]).unwrap(),
        Activation::ReLU,
    )
    .unwrap();
    let output = Dense::from_matrices(
        &mut graph,
        Matrix::from_vec(2, 1, vec![-0.45, 0.96]).unwrap(),
        Matrix::from_vec(1, 1, vec![0.78]).unwrap(),
        Activation::Identity,
    )
    .unwrap();

    let mut optimizer = Optimizer::sgd(0.01);
    optimizer.add_params(&graph, &hidden.params());
    optimizer.add_params(&graph, &output.params());

    let mark = graph.checkpoint();
    (0..32)
        .map(|_| {
            let h = hidden.forward(&mut graph, x).unwrap();
            let pred = output.forward(&mut graph, h).unwrap();
            let loss = LossType::SumSquared.apply(&mut graph, pred, y).unwrap();
            let value = graph.item(loss).unwrap();
            graph.backward(loss).unwrap();
            optimizer.step(&mut graph);
            optimizer.zero_grad(&mut graph);
            graph.rewind(mark);
            value
        })
        .collect()
}

#[test]
fn test_xor_sgd_is_deterministic_and_improves() {
    let first = xor_losses();
    let second = xor_losses();
    assert_eq!(first, second);
    assert_eq!(first.len(), 32);

    // Outputs before any step: 1.4328, 1.7688, 0.8472, 1.1832.
    assert!((first[0] - 4.0673).abs() < 1e-3, "first loss {}", first[0]);
    assert!(first[31] < first[0]);
}

/// The 250-epoch XOR run: Tanh hidden layer, mean squared error, Adam 0.03.
/// Returns the loss per epoch and the final thresholded predictions.
fn xor_adam_run() -> (Vec<f32>, Vec<u8>) {
    let mut graph = Graph::new();
    let x = graph.from_slice(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0], 4, 2).unwrap();
    let y = graph.from_slice(&[0.0, 1.0, 1.0, 0.0], 4, 1).unwrap();
    let hidden = Dense::from_matrices(
        &mut graph,
        Matrix::from_vec(2, 2, vec![0.15, -0.61, -0.26, 0.35]).unwrap(),
        Matrix::from_vec(1, 2, vec![-0.25, 0.68]).unwrap(),
        Activation::Tanh,
    )
    .unwrap();
    let output = Dense::from_matrices(
        &mut graph,
        Matrix::from_vec(2, 1, vec![-0.45, 0.96]).unwrap(),
        Matrix::from_vec(1, 1, vec![0.78]).unwrap(),
        Activation::Identity,
    )
    .unwrap();

    let mut optimizer = Optimizer::adam(0.03);
    optimizer.add_params(&graph, &hidden.params());
    optimizer.add_params(&graph, &output.params());

    let mark = graph.checkpoint();
    let losses = (0..250)
        .map(|_| {
            let h = hidden.forward(&mut graph, x).unwrap();
            let pred = output.forward(&mut graph, h).unwrap();
            let loss = LossType::MeanSquared.apply(&mut graph, pred, y).unwrap();
            let value = graph.item(loss).unwrap();
            graph.backward(loss).unwrap();
            optimizer.step(&mut graph);
            optimizer.zero_grad(&mut graph);
            graph.rewind(mark);
            value
        })
        .collect();

    let h = hidden.forward(&mut graph, x).unwrap();
    let pred = output.forward(&mut graph, h).unwrap();
    let predicted = graph.value(pred).data.iter().map(|&p| u8::from(p >= 0.5)).collect();
    (losses, predicted)
}

#[test]
fn test_xor_adam_tanh_learns_xor() {
    let (losses, predicted) = xor_adam_run();
    assert_eq!(losses.len(), 250);

    // Outputs before any step: 1.4581, 1.7344, 0.8919, 1.3164.
    assert!((losses[0] - 1.1025).abs() < 1e-3, "first loss {}", losses[0]);
    assert!(losses[249] < 1e-2, "last loss {}", losses[249]);
    assert!(losses[249] < losses[0]);
    assert_eq!(predicted, vec![0, 1, 1, 0]);
}

/// 60 examples of 2×2 images; the label is the index of the bright pixel.
fn bright_pixel_dataset() -> MnistDataset {
    let mut images = Vec::new();
    let mut labels = Vec::new();
    for i in 0..60 {
        let hot = (i * 7) % 4;
        images.extend((0..4).map(|p| if p == hot { 250 } else { 0 }));
        labels.push(hot as u8);
    }
    MnistDataset {
        images,
        labels,
        rows: 2,
        cols: 2,
    }
}

fn tiny_network(graph: &mut Graph) -> Network {
    let mut rng = StdRng::seed_from_u64(11);
    let specs = [
        LayerSpec {
            size: 16,
            input_size: 4,
            activation: Activation::ReLU,
        },
        LayerSpec {
            size: 4,
            input_size: 16,
            activation: Activation::Identity,
        },
    ];
    Network::new(graph, &specs, &mut rng)
}

#[test]
fn test_train_classifier_learns_bright_pixel() {
    let (train, val) = bright_pixel_dataset().train_validation_split(0.8).unwrap();
    let mut train_loader = DataLoader::random(train, 8, 5);
    let mut val_loader = DataLoader::sequential(val, 4);

    let mut graph = Graph::new();
    let network = tiny_network(&mut graph);
    let mut optimizer = Optimizer::adam(0.05);
    optimizer.add_params(&graph, &network.params());
    let nodes = graph.len();

    let config = TrainConfig {
        epochs: 30,
        log_every: 2,
        ..TrainConfig::default()
    };
    let mut seen = Vec::new();
    let mut iterations = Vec::new();
    let history = train_classifier(
        &mut graph,
        &network,
        &mut optimizer,
        &mut train_loader,
        &mut val_loader,
        &config,
        &mut |progress: Progress<'_>| match progress {
            Progress::Epoch(stats) => seen.push(stats.epoch),
            Progress::Iteration { epoch, iteration, loss } => {
                assert!(loss.is_finite());
                iterations.push((epoch, iteration));
            }
        },
    )
    .unwrap();

    assert_eq!(seen, (0..=30).collect::<Vec<_>>());
    // 48 training examples in batches of 8: six steps, reported at 2, 4 and 6.
    assert_eq!(iterations.len(), 30 * 3);
    assert_eq!(&iterations[..3], &[(1, 2), (1, 4), (1, 6)]);
    assert_eq!(history[0].mean_loss, None);
    let last = history.last().unwrap();
    assert!(last.mean_loss.unwrap() < history[1].mean_loss.unwrap());
    assert_eq!(last.validation_accuracy, 100.0);
    // Every step's intermediates were released.
    assert_eq!(graph.len(), nodes);
}

#[test]
fn test_stop_flag_ends_training_early() {
    let (train, val) = bright_pixel_dataset().train_validation_split(0.5).unwrap();
    let mut train_loader = DataLoader::sequential(train, 10);
    let mut val_loader = DataLoader::sequential(val, 10);
    let mut graph = Graph::new();
    let network = tiny_network(&mut graph);
    let mut optimizer = Optimizer::sgd(0.01);
    optimizer.add_params(&graph, &network.params());

    let flag = Arc::new(AtomicBool::new(false));
    let config = TrainConfig {
        epochs: 10,
        stop_flag: Some(flag.clone()),
        ..TrainConfig::default()
    };
    let history = train_classifier(
        &mut graph,
        &network,
        &mut optimizer,
        &mut train_loader,
        &mut val_loader,
        &config,
        &mut |progress: Progress<'_>| {
            if let Progress::Epoch(stats) = progress {
                if stats.epoch == 2 {
                    flag.store(true, Ordering::Relaxed);
                }
            }
        },
    )
    .unwrap();
    assert_eq!(history.len(), 3);
}

#[test]
fn test_weights_round_trip_through_json() {
    let mut graph = Graph::new();
    let network = tiny_network(&mut graph);
    let snapshot = NetworkWeights::snapshot(&graph, &network);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.json");
    snapshot.save_json(path.to_str().unwrap()).unwrap();
    let loaded = NetworkWeights::load_json(path.to_str().unwrap()).unwrap();

    let mut other = Graph::new();
    let rebuilt = Network::from_weights(&mut other, &loaded).unwrap();
    let input = other.from_slice(&[0.0, 1.0, 0.0, 0.0], 1, 4).unwrap();
    let a = rebuilt.forward(&mut other, input).unwrap();

    let input = graph.from_slice(&[0.0, 1.0, 0.0, 0.0], 1, 4).unwrap();
    let b = network.forward(&mut graph, input).unwrap();
    assert!(other.value(a).all_close(graph.value(b), 1e-6));
}
