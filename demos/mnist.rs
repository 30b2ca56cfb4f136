//! MNIST digit classification.
//!
//! Architecture: 784 → 32 (ReLU) → 10 (log-softmax)
//! Loss:         negative log-likelihood
//! Optimizer:    SGD, lr = 0.01
//! Batches:      64 (random sampling) for training, 128 for validation
//!
//! Run with:
//!   cargo run --example mnist --release [-- <train-config.json>]
//!
//! The dataset is read from `$FERRITE_MNIST_DIR` (default `data/mnist`).

use std::path::Path;
use std::process::ExitCode;

use rand::rngs::StdRng;
use rand::SeedableRng;

use ferrite_grad::data::download::data_dir;
use ferrite_grad::train::Progress;
use ferrite_grad::{
    logging, train_classifier, DataLoader, Error, Graph, MnistDataset, Network, NetworkSpec, Optimizer, Result,
    TrainConfig,
};

fn run(config: &TrainConfig) -> Result<()> {
    let dataset = MnistDataset::load_training(&data_dir())?;
    let (training, validation) = dataset.train_validation_split(config.training_split)?;

    let mut train_loader = DataLoader::random(training, config.train_batch_size, config.seed);
    let mut val_loader = DataLoader::sequential(validation, config.validation_batch_size);

    let mut graph = Graph::new();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let network = Network::new(&mut graph, &NetworkSpec::mnist_mlp(32).layers, &mut rng);

    let mut optimizer = Optimizer::sgd(config.learning_rate);
    optimizer.add_params(&graph, &network.params());

    train_classifier(
        &mut graph,
        &network,
        &mut optimizer,
        &mut train_loader,
        &mut val_loader,
        config,
        &mut |progress: Progress<'_>| match progress {
            Progress::Iteration { epoch, iteration, loss } => {
                println!("Epoch {epoch}, Iteration {iteration}: Loss: {loss:.6}")
            }
            Progress::Epoch(stats) => match stats.mean_loss {
                None => println!("Epoch {}: Validation Accuracy: {:.6}", stats.epoch, stats.validation_accuracy),
                Some(loss) => println!(
                    "Epoch {}: Loss: {loss:.6}, Validation Accuracy: {:.6}",
                    stats.epoch, stats.validation_accuracy
                ),
            },
        },
    )?;
    println!("Training Complete!");
    Ok(())
}

fn main() -> ExitCode {
    logging::init("info");

    let config = match std::env::args().nth(1) {
        Some(path) => TrainConfig::load_json(Path::new(&path)),
        None => Ok(TrainConfig::default()),
    };
    let outcome = config.and_then(|config| run(&config));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::FileNotFound(path)) => {
            eprintln!("Could not find {}.", path.display());
            eprintln!("Download the dataset first with `cargo run --example download_datasets`.");
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
