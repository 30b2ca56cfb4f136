use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, info};

use crate::autograd::Graph;
use crate::data::mnist::DataLoader;
use crate::error::{Error, Result};
use crate::network::network::Network;
use crate::optim::Optimizer;
use crate::train::epoch_stats::{EpochStats, Progress};
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Percentage of `loader`'s examples whose arg-max prediction matches the
/// label. Runs one full epoch of the loader and leaves the graph as it found
/// it.
pub fn evaluate_accuracy(graph: &mut Graph, network: &Network, loader: &mut DataLoader) -> Result<f32> {
    let mut correct = 0.0;
    let mut total = 0usize;
    loop {
        let mark = graph.checkpoint();
        let Some(batch) = loader.next_batch(graph) else {
            break;
        };
        let outputs = network.output_log_softmax(graph, batch.images)?;
        let predicted = graph.argmax(outputs);
        let hits = graph.equal(predicted, batch.labels)?;
        let hits = graph.sum_all(hits);
        correct += graph.item(hits)?;
        total += graph.shape(batch.labels).0;
        graph.rewind(mark);
    }
    if total == 0 {
        return Ok(0.0);
    }
    Ok(100.0 * correct / total as f32)
}

/// Trains `network` as a classifier with NLL on log-softmax outputs.
///
/// Reports a baseline evaluation as epoch 0, then for each epoch runs one
/// optimizer step per training batch and evaluates on `val_loader`.
/// `on_progress` receives every [`EpochStats`] as soon as it is known, plus
/// the batch loss every `config.log_every` iterations. The epoch statistics
/// are also returned as a list.
///
/// # Errors
/// [`Error::NonFiniteLoss`] as soon as a batch loss is NaN or infinite, plus
/// any shape error from the forward pass.
pub fn train_classifier(
    graph: &mut Graph,
    network: &Network,
    optimizer: &mut Optimizer,
    train_loader: &mut DataLoader,
    val_loader: &mut DataLoader,
    config: &TrainConfig,
    on_progress: &mut dyn FnMut(Progress<'_>),
) -> Result<Vec<EpochStats>> {
    let mut history = Vec::with_capacity(config.epochs + 1);

    let t_start = Instant::now();
    let baseline = EpochStats {
        epoch: 0,
        mean_loss: None,
        validation_accuracy: evaluate_accuracy(graph, network, val_loader)?,
        elapsed_ms: t_start.elapsed().as_millis() as u64,
    };
    on_progress(Progress::Epoch(&baseline));
    history.push(baseline);

    for epoch in 1..=config.epochs {
        if stop_requested(config) {
            break;
        }

        let t_start = Instant::now();

        // ── One full pass over the training data ───────────────────────────
        let mean_loss = run_one_epoch(graph, network, optimizer, train_loader, epoch, config.log_every, on_progress)?;

        // ── Validation ────────────────────────────────────────────────────
        let validation_accuracy = evaluate_accuracy(graph, network, val_loader)?;

        let stats = EpochStats {
            epoch,
            mean_loss: Some(mean_loss),
            validation_accuracy,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        info!(epoch, mean_loss, validation_accuracy, "epoch finished");
        on_progress(Progress::Epoch(&stats));
        history.push(stats);
    }

    Ok(history)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn stop_requested(config: &TrainConfig) -> bool {
    config
        .stop_flag
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// One optimisation step per batch. Returns the mean batch loss.
fn run_one_epoch(
    graph: &mut Graph,
    network: &Network,
    optimizer: &mut Optimizer,
    loader: &mut DataLoader,
    epoch: usize,
    log_every: usize,
    on_progress: &mut dyn FnMut(Progress<'_>),
) -> Result<f32> {
    let mut running_loss = 0.0;
    let mut iteration = 0;

    let mark = graph.checkpoint();
    while let Some(batch) = loader.next_batch(graph) {
        optimizer.zero_grad(graph);

        let outputs = network.output_log_softmax(graph, batch.images)?;
        let loss = graph.nll_loss(outputs, batch.labels)?;
        graph.backward(loss)?;
        optimizer.step(graph);

        let batch_loss = graph.item(loss)?;
        iteration += 1;
        if !batch_loss.is_finite() {
            return Err(Error::NonFiniteLoss { iteration });
        }
        running_loss += batch_loss;

        if log_every > 0 && iteration % log_every == 0 {
            debug!(epoch, iteration, loss = batch_loss, "batch loss");
            on_progress(Progress::Iteration {
                epoch,
                iteration,
                loss: batch_loss,
            });
        }

        let dropped = graph.rewind(mark);
        debug!(dropped, "rewound step nodes");
    }

    let batches = loader.batches_per_epoch().max(1);
    Ok(running_loss / batches as f32)
}
