use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::autograd::Graph;
use crate::data::mnist::{DataLoader, MnistDataset};
use crate::distributed::config::DistributedConfig;
use crate::distributed::protocol::{self, CONTENT_TYPE, GRADIENTS_PATH, WEIGHTS_PATH};
use crate::error::{Error, Result};
use crate::math::matrix::{Matrix, Shape};
use crate::network::{Network, NetworkSpec};

/// A worker prints its batch loss every this many iterations, starting
/// with the first.
pub const LOG_LOSS_EVERY: u32 = 100;

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ran its own iteration budget.
    BudgetSpent,
    /// The server answered `410 Gone`.
    ServerFinished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    /// Gradient submissions made, including one the server turned away.
    pub iterations: u32,
    pub last_loss: Option<f32>,
    pub stop: StopReason,
}

/// Computes gradients on local batches and ships them to the parameter
/// server, replacing its weights with whatever the server sends back.
pub struct Worker {
    client: Client,
    base_url: String,
    graph: Graph,
    network: Network,
    layout: Vec<Shape>,
    loader: DataLoader,
}

impl Worker {
    pub fn new(spec: &NetworkSpec, base_url: impl Into<String>, loader: DataLoader, seed: u64) -> Result<Worker> {
        // Long training runs hold a request open until every worker registers.
        let client = Client::builder().timeout(None).build()?;
        let mut graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let network = Network::new(&mut graph, &spec.layers, &mut rng);
        let layout = network.params().iter().map(|&id| graph.shape(id)).collect();
        Ok(Worker {
            client,
            base_url: base_url.into(),
            graph,
            network,
            layout,
            loader,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn install(&mut self, bytes: &[u8]) -> Result<()> {
        let tensors = protocol::decode_expecting(bytes, &self.layout)?;
        for (id, value) in self.network.params().into_iter().zip(tensors) {
            self.graph.set_value(id, value)?;
        }
        Ok(())
    }

    /// Fetches the current weights. The first call doubles as registration
    /// and blocks until every worker has connected.
    pub fn fetch_weights(&mut self) -> Result<()> {
        let response = self.client.get(self.url(WEIGHTS_PATH)).send()?;
        if !response.status().is_success() {
            return Err(Error::ServerStatus(response.status().as_u16()));
        }
        let bytes = response.bytes()?;
        self.install(&bytes)
    }

    /// Forward and backward on the next batch. Returns the loss and the
    /// encoded parameter gradients.
    fn compute_gradients(&mut self) -> Result<(f32, Vec<u8>)> {
        let mark = self.graph.checkpoint();
        let batch = match self.loader.next_batch(&mut self.graph) {
            Some(batch) => batch,
            // End of an epoch; the loader has rewound.
            None => self
                .loader
                .next_batch(&mut self.graph)
                .ok_or_else(|| Error::Config("training split is smaller than one batch".into()))?,
        };

        let params = self.network.params();
        self.graph.zero_grad(&params);
        let outputs = self.network.output_log_softmax(&mut self.graph, batch.images)?;
        let loss = self.graph.nll_loss(outputs, batch.labels)?;
        self.graph.backward(loss)?;

        let value = self.graph.item(loss)?;
        let grads: Vec<&Matrix> = params.iter().map(|&id| self.graph.grad(id)).collect();
        let payload = protocol::encode(grads);
        self.graph.rewind(mark);
        Ok((value, payload))
    }

    /// Registers, then trains until `max_iterations` gradients have been
    /// sent or the server reports that it is done.
    pub fn run(&mut self, max_iterations: u32) -> Result<WorkerReport> {
        self.fetch_weights()?;
        info!(url = %self.base_url, "registered with parameter server");

        let mut last_loss = None;
        for iteration in 0..max_iterations {
            let (loss, payload) = self.compute_gradients()?;
            if !loss.is_finite() {
                return Err(Error::NonFiniteLoss { iteration: iteration as usize });
            }
            last_loss = Some(loss);
            if iteration % LOG_LOSS_EVERY == 0 {
                println!("Iteration {iteration}: Loss: {loss:.6}");
            }

            let response = self
                .client
                .post(self.url(GRADIENTS_PATH))
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
                .body(payload)
                .send()?;
            match response.status() {
                StatusCode::OK => {
                    let bytes = response.bytes()?;
                    self.install(&bytes)?;
                }
                StatusCode::GONE => {
                    info!(iteration, "server finished training");
                    return Ok(WorkerReport {
                        iterations: iteration + 1,
                        last_loss,
                        stop: StopReason::ServerFinished,
                    });
                }
                other => return Err(Error::ServerStatus(other.as_u16())),
            }
            debug!(iteration, "weights refreshed");
        }

        Ok(WorkerReport {
            iterations: max_iterations,
            last_loss,
            stop: StopReason::BudgetSpent,
        })
    }
}

/// Loads the training split and runs a worker against the configured server.
pub fn run_worker(config: &DistributedConfig) -> Result<WorkerReport> {
    let dataset = MnistDataset::load(&config.training_images, &config.training_labels)?;
    let (training, _) = dataset.train_validation_split(config.training_split)?;
    let loader = DataLoader::random(training, config.training_batch_size, config.seed);

    let spec = NetworkSpec::mnist_mlp(32);
    let iterations = config.worker_iterations(loader.batches_per_epoch());
    let mut worker = Worker::new(&spec, config.base_url(), loader, config.seed)?;
    let report = worker.run(iterations)?;
    info!(iterations = report.iterations, stop = ?report.stop, "worker finished");
    Ok(report)
}
