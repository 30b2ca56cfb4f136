use std::io::Cursor;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};

use crate::autograd::Graph;
use crate::data::mnist::{DataLoader, MnistDataset};
use crate::distributed::config::DistributedConfig;
use crate::distributed::protocol::{self, CONTENT_TYPE, GRADIENTS_PATH, WEIGHTS_PATH};
use crate::error::{Error, Result};
use crate::math::matrix::Shape;
use crate::network::{Network, NetworkSpec, NetworkWeights};
use crate::optim::Optimizer;
use crate::train::evaluate_accuracy;

/// Validation accuracy is printed every this many updates, starting with
/// the first.
pub const LOG_ACCURACY_EVERY: u32 = 1000;

/// Whether the `update`-th applied update (1-based) is followed by a
/// validation report. Reports are labelled with the 0-based iteration.
pub fn reports_accuracy_after(update: u32) -> bool {
    update > 0 && (update - 1) % LOG_ACCURACY_EVERY == 0
}

/// Owns the authoritative copy of the model and applies worker gradients as
/// they arrive, with no synchronisation between workers beyond the initial
/// registration.
pub struct ParameterServer {
    graph: Graph,
    network: Network,
    optimizer: Optimizer,
    layout: Vec<Shape>,
    val_loader: Option<DataLoader>,
    max_updates: u32,
    updates: u32,
}

/// Outcome of a gradient submission.
#[derive(Debug, PartialEq)]
pub enum GradientReply {
    /// The update was applied; carries the fresh weights.
    Weights(Vec<u8>),
    /// The update budget is spent; the worker should stop.
    Finished,
}

impl ParameterServer {
    pub fn new(spec: &NetworkSpec, config: &DistributedConfig, val_loader: Option<DataLoader>) -> ParameterServer {
        let mut graph = Graph::new();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let network = Network::new(&mut graph, &spec.layers, &mut rng);
        let mut optimizer = Optimizer::sgd(config.learning_rate);
        optimizer.add_params(&graph, &network.params());
        let layout = network.params().iter().map(|&id| graph.shape(id)).collect();
        ParameterServer {
            graph,
            network,
            optimizer,
            layout,
            val_loader,
            max_updates: config.updates,
            updates: 0,
        }
    }

    pub fn updates(&self) -> u32 {
        self.updates
    }

    pub fn is_finished(&self) -> bool {
        self.updates >= self.max_updates
    }

    pub fn layout(&self) -> &[Shape] {
        &self.layout
    }

    pub fn weights_payload(&self) -> Vec<u8> {
        protocol::encode(self.network.params().into_iter().map(|id| self.graph.value(id)))
    }

    pub fn snapshot(&self) -> NetworkWeights {
        NetworkWeights::snapshot(&self.graph, &self.network)
    }

    /// Applies one worker's gradients: zero-grad, accumulate, step.
    ///
    /// Once the budget is spent, including by this very update, the reply is
    /// [`GradientReply::Finished`] and later submissions are ignored.
    pub fn apply_gradients(&mut self, body: &[u8]) -> Result<GradientReply> {
        if self.is_finished() {
            return Ok(GradientReply::Finished);
        }
        let gradients = protocol::decode_expecting(body, &self.layout)?;

        self.optimizer.zero_grad(&mut self.graph);
        for (id, grad) in self.network.params().into_iter().zip(&gradients) {
            self.graph.accumulate_grad(id, grad)?;
        }
        self.optimizer.step(&mut self.graph);
        self.updates += 1;

        if reports_accuracy_after(self.updates) {
            if let Some(accuracy) = self.validation_accuracy()? {
                println!("Iteration {}: Validation Accuracy: {accuracy:.6}", self.updates - 1);
            }
        }
        if self.is_finished() {
            return Ok(GradientReply::Finished);
        }
        Ok(GradientReply::Weights(self.weights_payload()))
    }

    /// Accuracy on the validation split, if the server has one.
    pub fn validation_accuracy(&mut self) -> Result<Option<f32>> {
        match self.val_loader.as_mut() {
            Some(loader) => Ok(Some(evaluate_accuracy(&mut self.graph, &self.network, loader)?)),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

fn binary_response(status: u16, bytes: Vec<u8>) -> Response<Cursor<Vec<u8>>> {
    let len = bytes.len();
    Response::new(
        StatusCode(status),
        vec![Header::from_bytes(b"Content-Type", CONTENT_TYPE.as_bytes()).expect("static header is valid")],
        Cursor::new(bytes),
        Some(len),
        None,
    )
}

fn text_response(status: u16, body: &str) -> Response<Cursor<Vec<u8>>> {
    let bytes = body.as_bytes().to_vec();
    let len = bytes.len();
    Response::new(
        StatusCode(status),
        vec![Header::from_bytes(b"Content-Type", b"text/plain").expect("static header is valid")],
        Cursor::new(bytes),
        Some(len),
        None,
    )
}

fn respond(request: Request, response: Response<Cursor<Vec<u8>>>) {
    if let Err(err) = request.respond(response) {
        warn!(%err, "failed to send response");
    }
}

/// Serves `ps` until the update budget is spent and every worker has been
/// told to stop. Returns the final weights.
///
/// The first `workers` `GET /weights` requests are held back until all of
/// them have arrived, so every worker starts from the same initial model.
pub fn serve(mut ps: ParameterServer, http: &Server, workers: u32) -> Result<NetworkWeights> {
    let mut waiting: Vec<Request> = Vec::new();
    let mut registered = 0u32;
    let mut stopped = 0u32;

    for mut request in http.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_owned();
        let path = url.split('?').next().unwrap_or_default();

        match (method, path) {
            (Method::Get, WEIGHTS_PATH) if registered < workers => {
                registered += 1;
                info!(registered, workers, "worker registered");
                waiting.push(request);
                if registered == workers {
                    let payload = ps.weights_payload();
                    for held in waiting.drain(..) {
                        respond(held, binary_response(200, payload.clone()));
                    }
                    info!("all workers registered, training started");
                }
            }
            (Method::Get, WEIGHTS_PATH) => respond(request, binary_response(200, ps.weights_payload())),
            (Method::Post, GRADIENTS_PATH) => {
                let mut body = Vec::new();
                let read = request.as_reader().read_to_end(&mut body);
                if let Err(err) = read {
                    respond(request, text_response(400, &err.to_string()));
                    continue;
                }
                match ps.apply_gradients(&body) {
                    Ok(GradientReply::Weights(payload)) => {
                        debug!(update = ps.updates(), "applied gradients");
                        respond(request, binary_response(200, payload));
                    }
                    Ok(GradientReply::Finished) => {
                        stopped += 1;
                        respond(request, text_response(410, "update budget spent"));
                        if stopped >= workers {
                            break;
                        }
                    }
                    Err(err @ Error::Payload(_)) => {
                        warn!(%err, "rejected gradients");
                        respond(request, text_response(400, &err.to_string()));
                    }
                    Err(err) => {
                        respond(request, text_response(500, &err.to_string()));
                        return Err(err);
                    }
                }
            }
            _ => respond(request, text_response(404, "404 Not Found")),
        }
    }

    if let Some(accuracy) = ps.validation_accuracy()? {
        info!(updates = ps.updates(), accuracy, "final validation accuracy");
    }
    Ok(ps.snapshot())
}

/// Loads the validation split, binds the configured address and serves.
pub fn run_server(config: &DistributedConfig) -> Result<NetworkWeights> {
    let dataset = MnistDataset::load(&config.training_images, &config.training_labels)?;
    let (_, validation) = dataset.train_validation_split(config.training_split)?;
    let val_loader = DataLoader::sequential(validation, config.validation_batch_size);

    let spec = NetworkSpec::mnist_mlp(32);
    let ps = ParameterServer::new(&spec, config, Some(val_loader));

    let http = Server::http(config.bind_address())
        .map_err(|err| Error::Config(format!("cannot bind {}: {err}", config.bind_address())))?;
    info!(address = %config.bind_address(), workers = config.workers, updates = config.updates, "parameter server listening");

    let weights = serve(ps, &http, config.workers)?;
    if let Some(path) = &config.save_weights {
        weights.save_json(&path.to_string_lossy())?;
        info!(path = %path.display(), "saved final weights");
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;

    fn small_spec() -> NetworkSpec {
        let mut spec = NetworkSpec::mnist_mlp(4);
        spec.layers[0].input_size = 3;
        spec
    }

    #[test]
    fn applies_until_budget_is_spent() {
        let config = DistributedConfig {
            updates: 2,
            ..DistributedConfig::default()
        };
        let mut ps = ParameterServer::new(&small_spec(), &config, None);
        assert_eq!(ps.layout(), &[(3, 4), (1, 4), (4, 10), (1, 10)]);

        let grads: Vec<Matrix> = ps.layout().iter().map(|&(r, c)| Matrix::filled(r, c, 1.0)).collect();
        let body = protocol::encode(&grads);
        let before = ps.snapshot();

        assert!(matches!(ps.apply_gradients(&body).unwrap(), GradientReply::Weights(_)));
        let after = ps.snapshot();
        let moved = before.layers[0].weights.sub(&after.layers[0].weights).unwrap();
        assert!(moved.data.iter().all(|d| (d - 0.01).abs() < 1e-6));

        assert_eq!(ps.apply_gradients(&body).unwrap(), GradientReply::Finished);
        assert!(ps.is_finished());
        assert_eq!(ps.apply_gradients(&body).unwrap(), GradientReply::Finished);
        assert_eq!(ps.updates(), 2);
    }

    #[test]
    fn accuracy_is_reported_from_the_first_update() {
        assert!(!reports_accuracy_after(0));
        assert!(reports_accuracy_after(1));
        assert!(!reports_accuracy_after(2));
        assert!(!reports_accuracy_after(1000));
        assert!(reports_accuracy_after(1001));
        assert!(reports_accuracy_after(2001));
    }

    #[test]
    fn rejects_wrong_layout() {
        let mut ps = ParameterServer::new(&small_spec(), &DistributedConfig::default(), None);
        let body = protocol::encode([&Matrix::zeros(3, 4)]);
        assert!(matches!(ps.apply_gradients(&body), Err(Error::Payload(_))));
        assert_eq!(ps.updates(), 0);
    }
}
