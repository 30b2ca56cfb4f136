//! Asynchronous data-parallel training over HTTP.
//!
//! One [`server::ParameterServer`] holds the model. Each worker pulls the
//! weights, computes gradients on its own batches and posts them back; the
//! server applies every submission as it arrives.

pub mod config;
pub mod protocol;
pub mod server;
pub mod worker;

pub use config::{parse_args, Command, DistributedConfig, Role};
pub use server::{run_server, serve, ParameterServer};
pub use worker::{run_worker, StopReason, Worker, WorkerReport};
