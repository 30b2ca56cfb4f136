use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::download::data_dir;
use crate::data::mnist::{TRAIN_IMAGES, TRAIN_LABELS};
use crate::error::{Error, Result};

/// Settings shared by the parameter server and its workers.
///
/// Defaults come from [`Default`], then an optional JSON file, then
/// command-line flags. The dataset paths default to files under
/// `$FERRITE_MNIST_DIR` (or `data/mnist`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedConfig {
    pub seed: u64,
    pub learning_rate: f32,
    pub workers: u32,
    /// Passes over its training split a worker makes at most.
    pub epochs: u32,
    /// Optimizer steps the server performs before it stops.
    pub updates: u32,
    pub port: u16,
    pub host: String,
    pub training_images: PathBuf,
    pub training_labels: PathBuf,
    /// Fraction of the dataset used for training; the rest validates.
    pub training_split: f32,
    pub validation_batch_size: usize,
    pub training_batch_size: usize,
    /// Where the server writes the final weights, if anywhere.
    pub save_weights: Option<PathBuf>,
}

impl Default for DistributedConfig {
    fn default() -> Self {
        let dir = data_dir();
        DistributedConfig {
            seed: 3245,
            learning_rate: 0.01,
            workers: 1,
            epochs: 5,
            updates: 5000,
            port: 21756,
            host: "localhost".to_string(),
            training_images: dir.join(TRAIN_IMAGES),
            training_labels: dir.join(TRAIN_LABELS),
            training_split: 0.8,
            validation_batch_size: 128,
            training_batch_size: 32,
            save_weights: None,
        }
    }
}

impl DistributedConfig {
    pub fn load_json(path: &Path) -> Result<DistributedConfig> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Gradient submissions a worker makes before stopping on its own: the
    /// update budget, or `epochs` passes over the training split if fewer.
    pub fn worker_iterations(&self, batches_per_epoch: usize) -> u32 {
        let per_epoch = u32::try_from(batches_per_epoch).unwrap_or(u32::MAX);
        self.updates.min(self.epochs.saturating_mul(per_epoch))
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".into()));
        }
        if self.training_batch_size == 0 || self.validation_batch_size == 0 {
            return Err(Error::Config("batch sizes must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.training_split) {
            return Err(Error::Config(format!(
                "training split {} is not in [0, 1]",
                self.training_split
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DistributedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Seed: {}", self.seed)?;
        writeln!(f, "  Learning Rate: {:.4}", self.learning_rate)?;
        writeln!(f, "  Number of Workers: {}", self.workers)?;
        writeln!(f, "  Number of Epochs: {}", self.epochs)?;
        writeln!(f, "  Number of Updates: {}", self.updates)?;
        writeln!(f, "  Port: {}", self.port)?;
        writeln!(f, "  IP Address: {}", self.host)?;
        writeln!(f, "  Training Images File Path: {}", self.training_images.display())?;
        writeln!(f, "  Training Labels File Path: {}", self.training_labels.display())?;
        writeln!(f, "  Training Split: {:.2}", self.training_split)?;
        writeln!(f, "  Validation Batch Size: {}", self.validation_batch_size)?;
        write!(f, "  Training Batch Size: {}", self.training_batch_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Worker,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run { role: Role, config: DistributedConfig },
    Help,
}

pub fn help_text(exe: &str) -> String {
    format!(
        "Usage: {exe} <options>

Options:
  --server, -s                Run as a server
  --worker, -w                Run as a worker
  --seed <number>             Set the random seed (default: 3245)
  --learning-rate <number>    Set the learning rate (default: 0.01)
  --workers <number>          Set the number of workers (default: 1)
  --validation <number>       Set the validation batch size (default: 128)
  --training <number>         Set the training batch size (default: 32)
  --epochs <number>           Set the passes a worker makes over its data (default: 5)
  --updates <number>          Set the number of updates (default: 5000)
  --port <number>             Set the port (default: 21756)
  --ip <address>              Set the IP address (default: localhost)
  --training-images <path>    Set the training images file path
  --training-labels <path>    Set the training labels file path
  --training-split <number>   Set the training split (default: 0.8)
  --save-weights <path>       Write the final weights as JSON (server only)
  --config <path>             Read defaults from a JSON file
  --help, -h                  Show this help message and exit
"
    )
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| Error::Config(format!("{flag} needs a value")))
}

fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T> {
    let raw = value(args, i, flag)?;
    raw.parse()
        .map_err(|_| Error::Config(format!("{flag}: cannot parse {raw:?}")))
}

/// Parses the arguments after the program name.
///
/// `--config` is applied first wherever it appears, so the other flags
/// always override the file.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let mut config = match args.iter().position(|a| a == "--config") {
        Some(i) => DistributedConfig::load_json(Path::new(value(args, i, "--config")?))?,
        None => DistributedConfig::default(),
    };

    let (mut is_server, mut is_worker) = (false, false);
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut step = 2;
        match flag {
            "--server" | "-s" => {
                is_server = true;
                step = 1;
            }
            "--worker" | "-w" => {
                is_worker = true;
                step = 1;
            }
            "--help" | "-h" => return Ok(Command::Help),
            "--config" => {}
            "--seed" => config.seed = number(args, i, flag)?,
            "--learning-rate" => config.learning_rate = number(args, i, flag)?,
            "--workers" => config.workers = number(args, i, flag)?,
            "--validation" => config.validation_batch_size = number(args, i, flag)?,
            "--training" => config.training_batch_size = number(args, i, flag)?,
            "--epochs" => config.epochs = number(args, i, flag)?,
            "--updates" => config.updates = number(args, i, flag)?,
            "--port" => config.port = number(args, i, flag)?,
            "--ip" => config.host = value(args, i, flag)?.to_string(),
            "--training-images" => config.training_images = value(args, i, flag)?.into(),
            "--training-labels" => config.training_labels = value(args, i, flag)?.into(),
            "--training-split" => config.training_split = number(args, i, flag)?,
            "--save-weights" => config.save_weights = Some(value(args, i, flag)?.into()),
            other => return Err(Error::Config(format!("unknown option {other}"))),
        }
        i += step;
    }

    let role = match (is_server, is_worker) {
        (true, false) => Role::Server,
        (false, true) => Role::Worker,
        (true, true) => return Err(Error::Config("cannot run as both server and worker".into())),
        (false, false) => return Err(Error::Config("pass --server or --worker".into())),
    };
    config.validate()?;
    Ok(Command::Run { role, config })
}
