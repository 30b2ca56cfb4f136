//! Prints MNIST training batches as ASCII art and writes the first batch
//! as a PNG contact sheet.
//!
//! Run with:
//!   cargo run --example mnist_preview -- <seed> [batches]

use std::path::Path;
use std::process::ExitCode;

use ferrite_grad::data::download::data_dir;
use ferrite_grad::data::preview::{ascii_batch, contact_sheet, save_png};
use ferrite_grad::{logging, DataLoader, Graph, MnistDataset, Result};

const BATCH_SIZE: usize = 4;
const SHEET: &str = "mnist_preview.png";

fn run(seed: u64, batches: usize) -> Result<()> {
    let dataset = MnistDataset::load_training(&data_dir())?;
    let (training, _) = dataset.train_validation_split(0.8)?;
    let (rows, cols) = (training.rows, training.cols);
    let mut loader = DataLoader::random(training, BATCH_SIZE, seed);

    let mut graph = Graph::new();
    for index in 0..batches {
        let mark = graph.checkpoint();
        let Some(batch) = loader.next_batch(&mut graph) else {
            break;
        };
        print!("{}", ascii_batch(&graph, &batch, rows, cols));
        if index == 0 {
            save_png(&contact_sheet(&graph, &batch, rows, cols, BATCH_SIZE), Path::new(SHEET))?;
            println!("Wrote {SHEET}");
        }
        graph.rewind(mark);
    }
    Ok(())
}

fn main() -> ExitCode {
    logging::init("warn");

    let args: Vec<String> = std::env::args().collect();
    let Some(seed) = args.get(1).and_then(|s| s.parse::<u64>().ok()) else {
        eprintln!("Usage: {} <seed> [batches]", args.first().map(String::as_str).unwrap_or("mnist_preview"));
        return ExitCode::from(1);
    };
    let batches = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1);

    match run(seed, batches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
