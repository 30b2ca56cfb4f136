use std::process::ExitCode;

use ferrite_grad::data::download::{data_dir, download_mnist};
use ferrite_grad::logging;

fn main() -> ExitCode {
    logging::init("info");

    let dir = data_dir();
    match download_mnist(&dir) {
        Ok(files) => {
            for file in files {
                println!("{}", file.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error downloading dataset: {err}");
            eprintln!("Check your network connection and that {} is writable, then try again.", dir.display());
            ExitCode::from(1)
        }
    }
}
