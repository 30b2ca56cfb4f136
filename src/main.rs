use std::process::ExitCode;

use ferrite_grad::distributed::config::help_text;
use ferrite_grad::distributed::{parse_args, run_server, run_worker, Command, Role};
use ferrite_grad::{logging, Error};

fn main() -> ExitCode {
    logging::init("info");

    let args: Vec<String> = std::env::args().collect();
    let exe = args.first().map(String::as_str).unwrap_or("ferrite-grad");

    let (role, config) = match parse_args(&args[1.min(args.len())..]) {
        Ok(Command::Run { role, config }) => (role, config),
        Ok(Command::Help) => {
            print!("{}", help_text(exe));
            return ExitCode::SUCCESS;
        }
        Err(Error::Config(msg)) => {
            eprintln!("error: {msg}");
            eprint!("{}", help_text(exe));
            return ExitCode::from(1);
        }
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };

    println!("{config}");

    let outcome = match role {
        Role::Server => run_server(&config).map(|_| ()),
        Role::Worker => run_worker(&config).map(|_| ()),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ Error::FileNotFound(_)) => {
            eprintln!("error: {err}");
            eprintln!("Fetch the dataset first with `cargo run --example download_datasets`.");
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}
