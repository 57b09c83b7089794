//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use kartlag_cli::CliError;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match kartlag_cli::run() {
        Ok(()) => {}
        // Help and version requests also arrive here; clap knows how to exit for them.
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("kartlag: {err}");
            std::process::exit(1);
        }
    }
}
