//! Entry point for the `parley` chat client.
//!
//! `main.rs` owns only process setup: logging, argument parsing and the
//! exit code. All protocol work lives in the library.

use std::process::ExitCode;

use clap::Parser;
use parley::Cli;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr so they never interleave with chat on stdout.
    // RUST_LOG overrides the default level.
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => e.exit(),
    };

    match parley::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERR: {e}");
            ExitCode::FAILURE
        }
    }
}
