// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

mod clone;
mod cmd;
mod config;
mod db;
mod pipeline;
mod processor;
mod progress;
mod repair;
mod spec;
mod transform;

use clap::Parser;
use cmd::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
