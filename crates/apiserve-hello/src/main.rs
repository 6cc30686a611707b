//! apiserve Hello example
//!
//! Serves the Hello service and its documentation pages.

use apiserve_hello::build_server;
use apiserve_server::{ServeConfig, ServerError};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Serve the Hello example service
#[derive(Debug, Parser)]
#[command(name = "apiserve-hello")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path; SERVE_* variables override its values
    #[arg(short, long, env = "SERVE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => ServeConfig::from_file(path)?.apply_env()?,
        None => ServeConfig::from_env()?,
    };

    // curl 127.0.0.1:8081/api/Hello/SayHello -d '{"name": "alice"}'
    build_server(config)?.serve().await
}
