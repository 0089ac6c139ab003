//! vncgated binary entry point.
//!
//! Parses flags over the TOML configuration, runs the privileged startup
//! steps, and serves until a shutdown signal.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vncgated::{Cli, DaemonConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing from RUST_LOG (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = DaemonConfig::discover(cli.config.as_deref())?;
    cli.apply(&mut config);
    tracing::info!(
        "starting vncgated on {} in {:?} mode",
        config.listen.addr,
        config.admission.mode
    );

    let server = Server::prepare(config)?;
    server.run().await
}
