//! Tether Server Binary
//!
//! Listens for agents and runs the operator console on stdin/stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tether::{CommandRegistry, Dispatcher, ExtensionCatalog};
use tether_server::cli::Cli;
use tether_server::console::Console;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they do not interleave with the prompt
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Tether server");

    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let config = cli.resolve_config(&cwd)?;

    let mut commands = CommandRegistry::new();
    ExtensionCatalog::builtin()
        .load(&config.extensions, &mut commands)
        .context("Failed to load extensions")?;
    info!("Loaded extensions: {:?}", config.extensions);

    let dispatcher = match Dispatcher::bind(config, commands).await {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    dispatcher.serve().await?;

    let mut console = Console::new(Arc::clone(&dispatcher)).await;
    let result = console
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    let stopped = dispatcher.shutdown().await;
    for host in dispatcher.hosts().await {
        host.close().await;
    }

    info!("Server shutting down");
    result?;
    if let Err(e) = stopped {
        error!("Listener failed: {}", e);
        return Err(e).context("Accept loop stopped");
    }
    Ok(())
}
