//! Command-line flags and configuration resolution

use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tether::ServerConfig;

/// Configuration file looked for in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Tether dispatcher server
#[derive(Debug, Parser)]
#[command(name = "tether-server", version, about)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub listen: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log filter, used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Build the server configuration.
    ///
    /// An explicit `--config` must exist. Without it, `config.json` in
    /// `dir` is used when present, otherwise defaults. Flags win over the file.
    pub fn resolve_config(&self, dir: &Path) -> Result<ServerConfig> {
        let config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => {
                let fallback = dir.join(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    ServerConfig::from_file(&fallback).with_context(|| {
                        format!("Failed to load configuration from {}", fallback.display())
                    })?
                } else {
                    ServerConfig::default()
                }
            }
        };

        let config = match self.listen {
            Some(listen) => config.with_listen(listen),
            None => config,
        };
        let config = match self.port {
            Some(port) => config.with_port(port),
            None => config,
        };
        Ok(config)
    }
}
