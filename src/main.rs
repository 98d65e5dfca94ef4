//! sidecar-proxy binary.
//!
//! Binds every configured listener, connects each accepted client to the
//! remote endpoint and relays traffic until SIGINT/SIGTERM. The binary
//! registers no filters of its own: responses to the engine's `/wait` style
//! long-polling endpoints stream through, everything else passes unchanged.
//!
//! Configuration comes from an optional TOML file; command-line flags take
//! precedence over file values.

use std::path::PathBuf;

use clap::Parser;

use sidecar_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use sidecar_proxy::lifecycle::shutdown_signal;
use sidecar_proxy::observability::{logging, metrics, LogLevel};
use sidecar_proxy::{Endpoint, Proxy};

#[derive(Debug, Parser)]
#[command(name = "sidecar-proxy", version, about = "Intercepting proxy in front of a container engine API")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. `tcp://0.0.0.0:2375` or `unix:///run/proxy.sock`. Repeatable.
    #[arg(short, long)]
    listen: Vec<String>,

    /// Remote endpoint to connect every client to.
    #[arg(long)]
    connect: Option<String>,

    /// Path fragment whose responses are never buffered. Repeatable.
    #[arg(long = "non-managed")]
    non_managed: Vec<String>,

    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

impl Cli {
    /// Load the file (if any) and apply flag overrides on top.
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        if !self.listen.is_empty() {
            config.listen = self.listen;
        }
        if let Some(connect) = self.connect {
            config.connect = connect;
        }
        if !self.non_managed.is_empty() {
            config.non_managed = self.non_managed;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(config.log_level);
    tracing::info!("sidecar-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let remote: Endpoint = config.connect.parse()?;
    tracing::info!(remote = %remote, "Configuration loaded");

    let mut proxy = Proxy::new(remote.dialer(), config.non_managed.clone())
        .with_limits(config.limits.framing())
        .with_accept_queue(config.limits.accept_queue);

    for (i, address) in config.listen.iter().enumerate() {
        let endpoint: Endpoint = address.parse()?;
        let listener = endpoint
            .bind()
            .await?
            .with_max_connections(config.limits.max_connections);
        proxy.add_listener(&format!("L{:02}", i + 1), listener);
    }

    proxy.process_until(shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
