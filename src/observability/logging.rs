//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binary
//! - Map the configured level (DEBUG < INFO < WARN < ERROR < NONE) to a filter
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` takes precedence over the configured level
//! - Each connection pair logs inside a span carrying its label

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log verbosity for the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    None,
}

impl LogLevel {
    /// Filter directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "sidecar_proxy=debug",
            LogLevel::Info => "sidecar_proxy=info",
            LogLevel::Warn => "sidecar_proxy=warn",
            LogLevel::Error => "sidecar_proxy=error",
            LogLevel::None => "off",
        }
    }
}

/// Install the global subscriber. Call once, from the binary.
pub fn init(level: LogLevel) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
