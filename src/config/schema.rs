//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::http::Limits;
use crate::observability::LogLevel;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Remote endpoint every accepted connection is forwarded to.
    pub connect: String,

    /// Local addresses to listen on (`tcp://host:port`, `unix:///path` or `/path`).
    pub listen: Vec<String>,

    /// Path substrings whose responses are streamed without buffering or filtering.
    pub non_managed: Vec<String>,

    pub log_level: LogLevel,

    pub limits: LimitsConfig,

    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect: "unix:///var/run/docker.sock".to_string(),
            listen: Vec::new(),
            non_managed: vec!["/wait".to_string()],
            log_level: LogLevel::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Buffering and connection limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Bytes requested from a socket per read.
    pub read_buffer_bytes: usize,

    /// Largest message head waited for before passing bytes through raw.
    pub max_head_bytes: usize,

    /// Largest body buffered for filtering.
    pub max_body_bytes: usize,

    /// Maximum concurrent connections per listener (backpressure).
    pub max_connections: usize,

    /// Capacity of the queue between accept loops and the dispatcher.
    pub accept_queue: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            read_buffer_bytes: limits.read_buffer,
            max_head_bytes: limits.max_head,
            max_body_bytes: limits.max_body,
            max_connections: 10_000,
            accept_queue: 64,
        }
    }
}

impl LimitsConfig {
    pub fn framing(&self) -> Limits {
        Limits {
            read_buffer: self.read_buffer_bytes,
            max_head: self.max_head_bytes,
            max_body: self.max_body_bytes,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
