//! Connection identity for tracing.
//!
//! # Responsibilities
//! - Number proxies and connections with process-wide atomic counters
//! - Render the per-pair log label `(proxy|listener|local|global)`
//!
//! Interleaved log lines of concurrent connections stay traceable by label.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Global atomic counter for proxy instances. Relaxed: only uniqueness matters.
static PROXY_INDEX: AtomicUsize = AtomicUsize::new(1);

/// Global atomic counter for connection pairs across all proxies.
static CONNECTION_INDEX: AtomicU64 = AtomicU64::new(1);

/// Allocate the next proxy index.
pub fn next_proxy_index() -> usize {
    PROXY_INDEX.fetch_add(1, Ordering::Relaxed)
}

/// Per-listener connection counter.
#[derive(Debug, Default)]
pub struct ListenerCounter(AtomicU64);

impl ListenerCounter {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Identifies one connection pair in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionLabel {
    proxy: usize,
    listener: Arc<str>,
    local: u64,
    global: u64,
}

impl ConnectionLabel {
    /// Label the `local`-th connection accepted on `listener`, drawing a new
    /// global index.
    pub fn new(proxy: usize, listener: Arc<str>, local: u64) -> Self {
        Self {
            proxy,
            listener,
            local,
            global: CONNECTION_INDEX.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn global(&self) -> u64 {
        self.global
    }

    pub fn listener(&self) -> &str {
        &self.listener
    }
}

impl fmt::Display for ConnectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:02}|{}|{:02}|{:04})",
            self.proxy, self.listener, self.local, self.global
        )
    }
}
