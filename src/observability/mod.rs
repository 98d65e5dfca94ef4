//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy, connection pairs, filters produce:
//!     → logging.rs (structured log events, per-pair spans)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::LogLevel;
