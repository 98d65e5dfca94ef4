//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every signalled() future resolves
//!     → Proxy::process_until returns, listeners close
//! ```
//!
//! # Design Decisions
//! - Shutdown stops accepting; pairs already running finish on their own
//! - Signals and programmatic shutdown feed the same future

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
