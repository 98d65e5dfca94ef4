//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Local client connection
//!     → listener.rs (accept, optional connection limit)
//!     → connection.rs (label for tracing)
//!     → dial.rs (open the remote connection)
//!     → stream.rs (split both sockets into owned halves)
//!     → Hand off to the proxy's connection pair
//! ```
//!
//! # Design Decisions
//! - TCP and Unix-domain sockets are interchangeable on both sides
//! - Addresses use `tcp://` / `unix://` schemes (endpoint.rs)
//! - Read halves can be shut down independently for half-close

pub mod connection;
pub mod dial;
pub mod endpoint;
pub mod listener;
pub mod stream;

pub use connection::ConnectionLabel;
pub use dial::Dial;
pub use endpoint::{Endpoint, EndpointError};
pub use listener::{ConnectionPermit, ListenerError, LocalListener};
pub use stream::Stream;
