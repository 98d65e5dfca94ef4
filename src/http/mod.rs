//! HTTP/1.x framing over raw byte streams.
//!
//! # Data Flow
//! ```text
//! socket read half
//!     → reader.rs (buffer chunks, replay them verbatim)
//!     → parse.rs (head + body framing, never consuming)
//!     → message.rs (RequestHead / ResponseHead, http::Request / http::Response)
//!     → [filters may replace the message]
//!     → encode.rs (only for replaced messages)
//!     → peer socket
//! ```
//!
//! # Design Decisions
//! - Anything that does not parse as HTTP is passed through untouched
//! - Untouched messages are forwarded as their original bytes
//! - Bodies are buffered only up to a configured limit

pub mod encode;
pub mod error_response;
pub mod message;
pub mod parse;
pub mod reader;

pub use error_response::error_response;
pub use message::{RequestHead, ResponseHead};
pub use parse::Limits;
pub use reader::ReplayReader;
