//! Request and response filters.
//!
//! # Data Flow
//! ```text
//! parsed message
//!     → handler.rs (path pattern match, registration order)
//!     → guard.rs (panic isolation, failure classification)
//!     → user filter / json.rs adapter
//!     → Ok(Some(replacement)) | Ok(None) | Err(FilterFailure)
//! ```
//!
//! # Design Decisions
//! - Failures are values; panics are caught only at the call boundary
//! - A filter that returns `Ok(None)` leaves the message byte-identical
//! - Handlers are immutable once the proxy starts serving

pub mod failure;
pub mod guard;
pub mod handler;
pub mod json;

use bytes::Bytes;
use http::{Request, Response};

use crate::http::RequestHead;

pub use failure::{FilterFailure, Severity};
pub use handler::Handler;
pub use json::{filter_request_as_json, filter_response_as_json};

/// Result of a single filter call: a replacement, no change, or a failure.
pub type FilterResult<T> = Result<Option<T>, FilterFailure>;

/// Rewrites a buffered request before it is forwarded to the remote.
pub type RequestFilter = Box<dyn Fn(&Request<Bytes>) -> FilterResult<Request<Bytes>> + Send + Sync>;

/// Rewrites a buffered response before it is forwarded to the client.
///
/// Receives the head of the request the response answers.
pub type ResponseFilter =
    Box<dyn Fn(&RequestHead, &Response<Bytes>) -> FilterResult<Response<Bytes>> + Send + Sync>;
