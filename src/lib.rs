//! Intercepting TCP/HTTP proxy for sidecar orchestration.
//!
//! A [`Proxy`] sits between local listeners and one remote endpoint (usually a
//! container engine's API socket). Each accepted connection gets its own
//! remote connection; HTTP/1.x traffic flowing through the pair can be
//! rewritten by path-matched filters, and everything else is relayed
//! untouched.
//!
//! # Architecture Overview
//!
//! ```text
//!   local client                                              remote endpoint
//!        │                                                          ▲
//!        ▼                                                          │
//!   ┌─────────┐   ┌────────────────┐   ┌──────────────────────┐    │
//!   │   net   │──▶│ proxy (accept, │──▶│ requests.rs          │────┘
//!   │listener │   │ dial, pair)    │   │  http parse → filter │
//!   └─────────┘   └────────────────┘   └──────────────────────┘
//!        ▲                             ┌──────────────────────┐
//!        └─────────────────────────────│ responses.rs         │◀── remote
//!                                      │  http parse → filter │
//!                                      └──────────────────────┘
//!
//!   Cross-cutting: config · observability (tracing, metrics) · lifecycle
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sidecar_proxy::{filter_request_as_json, Endpoint, Proxy};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let remote: Endpoint = "unix:///var/run/docker.sock".parse()?;
//! let mut proxy = Proxy::for_engine_cli(remote.dialer());
//!
//! let local: Endpoint = "tcp://127.0.0.1:2375".parse()?;
//! proxy.add_listener("", local.bind().await?);
//! proxy.handle(
//!     "/containers/create$",
//!     filter_request_as_json(|mut spec: serde_json::Value| {
//!         spec["Labels"]["sidecar"] = "true".into();
//!         Some(spec)
//!     }),
//! )?;
//!
//! proxy.process().await?;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod filter;
pub mod http;
pub mod net;
pub mod proxy;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use crate::config::ProxyConfig;
pub use crate::filter::{
    filter_request_as_json, filter_response_as_json, FilterFailure, FilterResult, Handler,
    RequestFilter, ResponseFilter, Severity,
};
pub use crate::http::{Limits, RequestHead};
pub use crate::lifecycle::Shutdown;
pub use crate::net::{Dial, Endpoint, LocalListener, Stream};
pub use crate::proxy::{Proxy, ProxyError};
