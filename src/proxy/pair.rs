//! Connection pair: one accepted local socket and its remote counterpart.
//!
//! # Responsibilities
//! - Own both sockets and spawn the request and response loops
//! - Hold the state the two loops share: `upgraded` and the latest request
//! - Run registered filters in order with soft/critical failure handling
//! - Tear the pair down from either loop
//!
//! # Design Decisions
//! - The local write half is the only socket half both loops write to,
//!   so it is the only one behind a lock
//! - Teardown is broadcast on a watch channel; each loop drops its own halves

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use http::{Request, Response};
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex};
use tracing::{Instrument, Span};

use crate::filter::guard::{run_request_filter, run_response_filter};
use crate::filter::{FilterFailure, Severity};
use crate::http::{error_response, Limits, RequestHead};
use crate::net::stream::WriteHalf;
use crate::net::{ConnectionPermit, Stream};
use crate::observability::metrics;
use crate::proxy::{requests, responses, Shared};

/// Why a directional loop stopped early.
#[derive(Debug)]
pub(crate) enum Exit {
    /// A socket operation failed; the pair still needs closing.
    Io(io::Error),
    /// A critical filter failure already answered the client and closed the pair.
    Failed,
}

impl From<io::Error> for Exit {
    fn from(e: io::Error) -> Self {
        Exit::Io(e)
    }
}

pub(crate) struct ConnectionPair {
    shared: Arc<Shared>,
    upgraded: AtomicBool,
    latest_request: ArcSwapOption<RequestHead>,
    local: Mutex<WriteHalf>,
    closed: watch::Sender<bool>,
    _permit: ConnectionPermit,
}

impl ConnectionPair {
    /// Split both sockets and spawn the two forwarding loops inside `span`.
    ///
    /// Returns immediately; the loops run until either side closes.
    pub(crate) fn start(
        shared: Arc<Shared>,
        permit: ConnectionPermit,
        local: Stream,
        remote: Stream,
        span: Span,
    ) {
        let (local_read, local_write) = local.into_split();
        let (remote_read, remote_write) = remote.into_split();
        let (closed, _) = watch::channel(false);

        let request_closed = closed.subscribe();
        let response_closed = closed.subscribe();

        let pair = Arc::new(Self {
            shared,
            upgraded: AtomicBool::new(false),
            latest_request: ArcSwapOption::empty(),
            local: Mutex::new(local_write),
            closed,
            _permit: permit,
        });

        tokio::spawn(
            requests::run(Arc::clone(&pair), local_read, remote_write, request_closed)
                .instrument(span.clone()),
        );
        tokio::spawn(responses::run(pair, remote_read, response_closed).instrument(span));
    }

    pub(crate) fn limits(&self) -> Limits {
        self.shared.limits
    }

    pub(crate) fn is_upgraded(&self) -> bool {
        self.upgraded.load(Ordering::Acquire)
    }

    /// Switch the pair to raw forwarding in both directions. One-way.
    pub(crate) fn mark_upgraded(&self) {
        if !self.upgraded.swap(true, Ordering::AcqRel) {
            tracing::info!("Connection upgraded to a raw stream");
            metrics::record_upgrade();
        }
    }

    pub(crate) fn latest_request(&self) -> Option<Arc<RequestHead>> {
        self.latest_request.load_full()
    }

    pub(crate) fn set_latest_request(&self, head: RequestHead) {
        self.latest_request.store(Some(Arc::new(head)));
    }

    /// False when responses to `path` must be streamed without buffering.
    pub(crate) fn is_managed(&self, path: &str) -> bool {
        !self
            .shared
            .non_managed
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }

    pub(crate) async fn write_local(&self, bytes: &[u8]) -> io::Result<()> {
        let mut local = self.local.lock().await;
        local.write_all(bytes).await
    }

    /// Close both sockets. Safe to call from both loops; only the first call acts.
    pub(crate) async fn close(&self, from: &'static str, reason: &(dyn fmt::Display + Sync)) {
        if self.closed.send_replace(true) {
            return;
        }
        tracing::debug!(from, reason = %reason, "Closing the connections");

        let mut local = self.local.lock().await;
        if let Err(e) = local.shutdown().await {
            tracing::debug!(error = %e, "Local shutdown failed");
        }
    }

    /// Answer the client with a 503 for a critical filter failure, then close.
    pub(crate) async fn fail(&self, from: &'static str, failure: &FilterFailure) {
        let response = error_response("Failed to apply filter", failure);
        if let Err(e) = self.write_local(&response).await {
            tracing::debug!(error = %e, "Could not deliver the error response");
        }
        self.close(from, failure).await;
    }

    /// Run every matching request filter in registration order.
    ///
    /// Returns the final request and whether any filter replaced it.
    pub(crate) fn filter_request(
        &self,
        mut request: Request<Bytes>,
    ) -> Result<(Request<Bytes>, bool), FilterFailure> {
        let mut changed = false;

        for handler in &self.shared.handlers {
            let Some(filter) = handler.request_filter() else {
                continue;
            };
            if !handler.matches(request.uri().path()) {
                continue;
            }

            match run_request_filter(filter, &request) {
                Ok(Some(replacement)) => {
                    request = replacement;
                    changed = true;
                }
                Ok(None) => {}
                Err(failure) => {
                    metrics::record_filter_failure("request", failure.severity());
                    match failure.severity() {
                        Severity::Critical => {
                            tracing::error!(
                                url = %request.uri(),
                                error = %failure,
                                "Critical: failed to execute request filter"
                            );
                            return Err(failure);
                        }
                        Severity::Soft => {
                            tracing::warn!(url = %request.uri(), error = %failure, "Request filter warning");
                        }
                    }
                }
            }
        }

        Ok((request, changed))
    }

    /// Run every matching response filter in registration order.
    ///
    /// Handlers match against the path of the request the response answers.
    pub(crate) fn filter_response(
        &self,
        request: &RequestHead,
        mut response: Response<Bytes>,
    ) -> Result<(Response<Bytes>, bool), FilterFailure> {
        let mut changed = false;

        for handler in &self.shared.handlers {
            let Some(filter) = handler.response_filter() else {
                continue;
            };
            if !handler.matches(request.path()) {
                continue;
            }

            match run_response_filter(filter, request, &response) {
                Ok(Some(replacement)) => {
                    response = replacement;
                    changed = true;
                }
                Ok(None) => {}
                Err(failure) => {
                    metrics::record_filter_failure("response", failure.severity());
                    match failure.severity() {
                        Severity::Critical => {
                            tracing::error!(
                                url = %request.uri,
                                error = %failure,
                                "Critical: failed to execute response filter"
                            );
                            return Err(failure);
                        }
                        Severity::Soft => {
                            tracing::warn!(url = %request.uri, error = %failure, "Response filter warning");
                        }
                    }
                }
            }
        }

        Ok((response, changed))
    }
}

/// Clamp a remaining byte count to what is buffered.
pub(crate) fn clamp(remaining: u64, available: usize) -> usize {
    usize::try_from(remaining).map_or(available, |n| n.min(available))
}
