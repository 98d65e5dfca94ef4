//! Intercepting proxy engine.
//!
//! # Data Flow
//! ```text
//! LocalListener (one accept task each)
//!     → accept.rs (label, bounded queue)
//!     → Proxy::process_until (single consumer)
//!     → dial task (one per accepted connection)
//!         ├── dial failed → 503 JSON response, close
//!         └── pair.rs (shared pair state)
//!               ├── requests.rs  local → remote
//!               └── responses.rs remote → local
//! ```
//!
//! # Design Decisions
//! - Dialing runs in its own task so a hanging remote never stalls accepting
//! - Handlers and limits are frozen into an `Arc` when serving starts
//! - A single accept failure is fatal to the whole proxy

mod accept;
mod pair;
mod requests;
mod responses;

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::filter::{FilterResult, Handler};
use crate::http::{error_response, Limits, RequestHead};
use crate::net::connection::next_proxy_index;
use crate::net::{Dial, ListenerError, LocalListener, Stream};
use crate::observability::metrics;
use accept::Accepted;
use pair::ConnectionPair;

/// Path fragment of the engine's long-polling wait endpoint.
pub const ENGINE_WAIT_PATH: &str = "/wait";

const DEFAULT_ACCEPT_QUEUE: usize = 64;
const DIAL_FAILURE_REASON: &str = "Failed to connect the proxy to the remote";
/// How long a refused client may keep sending before its socket is dropped.
const REFUSE_LINGER: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no listeners registered")]
    NoListeners,

    #[error("listener {listener} failed: {source}")]
    Accept {
        listener: Arc<str>,
        #[source]
        source: ListenerError,
    },

    #[error("accept queue closed")]
    ChannelClosed,

    #[error("invalid path pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// State every connection pair of one proxy reads.
pub(crate) struct Shared {
    pub(crate) handlers: Vec<Handler>,
    pub(crate) non_managed: Vec<String>,
    pub(crate) limits: Limits,
}

/// An intercepting proxy between local listeners and one remote endpoint.
///
/// Configure listeners and handlers, then call [`process`](Self::process).
pub struct Proxy {
    index: usize,
    dialer: Arc<dyn Dial>,
    listeners: Vec<(Arc<str>, LocalListener)>,
    handlers: Vec<Handler>,
    non_managed: Vec<String>,
    limits: Limits,
    accept_queue: usize,
}

impl Proxy {
    /// Create a proxy that opens one remote connection per accepted client
    /// through `dialer`.
    ///
    /// Responses to requests whose path contains any of `non_managed` are
    /// never buffered or filtered.
    pub fn new(dialer: impl Dial, non_managed: Vec<String>) -> Self {
        Self {
            index: next_proxy_index(),
            dialer: Arc::new(dialer),
            listeners: Vec::new(),
            handlers: Vec::new(),
            non_managed,
            limits: Limits::default(),
            accept_queue: DEFAULT_ACCEPT_QUEUE,
        }
    }

    /// A proxy in front of a container engine API, whose `/wait` endpoint
    /// long-polls and must stream through.
    pub fn for_engine_cli(dialer: impl Dial) -> Self {
        Self::new(dialer, vec![ENGINE_WAIT_PATH.to_string()])
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Capacity of the queue between the accept tasks and the dialer.
    pub fn with_accept_queue(mut self, capacity: usize) -> Self {
        self.accept_queue = capacity.max(1);
        self
    }

    /// Register a bound listener. An empty `name` falls back to the
    /// listener's network kind.
    pub fn add_listener(&mut self, name: &str, listener: impl Into<LocalListener>) {
        let listener = listener.into();
        let name: Arc<str> = if name.is_empty() {
            listener.kind().into()
        } else {
            name.into()
        };
        self.listeners.push((name, listener));
    }

    pub fn listener_names(&self) -> impl Iterator<Item = &str> {
        self.listeners.iter().map(|(name, _)| name.as_ref())
    }

    /// Shorthand for [`filter_requests`](Self::filter_requests).
    pub fn handle<F>(&mut self, pattern: &str, filter: F) -> Result<(), ProxyError>
    where
        F: Fn(&Request<Bytes>) -> FilterResult<Request<Bytes>> + Send + Sync + 'static,
    {
        self.filter_requests(pattern, filter)
    }

    /// Run `filter` on every request whose path matches `pattern`.
    pub fn filter_requests<F>(&mut self, pattern: &str, filter: F) -> Result<(), ProxyError>
    where
        F: Fn(&Request<Bytes>) -> FilterResult<Request<Bytes>> + Send + Sync + 'static,
    {
        self.handlers.push(Handler::requests(pattern, filter)?);
        Ok(())
    }

    /// Run `filter` on every response to a request whose path matches `pattern`.
    pub fn filter_responses<F>(&mut self, pattern: &str, filter: F) -> Result<(), ProxyError>
    where
        F: Fn(&RequestHead, &Response<Bytes>) -> FilterResult<Response<Bytes>> + Send + Sync + 'static,
    {
        self.handlers.push(Handler::responses(pattern, filter)?);
        Ok(())
    }

    /// Serve until a listener fails.
    pub async fn process(self) -> Result<(), ProxyError> {
        self.process_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes or a listener fails.
    ///
    /// Either way every listener is closed on return. Connection pairs that
    /// are already running are left to finish on their own.
    pub async fn process_until<S>(self, shutdown: S) -> Result<(), ProxyError>
    where
        S: Future<Output = ()>,
    {
        if self.listeners.is_empty() {
            return Err(ProxyError::NoListeners);
        }

        let Proxy {
            index,
            dialer,
            listeners,
            handlers,
            non_managed,
            limits,
            accept_queue,
        } = self;

        let shared = Arc::new(Shared {
            handlers,
            non_managed,
            limits,
        });

        let (queue, mut accepted) = mpsc::channel(accept_queue);
        let mut accepting = JoinSet::new();
        for (name, listener) in listeners {
            tracing::info!(proxy = index, listener = %name, address = %listener.describe(), "Listening");
            accepting.spawn(accept::run(index, name, listener, queue.clone()));
        }
        drop(queue);

        tokio::pin!(shutdown);
        loop {
            let next = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(proxy = index, "Shutting down, closing listeners");
                    return Ok(());
                }
                next = accepted.recv() => next,
            };

            match next {
                Some(Ok(connection)) => connect(&shared, &dialer, connection),
                Some(Err(e)) => {
                    tracing::error!(proxy = index, error = %e, "Closing all listeners");
                    return Err(e);
                }
                None => return Err(ProxyError::ChannelClosed),
            }
        }
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("index", &self.index)
            .field("listeners", &self.listeners)
            .field("handlers", &self.handlers)
            .field("non_managed", &self.non_managed)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Dial the remote for an accepted connection in its own task.
fn connect(shared: &Arc<Shared>, dialer: &Arc<dyn Dial>, accepted: Accepted) {
    let Accepted {
        label,
        stream,
        permit,
    } = accepted;

    metrics::record_connection(label.listener());
    let span = tracing::info_span!("pair", id = %label);
    let shared = Arc::clone(shared);
    let dial = dialer.dial();

    tokio::spawn(
        async move {
            tracing::debug!("Accepted local connection");
            match dial.await {
                Ok(remote) => {
                    tracing::debug!("Connected to the remote");
                    ConnectionPair::start(shared, permit, stream, remote, tracing::Span::current());
                }
                Err(e) => refuse(stream, e).await,
            }
        }
        .instrument(span),
    );
}

/// Answer a client whose remote could not be reached, then drop it.
async fn refuse(local: Stream, error: io::Error) {
    tracing::warn!(error = %error, "{DIAL_FAILURE_REASON}");
    metrics::record_dial_failure();

    let (mut reader, mut writer) = local.into_split();
    let response = error_response(DIAL_FAILURE_REASON, &error);
    if let Err(e) = writer.write_all(&response).await {
        tracing::debug!(error = %e, "Could not deliver the error response");
        return;
    }
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(error = %e, "Local shutdown failed");
        return;
    }

    // Closing with unread input resets the connection and can discard the
    // response, so drain whatever the client already sent.
    let mut sink = [0u8; 1024];
    let drain = async {
        while matches!(reader.read(&mut sink).await, Ok(n) if n > 0) {}
    };
    let _ = tokio::time::timeout(REFUSE_LINGER, drain).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Endpoint;
    use tokio::net::TcpListener;

    fn proxy() -> Proxy {
        Proxy::new(Endpoint::Tcp("127.0.0.1:9".to_string()).dialer(), Vec::new())
    }

    #[tokio::test]
    async fn empty_listener_name_falls_back_to_kind() {
        let mut proxy = proxy();
        proxy.add_listener("", TcpListener::bind("127.0.0.1:0").await.unwrap());
        proxy.add_listener("L02", TcpListener::bind("127.0.0.1:0").await.unwrap());

        assert_eq!(proxy.listener_names().collect::<Vec<_>>(), ["tcp", "L02"]);
    }

    #[test]
    fn engine_cli_proxy_streams_wait() {
        let proxy = Proxy::for_engine_cli(Endpoint::Tcp("127.0.0.1:9".to_string()).dialer());
        assert_eq!(proxy.non_managed, [ENGINE_WAIT_PATH]);
    }

    #[test]
    fn accept_queue_is_never_zero() {
        assert_eq!(proxy().with_accept_queue(0).accept_queue, 1);
    }

    #[test]
    fn handlers_keep_registration_order() {
        let mut proxy = proxy();
        proxy
            .filter_requests("^/a$", |_: &Request<Bytes>| -> FilterResult<Request<Bytes>> { Ok(None) })
            .unwrap();
        proxy
            .filter_responses("^/b$", |_: &RequestHead, _: &Response<Bytes>| -> FilterResult<Response<Bytes>> {
                Ok(None)
            })
            .unwrap();

        let patterns: Vec<_> = proxy.handlers.iter().map(Handler::pattern).collect();
        assert_eq!(patterns, ["^/a$", "^/b$"]);
        assert!(proxy.handlers[1].request_filter().is_none());
    }
}
