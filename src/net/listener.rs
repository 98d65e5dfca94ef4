//! Local listeners with backpressure.
//!
//! # Responsibilities
//! - Accept connections on an already-bound TCP or Unix-domain socket
//! - Optionally cap concurrent connections via semaphore
//! - Report the network kind used as a listener's default name

use std::sync::Arc;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::Semaphore;

use crate::net::stream::Stream;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Accept(e) => Some(e),
        }
    }
}

#[derive(Debug)]
enum Socket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// A bound listening socket handed to the proxy.
///
/// Without a connection limit every accepted connection is handed over at
/// once. With one, accepting waits until a slot is free.
#[derive(Debug)]
pub struct LocalListener {
    socket: Socket,
    connection_limit: Option<Arc<Semaphore>>,
}

impl LocalListener {
    /// Cap the number of connections from this listener alive at once.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.connection_limit = Some(Arc::new(Semaphore::new(max_connections)));
        self
    }

    /// Network kind, `"tcp"` or `"unix"`.
    pub fn kind(&self) -> &'static str {
        match self.socket {
            Socket::Tcp(_) => "tcp",
            #[cfg(unix)]
            Socket::Unix(_) => "unix",
        }
    }

    /// Human-readable local address for logs.
    pub fn describe(&self) -> String {
        match &self.socket {
            Socket::Tcp(listener) => listener
                .local_addr()
                .map(|addr| format!("tcp://{addr}"))
                .unwrap_or_else(|_| "tcp://<unknown>".to_string()),
            #[cfg(unix)]
            Socket::Unix(listener) => listener
                .local_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| format!("unix://{}", p.display())))
                .unwrap_or_else(|| "unix://<unnamed>".to_string()),
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(Stream, ConnectionPermit), ListenerError> {
        let permit = match &self.connection_limit {
            Some(limit) => Some(limit.clone().acquire_owned().await.map_err(|e| {
                ListenerError::Accept(std::io::Error::new(std::io::ErrorKind::Other, e))
            })?),
            None => None,
        };

        let stream = match &self.socket {
            Socket::Tcp(listener) => {
                let (stream, addr) = listener.accept().await.map_err(ListenerError::Accept)?;
                tracing::debug!(
                    peer_addr = %addr,
                    available_permits = ?self.available_permits(),
                    "Connection accepted"
                );
                Stream::Tcp(stream)
            }
            #[cfg(unix)]
            Socket::Unix(listener) => {
                let (stream, _) = listener.accept().await.map_err(ListenerError::Accept)?;
                tracing::debug!(available_permits = ?self.available_permits(), "Connection accepted");
                Stream::Unix(stream)
            }
        };

        Ok((stream, ConnectionPermit { _permit: permit }))
    }

    /// Get current available connection slots, if limited.
    pub fn available_permits(&self) -> Option<usize> {
        self.connection_limit.as_ref().map(|limit| limit.available_permits())
    }
}

impl From<TcpListener> for LocalListener {
    fn from(listener: TcpListener) -> Self {
        Self {
            socket: Socket::Tcp(listener),
            connection_limit: None,
        }
    }
}

#[cfg(unix)]
impl From<UnixListener> for LocalListener {
    fn from(listener: UnixListener) -> Self {
        Self {
            socket: Socket::Unix(listener),
            connection_limit: None,
        }
    }
}

/// A connection slot, released when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: Option<tokio::sync::OwnedSemaphorePermit>,
}
