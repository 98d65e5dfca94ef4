//! Listen and connect addresses.
//!
//! Addresses are written as `scheme://address` with `tcp` or `unix` as the
//! scheme. A bare path starting with `/` is a Unix socket; anything else is a
//! TCP `host:port`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

use crate::net::dial::Dial;
use crate::net::listener::{ListenerError, LocalListener};
use crate::net::stream::Stream;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("empty address")]
    Empty,
    #[error("unsupported network {0:?} (expected tcp or unix)")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let endpoint = match s.split_once("://") {
            Some(("tcp", address)) => Endpoint::Tcp(address.to_string()),
            Some(("unix", path)) => Endpoint::Unix(PathBuf::from(path)),
            Some((scheme, _)) => return Err(EndpointError::UnsupportedScheme(scheme.to_string())),
            None if s.starts_with('/') => Endpoint::Unix(PathBuf::from(s)),
            None => Endpoint::Tcp(s.to_string()),
        };

        match &endpoint {
            Endpoint::Tcp(address) if address.is_empty() => Err(EndpointError::Empty),
            Endpoint::Unix(path) if path.as_os_str().is_empty() => Err(EndpointError::Empty),
            _ => Ok(endpoint),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(address) => write!(f, "tcp://{address}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Endpoint {
    /// Bind a listener on this address.
    pub async fn bind(&self) -> Result<LocalListener, ListenerError> {
        match self {
            Endpoint::Tcp(address) => {
                let listener = TcpListener::bind(address.as_str())
                    .await
                    .map_err(ListenerError::Bind)?;
                Ok(listener.into())
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(UnixListener::bind(path).map_err(ListenerError::Bind)?.into()),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(ListenerError::Bind(unix_unsupported())),
        }
    }

    /// Open a new connection to this address.
    pub async fn connect(&self) -> std::io::Result<Stream> {
        match self {
            Endpoint::Tcp(address) => Ok(TcpStream::connect(address.as_str()).await?.into()),
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(UnixStream::connect(path).await?.into()),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(unix_unsupported()),
        }
    }

    /// A dial factory that connects to this address on every call.
    pub fn dialer(&self) -> impl Dial {
        let endpoint = self.clone();
        move || {
            let endpoint = endpoint.clone();
            async move { endpoint.connect().await }
        }
    }
}

#[cfg(not(unix))]
fn unix_unsupported() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "unix sockets are not supported on this platform",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schemes() {
        assert_eq!(
            "tcp://127.0.0.1:2375".parse::<Endpoint>(),
            Ok(Endpoint::Tcp("127.0.0.1:2375".into()))
        );
        assert_eq!(
            "unix:///var/run/docker.sock".parse::<Endpoint>(),
            Ok(Endpoint::Unix("/var/run/docker.sock".into()))
        );
    }

    #[test]
    fn bare_addresses() {
        assert_eq!(
            "/tmp/proxy.sock".parse::<Endpoint>(),
            Ok(Endpoint::Unix("/tmp/proxy.sock".into()))
        );
        assert_eq!(
            "0.0.0.0:2375".parse::<Endpoint>(),
            Ok(Endpoint::Tcp("0.0.0.0:2375".into()))
        );
    }

    #[test]
    fn rejects_bad_addresses() {
        assert_eq!("".parse::<Endpoint>(), Err(EndpointError::Empty));
        assert_eq!("tcp://".parse::<Endpoint>(), Err(EndpointError::Empty));
        assert_eq!(
            "npipe:////./pipe/docker_engine".parse::<Endpoint>(),
            Err(EndpointError::UnsupportedScheme("npipe".into()))
        );
    }

    #[test]
    fn display_round_trips() {
        for raw in ["tcp://localhost:2375", "unix:///var/run/docker.sock"] {
            assert_eq!(raw.parse::<Endpoint>().unwrap().to_string(), raw);
        }
    }

    #[tokio::test]
    async fn dialer_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = Endpoint::Tcp(listener.local_addr().unwrap().to_string());

        let stream = endpoint.dialer().dial().await.unwrap();
        assert_eq!(stream.kind(), "tcp");
    }
}
