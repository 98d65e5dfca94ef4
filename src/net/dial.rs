//! Dial factories for the remote endpoint.

use std::future::Future;
use std::io;

use futures_util::future::BoxFuture;

use crate::net::stream::Stream;

/// Produces a fresh connection to the remote endpoint on demand.
///
/// Called once per accepted local connection. Implemented for any
/// `Fn() -> impl Future<Output = io::Result<Stream>>`; wrap the dial in
/// `tokio::time::timeout` inside the closure to bound it.
pub trait Dial: Send + Sync + 'static {
    fn dial(&self) -> BoxFuture<'static, io::Result<Stream>>;
}

impl<F, Fut> Dial for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<Stream>> + Send + 'static,
{
    fn dial(&self) -> BoxFuture<'static, io::Result<Stream>> {
        Box::pin(self())
    }
}
