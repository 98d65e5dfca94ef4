//! Per-listener accept loops.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::net::connection::ListenerCounter;
use crate::net::{ConnectionLabel, ConnectionPermit, LocalListener, Stream};
use crate::proxy::ProxyError;

/// A local connection waiting to be paired with a remote one.
pub(crate) struct Accepted {
    pub(crate) label: ConnectionLabel,
    pub(crate) stream: Stream,
    pub(crate) permit: ConnectionPermit,
}

pub(crate) type AcceptQueue = mpsc::Sender<Result<Accepted, ProxyError>>;

/// Accept connections on `listener` until it fails or the queue is gone.
///
/// An accept error is forwarded to the consumer, which tears the proxy down.
pub(crate) async fn run(proxy: usize, name: Arc<str>, listener: LocalListener, queue: AcceptQueue) {
    let counter = ListenerCounter::default();

    loop {
        let accepted = match listener.accept().await {
            Ok((stream, permit)) => Ok(Accepted {
                label: ConnectionLabel::new(proxy, Arc::clone(&name), counter.next()),
                stream,
                permit,
            }),
            Err(source) => {
                tracing::error!(listener = %name, error = %source, "Failed to accept a connection");
                Err(ProxyError::Accept {
                    listener: Arc::clone(&name),
                    source,
                })
            }
        };

        let failed = accepted.is_err();
        if queue.send(accepted).await.is_err() || failed {
            return;
        }
    }
}
