//! Request direction: local client → remote.
//!
//! Complete requests are parsed, filtered and forwarded. Anything that cannot
//! be parsed, or is too large to buffer, is forwarded as it arrived. So is a
//! request waiting on `100 Continue`. Once the pair is upgraded every byte is
//! forwarded raw.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::http::encode::encode_request;
use crate::http::parse::{self, Body, BodyLength, Head};
use crate::http::{ReplayReader, RequestHead};
use crate::net::stream::{ReadHalf, WriteHalf};
use crate::proxy::pair::{clamp, ConnectionPair, Exit};

const DIRECTION: &str = "request";

pub(crate) async fn run(
    pair: Arc<ConnectionPair>,
    local: ReadHalf,
    mut remote: WriteHalf,
    mut closed: watch::Receiver<bool>,
) {
    let mut reader = ReplayReader::new(local, pair.limits().read_buffer);
    // Body bytes still owed to the remote for a request that was not buffered.
    let mut unbuffered: u64 = 0;

    loop {
        let read = tokio::select! {
            _ = closed.changed() => return,
            read = reader.fill() => read,
        };

        match read {
            Ok(0) => {
                finish(&pair, &mut reader, &mut remote).await;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                pair.close(DIRECTION, &e).await;
                return;
            }
        }

        match forward(&pair, &mut reader, &mut remote, &mut unbuffered).await {
            Ok(()) => {}
            Err(Exit::Io(e)) => {
                pair.close(DIRECTION, &e).await;
                return;
            }
            Err(Exit::Failed) => return,
        }
    }
}

/// Handle EOF from the local side.
///
/// An upgraded pair is only half-closed so the remote can finish sending;
/// otherwise the whole pair goes down.
async fn finish(pair: &ConnectionPair, reader: &mut ReplayReader<ReadHalf>, remote: &mut WriteHalf) {
    if !reader.is_empty() {
        let raw = reader.replay_all();
        if let Err(e) = remote.write_all(&raw).await {
            pair.close(DIRECTION, &e).await;
            return;
        }
        tracing::debug!(bytes = raw.len(), "Flushed trailing request bytes");
    }

    if !pair.is_upgraded() {
        pair.close(DIRECTION, &"EOF").await;
        return;
    }

    tracing::debug!("Local side finished the raw stream, half-closing");
    if let Err(e) = reader.get_ref().shutdown_read() {
        tracing::debug!(error = %e, "Local read shutdown failed");
    }
    if let Err(e) = remote.shutdown().await {
        tracing::debug!(error = %e, "Remote write shutdown failed");
    }
}

async fn forward(
    pair: &ConnectionPair,
    reader: &mut ReplayReader<ReadHalf>,
    remote: &mut WriteHalf,
    unbuffered: &mut u64,
) -> Result<(), Exit> {
    let limits = pair.limits();

    while !reader.is_empty() {
        if pair.is_upgraded() {
            let raw = reader.replay_all();
            remote.write_all(&raw).await?;
            tracing::debug!(bytes = raw.len(), "Sent raw stream data");
            return Ok(());
        }

        if *unbuffered > 0 {
            let raw = reader.replay(clamp(*unbuffered, reader.len()));
            *unbuffered -= raw.len() as u64;
            remote.write_all(&raw).await?;
            tracing::debug!(bytes = raw.len(), "Sent request body data");
            continue;
        }

        let (head, head_len) = match parse::request_head(reader.buffered(), limits.max_head) {
            Head::Complete { head, len } => (head, len),
            Head::Partial => return Ok(()),
            Head::Invalid => {
                let raw = reader.replay_all();
                remote.write_all(&raw).await?;
                tracing::debug!(bytes = raw.len(), "Sent unparsed request data");
                return Ok(());
            }
        };

        let Ok(length) = parse::request_body_length(&head) else {
            publish(pair, &head);
            let raw = reader.replay_all();
            remote.write_all(&raw).await?;
            tracing::debug!(bytes = raw.len(), "Sent request with unusable framing");
            return Ok(());
        };

        match parse::read_body(&reader.buffered()[head_len..], length, limits.max_body) {
            // The client holds the body back until the remote answers.
            Body::Partial if head.expects_continue() => {
                send_unbuffered(pair, reader, remote, head, head_len, length, unbuffered).await?;
            }
            Body::Partial => return Ok(()),
            Body::Complete { body, len } => {
                let raw = reader.replay(head_len + len);
                forward_message(pair, head, body, raw, remote).await?;
            }
            Body::TooLarge | Body::Invalid => {
                send_unbuffered(pair, reader, remote, head, head_len, length, unbuffered).await?;
            }
        }
    }

    Ok(())
}

/// Record a request that bypasses the filters as the one the next response
/// answers.
fn publish(pair: &ConnectionPair, head: &RequestHead) {
    if head.is_tcp_upgrade() {
        pair.mark_upgraded();
    }
    pair.set_latest_request(head.clone());
}

/// Forward a head and whatever body is buffered; the rest of a fixed-length
/// body follows as it arrives.
async fn send_unbuffered(
    pair: &ConnectionPair,
    reader: &mut ReplayReader<ReadHalf>,
    remote: &mut WriteHalf,
    head: RequestHead,
    head_len: usize,
    length: BodyLength,
    unbuffered: &mut u64,
) -> Result<(), Exit> {
    let take = match length {
        BodyLength::Fixed(n) => {
            let body = clamp(n, reader.len() - head_len);
            *unbuffered = n - body as u64;
            head_len + body
        }
        _ => reader.len(),
    };

    publish(pair, &head);
    let raw = reader.replay(take);
    remote.write_all(&raw).await?;
    tracing::info!(
        method = %head.method,
        url = %head.uri,
        "Sent HTTP request without buffering the body"
    );
    Ok(())
}

async fn forward_message(
    pair: &ConnectionPair,
    head: RequestHead,
    body: Bytes,
    raw: Bytes,
    remote: &mut WriteHalf,
) -> Result<(), Exit> {
    if head.is_tcp_upgrade() {
        pair.mark_upgraded();
    }

    let (request, changed) = match pair.filter_request(head.into_request(body)) {
        Ok(filtered) => filtered,
        Err(failure) => {
            pair.fail(DIRECTION, &failure).await;
            return Err(Exit::Failed);
        }
    };

    // Published before the remote can see the request, so the response loop
    // always pairs the answer with it.
    pair.set_latest_request(RequestHead::from(&request));

    if changed {
        remote.write_all(&encode_request(&request)).await?;
    } else {
        remote.write_all(&raw).await?;
    }

    tracing::info!(
        method = %request.method(),
        url = %request.uri(),
        bytes = request.body().len(),
        "Sent HTTP request"
    );
    Ok(())
}
