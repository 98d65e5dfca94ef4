//! Response direction: remote → local client.
//!
//! Each response is paired with the latest request the request direction
//! forwarded. Responses to managed paths are buffered and filtered; the rest
//! (non-managed paths, bodies without a length, bodies over the limit) are
//! streamed through as they arrive.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;

use crate::http::encode::encode_response;
use crate::http::message::response_is_bodyless;
use crate::http::parse::{self, Body, BodyLength, Head};
use crate::http::{ReplayReader, RequestHead, ResponseHead};
use crate::net::stream::ReadHalf;
use crate::proxy::pair::{clamp, ConnectionPair, Exit};

const DIRECTION: &str = "response";

/// Body bytes that pass through without parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Streaming {
    None,
    Bytes(u64),
    UntilClose,
}

pub(crate) async fn run(
    pair: Arc<ConnectionPair>,
    remote: ReadHalf,
    mut closed: watch::Receiver<bool>,
) {
    let mut reader = ReplayReader::new(remote, pair.limits().read_buffer);
    let mut streaming = Streaming::None;

    loop {
        let read = tokio::select! {
            _ = closed.changed() => return,
            read = reader.fill() => read,
        };

        match read {
            Ok(0) => {
                if !reader.is_empty() {
                    let raw = reader.replay_all();
                    match pair.write_local(&raw).await {
                        Ok(()) => tracing::debug!(bytes = raw.len(), "Flushed trailing response bytes"),
                        Err(e) => tracing::debug!(error = %e, "Could not flush trailing response bytes"),
                    }
                }
                pair.close(DIRECTION, &"EOF").await;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                pair.close(DIRECTION, &e).await;
                return;
            }
        }

        match forward(&pair, &mut reader, &mut streaming).await {
            Ok(()) => {}
            Err(Exit::Io(e)) => {
                pair.close(DIRECTION, &e).await;
                return;
            }
            Err(Exit::Failed) => return,
        }
    }
}

async fn forward(
    pair: &ConnectionPair,
    reader: &mut ReplayReader<ReadHalf>,
    streaming: &mut Streaming,
) -> Result<(), Exit> {
    let limits = pair.limits();

    while !reader.is_empty() {
        if pair.is_upgraded() || *streaming == Streaming::UntilClose {
            let raw = reader.replay_all();
            pair.write_local(&raw).await?;
            tracing::debug!(bytes = raw.len(), "Sent raw response data");
            return Ok(());
        }

        if let Streaming::Bytes(remaining) = *streaming {
            let raw = reader.replay(clamp(remaining, reader.len()));
            let remaining = remaining - raw.len() as u64;
            *streaming = if remaining == 0 {
                Streaming::None
            } else {
                Streaming::Bytes(remaining)
            };
            pair.write_local(&raw).await?;
            tracing::debug!(bytes = raw.len(), "Sent response body data");
            continue;
        }

        let (head, head_len) = match parse::response_head(reader.buffered(), limits.max_head) {
            Head::Complete { head, len } => (head, len),
            Head::Partial => return Ok(()),
            Head::Invalid => {
                let raw = reader.replay_all();
                pair.write_local(&raw).await?;
                tracing::debug!(bytes = raw.len(), "Sent unparsed response data");
                return Ok(());
            }
        };

        let latest = pair.latest_request();
        let length = parse::response_body_length(&head, latest.as_deref());

        let Some(request) = latest.as_deref().filter(|r| pair.is_managed(r.path())) else {
            stream(pair, reader, &head, head_len, length, streaming).await?;
            continue;
        };

        // Interim answers such as `100 Continue` precede the real response.
        if length == BodyLength::UntilClose || head.status.is_informational() {
            stream(pair, reader, &head, head_len, length, streaming).await?;
            continue;
        }

        match parse::read_body(&reader.buffered()[head_len..], length, limits.max_body) {
            Body::Partial => return Ok(()),
            Body::Complete { body, len } => {
                let raw = reader.replay(head_len + len);
                forward_message(pair, request, head, body, raw).await?;
            }
            Body::TooLarge | Body::Invalid => {
                stream(pair, reader, &head, head_len, length, streaming).await?;
            }
        }
    }

    Ok(())
}

/// Forward a response head and whatever body is buffered, leaving the rest
/// of the body to pass through as it arrives.
async fn stream(
    pair: &ConnectionPair,
    reader: &mut ReplayReader<ReadHalf>,
    head: &ResponseHead,
    head_len: usize,
    length: BodyLength,
    streaming: &mut Streaming,
) -> Result<(), Exit> {
    let take = match length {
        BodyLength::Empty => head_len,
        BodyLength::Fixed(n) => {
            let body = clamp(n, reader.len() - head_len);
            let remaining = n - body as u64;
            if remaining > 0 {
                *streaming = Streaming::Bytes(remaining);
            }
            head_len + body
        }
        // Chunk framing is not tracked; later chunks fail to parse as a head
        // and pass through on their own.
        BodyLength::Chunked => reader.len(),
        BodyLength::UntilClose => {
            *streaming = Streaming::UntilClose;
            reader.len()
        }
    };

    let raw = reader.replay(take);
    pair.write_local(&raw).await?;
    tracing::info!(status = head.status.as_u16(), "Response: HTTP {} (streamed)", head.status.as_u16());
    Ok(())
}

async fn forward_message(
    pair: &ConnectionPair,
    request: &RequestHead,
    head: ResponseHead,
    body: Bytes,
    raw: Bytes,
) -> Result<(), Exit> {
    let bodyless = response_is_bodyless(head.status, Some(request));

    let (response, changed) = match pair.filter_response(request, head.into_response(body)) {
        Ok(filtered) => filtered,
        Err(failure) => {
            pair.fail(DIRECTION, &failure).await;
            return Err(Exit::Failed);
        }
    };

    if changed {
        pair.write_local(&encode_response(&response, bodyless)).await?;
    } else {
        pair.write_local(&raw).await?;
    }

    tracing::info!(status = response.status().as_u16(), "Response: HTTP {}", response.status().as_u16());
    tracing::debug!(bytes = response.body().len(), url = %request.uri, "Sent response data");
    Ok(())
}
