//! Incremental HTTP/1.x parsing over buffered bytes.
//!
//! Parsing never consumes anything: each function looks at the bytes buffered
//! so far and reports whether they hold a whole head or body, need more data,
//! or are not HTTP at all. The caller decides what to take from the buffer.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{Method, StatusCode, Uri, Version};

use crate::http::message::{response_is_bodyless, RequestHead, ResponseHead};

const MAX_HEADERS: usize = 100;

/// Size limits applied while buffering messages.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Bytes requested from a socket per read.
    pub read_buffer: usize,
    /// Largest head that is waited for before falling back to passthrough.
    pub max_head: usize,
    /// Largest body that is buffered for filtering.
    pub max_body: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            read_buffer: 16_000,
            max_head: 64 * 1024,
            max_body: 8 * 1024 * 1024,
        }
    }
}

/// Outcome of parsing a message head.
#[derive(Debug)]
pub enum Head<T> {
    /// A whole head spanning `len` bytes.
    Complete { head: T, len: usize },
    /// Looks like HTTP so far, more bytes needed.
    Partial,
    /// Not HTTP, or a head too large to wait for.
    Invalid,
}

/// How the body following a head is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Empty,
    Fixed(u64),
    Chunked,
    UntilClose,
}

/// Outcome of reading a body out of buffered bytes.
#[derive(Debug)]
pub enum Body {
    /// The decoded body and the number of raw bytes it spans.
    Complete { body: Bytes, len: usize },
    Partial,
    TooLarge,
    Invalid,
}

/// Parse a request head from the start of `buf`.
pub fn request_head(buf: &[u8], max_head: usize) -> Head<RequestHead> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);

    let len = match request.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return partial(buf, max_head),
        Err(_) => return Head::Invalid,
    };

    let (Some(method), Some(path)) = (request.method, request.path) else {
        return Head::Invalid;
    };
    let Ok(method) = Method::from_bytes(method.as_bytes()) else {
        return Head::Invalid;
    };
    let Ok(uri) = path.parse::<Uri>() else {
        return Head::Invalid;
    };
    let Some(headers) = header_map(request.headers) else {
        return Head::Invalid;
    };

    Head::Complete {
        head: RequestHead {
            method,
            uri,
            version: version(request.version),
            headers,
        },
        len,
    }
}

/// Parse a response head from the start of `buf`.
pub fn response_head(buf: &[u8], max_head: usize) -> Head<ResponseHead> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);

    let len = match response.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return partial(buf, max_head),
        Err(_) => return Head::Invalid,
    };

    let Some(Ok(status)) = response.code.map(StatusCode::from_u16) else {
        return Head::Invalid;
    };
    let Some(headers) = header_map(response.headers) else {
        return Head::Invalid;
    };

    Head::Complete {
        head: ResponseHead {
            status,
            version: version(response.version),
            headers,
        },
        len,
    }
}

fn partial<T>(buf: &[u8], max_head: usize) -> Head<T> {
    if buf.len() >= max_head {
        Head::Invalid
    } else {
        Head::Partial
    }
}

fn version(minor: Option<u8>) -> Version {
    match minor {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    }
}

fn header_map(raw: &[httparse::Header<'_>]) -> Option<HeaderMap> {
    let mut map = HeaderMap::with_capacity(raw.len());
    for header in raw {
        let name = HeaderName::from_bytes(header.name.as_bytes()).ok()?;
        let value = HeaderValue::from_bytes(header.value).ok()?;
        map.append(name, value);
    }
    Some(map)
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .last()
        .map(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

/// `None` when the header is absent, `Some(Err(()))` when it is unusable.
fn content_length(headers: &HeaderMap) -> Option<Result<u64, ()>> {
    let mut values = headers.get_all(CONTENT_LENGTH).iter();
    let first = values.next()?;
    let parsed = first
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or(());
    if values.any(|other| other != first) {
        return Some(Err(()));
    }
    Some(parsed)
}

/// Body delimitation of a request. `Err` means the framing is unusable.
pub fn request_body_length(head: &RequestHead) -> Result<BodyLength, ()> {
    if is_chunked(&head.headers) {
        return Ok(BodyLength::Chunked);
    }
    match content_length(&head.headers) {
        Some(Ok(0)) | None => Ok(BodyLength::Empty),
        Some(Ok(n)) => Ok(BodyLength::Fixed(n)),
        Some(Err(())) => Err(()),
    }
}

/// Body delimitation of a response to `request`.
pub fn response_body_length(head: &ResponseHead, request: Option<&RequestHead>) -> BodyLength {
    if response_is_bodyless(head.status, request) {
        return BodyLength::Empty;
    }
    if is_chunked(&head.headers) {
        return BodyLength::Chunked;
    }
    match content_length(&head.headers) {
        Some(Ok(0)) => BodyLength::Empty,
        Some(Ok(n)) => BodyLength::Fixed(n),
        Some(Err(())) | None => BodyLength::UntilClose,
    }
}

/// Read a body of the given length from `buf`, which starts right after the head.
///
/// `UntilClose` bodies are never complete while the connection is open, so
/// they always report `Partial`.
pub fn read_body(buf: &[u8], length: BodyLength, max_body: usize) -> Body {
    match length {
        BodyLength::Empty => Body::Complete {
            body: Bytes::new(),
            len: 0,
        },
        BodyLength::Fixed(n) => {
            let Ok(n) = usize::try_from(n) else {
                return Body::TooLarge;
            };
            if n > max_body {
                Body::TooLarge
            } else if buf.len() < n {
                Body::Partial
            } else {
                Body::Complete {
                    body: Bytes::copy_from_slice(&buf[..n]),
                    len: n,
                }
            }
        }
        BodyLength::Chunked => read_chunked(buf, max_body),
        BodyLength::UntilClose => Body::Partial,
    }
}

fn read_chunked(buf: &[u8], max_body: usize) -> Body {
    let mut body = BytesMut::new();
    let mut pos = 0;

    loop {
        let (consumed, size) = match httparse::parse_chunk_size(&buf[pos..]) {
            Ok(httparse::Status::Complete(found)) => found,
            Ok(httparse::Status::Partial) => return Body::Partial,
            Err(_) => return Body::Invalid,
        };
        pos += consumed;

        if size == 0 {
            return match trailers_end(&buf[pos..]) {
                Some(len) => Body::Complete {
                    body: body.freeze(),
                    len: pos + len,
                },
                None => Body::Partial,
            };
        }

        let size = match usize::try_from(size) {
            Ok(size) if size <= max_body.saturating_sub(body.len()) => size,
            _ => return Body::TooLarge,
        };
        let Some(end) = pos.checked_add(size).and_then(|end| end.checked_add(2)) else {
            return Body::TooLarge;
        };
        if buf.len() < end {
            return Body::Partial;
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        pos += size;
        if &buf[pos..pos + 2] != b"\r\n" {
            return Body::Invalid;
        }
        pos += 2;
    }
}

/// Length of the trailer section including its terminating empty line.
fn trailers_end(buf: &[u8]) -> Option<usize> {
    let mut pos = 0;
    loop {
        let line = buf[pos..].windows(2).position(|w| w == b"\r\n")?;
        pos += line + 2;
        if line == 0 {
            return Some(pos);
        }
    }
}
