//! Serialization of filtered messages back to HTTP/1.x bytes.
//!
//! Only messages a filter replaced go through here; untouched messages are
//! forwarded as the raw bytes they arrived in. `Content-Length` is always
//! recomputed from the final body and `Transfer-Encoding` is dropped, since
//! the body is complete by the time it is written.

use bytes::Bytes;
use http::header::{HeaderMap, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{Request, Response, Version};

const CRLF: &[u8] = b"\r\n";

pub fn encode_request(request: &Request<Bytes>) -> Vec<u8> {
    let body = request.body();
    let mut buf = Vec::with_capacity(256 + body.len());

    buf.extend_from_slice(request.method().as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(request.uri().to_string().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(version_str(request.version()).as_bytes());
    buf.extend_from_slice(CRLF);

    let framed = request.headers().contains_key(CONTENT_LENGTH)
        || request.headers().contains_key(TRANSFER_ENCODING);
    let length = (framed || !body.is_empty()).then_some(body.len());
    write_headers(&mut buf, request.headers(), length);

    buf.extend_from_slice(body);
    buf
}

/// Encode a response. `bodyless` responses (to `HEAD`, or 1xx/204/304) keep
/// their headers as they are and never carry body bytes.
pub fn encode_response(response: &Response<Bytes>, bodyless: bool) -> Vec<u8> {
    let body = response.body();
    let mut buf = Vec::with_capacity(256 + body.len());

    buf.extend_from_slice(version_str(response.version()).as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(response.status().as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(
        response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .as_bytes(),
    );
    buf.extend_from_slice(CRLF);

    if bodyless {
        write_headers_verbatim(&mut buf, response.headers());
    } else {
        write_headers(&mut buf, response.headers(), Some(body.len()));
        buf.extend_from_slice(body);
    }
    buf
}

fn write_headers(buf: &mut Vec<u8>, headers: &HeaderMap, content_length: Option<usize>) {
    for (name, value) in headers {
        if *name == CONTENT_LENGTH || *name == TRANSFER_ENCODING {
            continue;
        }
        write_header(buf, name.as_str(), value.as_bytes());
    }
    if let Some(length) = content_length {
        write_header(buf, CONTENT_LENGTH.as_str(), length.to_string().as_bytes());
    }
    buf.extend_from_slice(CRLF);
}

fn write_headers_verbatim(buf: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers {
        write_header(buf, name.as_str(), value.as_bytes());
    }
    buf.extend_from_slice(CRLF);
}

fn write_header(buf: &mut Vec<u8>, name: &str, value: &[u8]) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value);
    buf.extend_from_slice(CRLF);
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    }
}
