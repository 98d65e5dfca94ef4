//! Parsed message heads.
//!
//! Heads are kept separate from bodies so the response direction can decide
//! whether a body may be buffered before reading it.

use bytes::Bytes;
use http::header::{HeaderMap, EXPECT, UPGRADE};
use http::{Method, Request, Response, StatusCode, Uri, Version};

/// Head of a request: everything but the body.
///
/// This is what the response direction keeps of the most recently forwarded
/// request, and what response filters receive alongside the response.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// True when the client asks to switch the connection to a raw stream.
    ///
    /// Only the exact value `tcp` counts.
    pub fn is_tcp_upgrade(&self) -> bool {
        self.headers
            .get(UPGRADE)
            .map(|value| value.as_bytes() == b"tcp")
            .unwrap_or(false)
    }

    /// True when the client waits for `100 Continue` before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.headers
            .get(EXPECT)
            .map(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
            .unwrap_or(false)
    }

    /// Attach a body, producing the request handed to filters.
    pub fn into_request(self, body: Bytes) -> Request<Bytes> {
        let mut request = Request::new(body);
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers;
        request
    }
}

impl<B> From<&Request<B>> for RequestHead {
    fn from(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }
}

/// Head of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn into_response(self, body: Bytes) -> Response<Bytes> {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Whether a response to `request` with `status` can carry a body at all.
pub fn response_is_bodyless(status: StatusCode, request: Option<&RequestHead>) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || request.map(|r| r.method == Method::HEAD).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn head(upgrade: Option<&'static str>) -> RequestHead {
        let mut headers = HeaderMap::new();
        if let Some(value) = upgrade {
            headers.insert(UPGRADE, HeaderValue::from_static(value));
        }
        RequestHead {
            method: Method::POST,
            uri: Uri::from_static("/v1.41/containers/abc/attach?stream=1"),
            version: Version::HTTP_11,
            headers,
        }
    }

    #[test]
    fn tcp_upgrade_is_exact() {
        assert!(head(Some("tcp")).is_tcp_upgrade());
        assert!(!head(Some("TCP")).is_tcp_upgrade());
        assert!(!head(Some("websocket")).is_tcp_upgrade());
        assert!(!head(None).is_tcp_upgrade());
    }

    #[test]
    fn expect_continue_ignores_case() {
        let mut request = head(None);
        assert!(!request.expects_continue());

        request.headers.insert(EXPECT, HeaderValue::from_static("100-Continue"));
        assert!(request.expects_continue());

        request.headers.insert(EXPECT, HeaderValue::from_static("200-ok"));
        assert!(!request.expects_continue());
    }

    #[test]
    fn request_round_trips_through_head() {
        let request = head(None).into_request(Bytes::from_static(b"{}"));
        assert_eq!(request.uri().path(), "/v1.41/containers/abc/attach");
        assert_eq!(RequestHead::from(&request).path(), "/v1.41/containers/abc/attach");
        assert_eq!(request.body().as_ref(), b"{}");
    }

    #[test]
    fn bodyless_responses() {
        let get = head(None);
        let mut head_request = head(None);
        head_request.method = Method::HEAD;

        assert!(response_is_bodyless(StatusCode::SWITCHING_PROTOCOLS, Some(&get)));
        assert!(response_is_bodyless(StatusCode::NO_CONTENT, None));
        assert!(response_is_bodyless(StatusCode::OK, Some(&head_request)));
        assert!(!response_is_bodyless(StatusCode::OK, Some(&get)));
    }
}
