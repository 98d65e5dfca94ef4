//! JSON filter adapters.
//!
//! Turn a "decode → transform → re-encode" function into a request or
//! response filter. The transform gets the decoded value and returns
//! `Some(value)` to replace the body, or `None` to leave the message alone
//! (in which case nothing is re-encoded and the original bytes go through).

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_LENGTH};
use http::{Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::filter::{FilterFailure, FilterResult};
use crate::http::RequestHead;

pub const JSON_CATEGORY: &str = "JSON";

/// Build a request filter that edits the JSON body as a `T`.
///
/// The replacement keeps the method, URI and every original header; only the
/// body and `Content-Length` change.
pub fn filter_request_as_json<T, F>(
    transform: F,
) -> impl Fn(&Request<Bytes>) -> FilterResult<Request<Bytes>> + Send + Sync + 'static
where
    T: DeserializeOwned + Serialize + 'static,
    F: Fn(T) -> Option<T> + Send + Sync + 'static,
{
    move |request: &Request<Bytes>| -> FilterResult<Request<Bytes>> {
        let Some(value) = transform(decode::<T>(request.body())?) else {
            return Ok(None);
        };
        let body = encode(&value)?;

        let mut changed = Request::new(Bytes::new());
        *changed.method_mut() = request.method().clone();
        *changed.uri_mut() = request.uri().clone();
        *changed.version_mut() = request.version();
        *changed.headers_mut() = request.headers().clone();
        changed
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        *changed.body_mut() = body;

        Ok(Some(changed))
    }
}

/// Build a response filter that edits the JSON body as a `T`.
///
/// The replacement is a copy of the original response with a new body and a
/// recomputed `Content-Length`.
pub fn filter_response_as_json<T, F>(
    transform: F,
) -> impl Fn(&RequestHead, &Response<Bytes>) -> FilterResult<Response<Bytes>> + Send + Sync + 'static
where
    T: DeserializeOwned + Serialize + 'static,
    F: Fn(T) -> Option<T> + Send + Sync + 'static,
{
    move |_request: &RequestHead, response: &Response<Bytes>| -> FilterResult<Response<Bytes>> {
        let Some(value) = transform(decode::<T>(response.body())?) else {
            return Ok(None);
        };
        let body = encode(&value)?;

        let mut changed = Response::new(Bytes::new());
        *changed.status_mut() = response.status();
        *changed.version_mut() = response.version();
        *changed.headers_mut() = response.headers().clone();
        changed
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        *changed.body_mut() = body;

        Ok(Some(changed))
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, FilterFailure> {
    serde_json::from_slice(body).map_err(|e| FilterFailure::critical(e, JSON_CATEGORY))
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes, FilterFailure> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| FilterFailure::critical(e, JSON_CATEGORY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct ServiceSpec {
        name: String,
        #[serde(default)]
        labels: BTreeMap<String, String>,
    }

    fn create_request(body: &'static [u8]) -> Request<Bytes> {
        let mut request = Request::new(Bytes::from_static(body));
        *request.method_mut() = Method::POST;
        *request.uri_mut() = "/v1.41/services/create".parse().unwrap();
        request
            .headers_mut()
            .insert("x-registry-auth", HeaderValue::from_static("e30="));
        request
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        request
    }

    #[test]
    fn request_body_is_replaced() {
        let filter = filter_request_as_json(|mut spec: ServiceSpec| {
            spec.labels.insert("pod".into(), "web".into());
            Some(spec)
        });

        let changed = filter(&create_request(b"{\"Name\":\"web\"}")).unwrap().unwrap();
        let spec: ServiceSpec = serde_json::from_slice(changed.body()).unwrap();

        assert_eq!(spec.name, "web");
        assert_eq!(spec.labels.get("pod").map(String::as_str), Some("web"));
        assert_eq!(changed.method(), &Method::POST);
        assert_eq!(changed.uri().path(), "/v1.41/services/create");
        assert_eq!(changed.headers()["x-registry-auth"], "e30=");
        assert_eq!(
            changed.headers()[CONTENT_LENGTH],
            changed.body().len().to_string().as_str()
        );
    }

    #[test]
    fn none_means_no_change() {
        let filter = filter_request_as_json(|_spec: ServiceSpec| None);
        assert!(filter(&create_request(b"{\"Name\":\"web\"}")).unwrap().is_none());
    }

    #[test]
    fn bad_json_is_critical() {
        let filter = filter_request_as_json(|spec: ServiceSpec| Some(spec));
        let failure = filter(&create_request(b"not json")).unwrap_err();

        assert!(failure.is_critical());
        assert_eq!(failure.category(), JSON_CATEGORY);
    }

    #[test]
    fn response_body_is_replaced() {
        let filter = filter_response_as_json(|mut spec: ServiceSpec| {
            spec.labels.clear();
            Some(spec)
        });

        let mut response = Response::new(Bytes::from_static(
            b"{\"Name\":\"web\",\"Labels\":{\"internal\":\"1\"}}",
        ));
        response
            .headers_mut()
            .insert("api-version", HeaderValue::from_static("1.41"));
        let head = RequestHead::from(&create_request(b""));

        let changed = filter(&head, &response).unwrap().unwrap();
        assert_eq!(changed.status(), StatusCode::OK);
        assert_eq!(changed.headers()["api-version"], "1.41");
        assert_eq!(changed.body().as_ref(), b"{\"Name\":\"web\",\"Labels\":{}}");
        assert_eq!(changed.headers()[CONTENT_LENGTH], "26");
    }
}
