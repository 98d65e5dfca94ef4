//! Panic isolation around filter calls.
//!
//! Filters are third-party code. A panic inside one must never take the proxy
//! down; at worst it ends the connection it happened on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use http::{Request, Response};

use crate::filter::{FilterFailure, FilterResult, RequestFilter, ResponseFilter};
use crate::http::RequestHead;

pub const REQUEST_CATEGORY: &str = "RequestFilter";
pub const RESPONSE_CATEGORY: &str = "ResponseFilter";

/// Abort a filter from arbitrarily deep inside it.
///
/// The failure keeps its severity when it reaches the guard, so a filter can
/// raise a soft failure from a helper that has no way to return one.
pub fn raise(failure: FilterFailure) -> ! {
    panic::panic_any(failure)
}

pub fn run_request_filter(
    filter: &RequestFilter,
    request: &Request<Bytes>,
) -> FilterResult<Request<Bytes>> {
    isolate(REQUEST_CATEGORY, || filter(request))
}

pub fn run_response_filter(
    filter: &ResponseFilter,
    request: &RequestHead,
    response: &Response<Bytes>,
) -> FilterResult<Response<Bytes>> {
    isolate(RESPONSE_CATEGORY, || filter(request, response))
}

fn isolate<T>(category: &'static str, call: impl FnOnce() -> FilterResult<T>) -> FilterResult<T> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| Err(classify(payload, category)))
}

fn classify(payload: Box<dyn Any + Send>, category: &'static str) -> FilterFailure {
    let payload = match payload.downcast::<FilterFailure>() {
        Ok(failure) => return *failure,
        Err(payload) => payload,
    };

    let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "filter panicked".to_string()
    };

    tracing::debug!(category, message = %message, "Recovered from filter panic");
    FilterFailure::critical(message, category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Severity;
    use http::Method;

    fn request() -> Request<Bytes> {
        let mut request = Request::new(Bytes::from_static(b"{}"));
        *request.method_mut() = Method::POST;
        request
    }

    #[test]
    fn results_pass_through() {
        let filter: RequestFilter = Box::new(|_req: &Request<Bytes>| -> FilterResult<Request<Bytes>> { Ok(None) });
        assert!(matches!(run_request_filter(&filter, &request()), Ok(None)));

        let filter: RequestFilter = Box::new(|_req: &Request<Bytes>| -> FilterResult<Request<Bytes>> {
            Err(FilterFailure::soft("skipped", "Labels"))
        });
        let failure = run_request_filter(&filter, &request()).unwrap_err();
        assert_eq!(failure.severity(), Severity::Soft);
    }

    #[test]
    fn plain_panic_becomes_critical() {
        let filter: RequestFilter = Box::new(|_req: &Request<Bytes>| -> FilterResult<Request<Bytes>> {
            panic!("index out of bounds")
        });
        let failure = run_request_filter(&filter, &request()).unwrap_err();

        assert!(failure.is_critical());
        assert_eq!(failure.category(), REQUEST_CATEGORY);
        assert_eq!(failure.to_string(), "RequestFilter: index out of bounds");
    }

    #[test]
    fn formatted_panic_keeps_message() {
        let filter: ResponseFilter = Box::new(|_req: &RequestHead, _resp: &Response<Bytes>| -> FilterResult<Response<Bytes>> {
            let field = "Spec";
            panic!("missing {field}")
        });
        let head = RequestHead::from(&request());
        let failure = run_response_filter(&filter, &head, &Response::new(Bytes::new())).unwrap_err();

        assert_eq!(failure.to_string(), "ResponseFilter: missing Spec");
    }

    #[test]
    fn raised_failure_keeps_severity() {
        let filter: RequestFilter = Box::new(|_req: &Request<Bytes>| -> FilterResult<Request<Bytes>> {
            raise(FilterFailure::soft("template not found", "Template"))
        });
        let failure = run_request_filter(&filter, &request()).unwrap_err();

        assert_eq!(failure.severity(), Severity::Soft);
        assert_eq!(failure.category(), "Template");
    }
}
