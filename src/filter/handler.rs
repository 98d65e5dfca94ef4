//! Handler registry entries.
//!
//! # Responsibilities
//! - Bind a path pattern to a request filter or a response filter
//! - Match request paths with regex search semantics
//!
//! # Design Decisions
//! - Patterns are not anchored; callers anchor them with `^`/`$` when needed
//! - One filter per handler; several handlers may match the same path
//! - Handlers run in registration order, each seeing the previous one's output

use bytes::Bytes;
use http::{Request, Response};
use regex::Regex;

use crate::filter::{FilterResult, RequestFilter, ResponseFilter};
use crate::http::RequestHead;

pub struct Handler {
    pattern: Regex,
    request: Option<RequestFilter>,
    response: Option<ResponseFilter>,
}

impl Handler {
    /// A handler that only rewrites requests whose path matches `pattern`.
    pub fn requests<F>(pattern: &str, filter: F) -> Result<Self, regex::Error>
    where
        F: Fn(&Request<Bytes>) -> FilterResult<Request<Bytes>> + Send + Sync + 'static,
    {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            request: Some(Box::new(filter)),
            response: None,
        })
    }

    /// A handler that only rewrites responses to requests whose path matches `pattern`.
    pub fn responses<F>(pattern: &str, filter: F) -> Result<Self, regex::Error>
    where
        F: Fn(&RequestHead, &Response<Bytes>) -> FilterResult<Response<Bytes>> + Send + Sync + 'static,
    {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            request: None,
            response: Some(Box::new(filter)),
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn request_filter(&self) -> Option<&RequestFilter> {
        self.request.as_ref()
    }

    pub fn response_filter(&self) -> Option<&ResponseFilter> {
        self.response.as_ref()
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("pattern", &self.pattern.as_str())
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}
