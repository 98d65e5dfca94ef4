//! Severity-tagged filter failures.
//!
//! A filter reports trouble with a [`FilterFailure`]. The severity decides what
//! happens to the connection:
//! - `Critical`: a 503 is written to the client and both sockets are closed.
//! - `Soft`: logged as a warning, the filter's effect is discarded and the
//!   message it received is forwarded as is.

use std::error::Error;
use std::fmt;

/// Boxed cause carried by a failure.
pub type Cause = Box<dyn Error + Send + Sync + 'static>;

/// How bad a filter failure is for the connection it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal to the connection pair.
    Critical,
    /// Logged and otherwise ignored.
    Soft,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Soft => write!(f, "soft"),
        }
    }
}

/// A failure raised by (or on behalf of) a request or response filter.
#[derive(Debug)]
pub struct FilterFailure {
    severity: Severity,
    category: String,
    cause: Cause,
}

impl FilterFailure {
    /// Create a failure that tears the connection down.
    pub fn critical(cause: impl Into<Cause>, category: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            category: category.into(),
            cause: cause.into(),
        }
    }

    /// Create a failure that is only logged.
    pub fn soft(cause: impl Into<Cause>, category: impl Into<String>) -> Self {
        Self {
            severity: Severity::Soft,
            category: category.into(),
            cause: cause.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// Category label, e.g. `"JSON"` or `"RequestFilter"`. May be empty.
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

impl fmt::Display for FilterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", self.cause)
        } else {
            write!(f, "{}: {}", self.category, self.cause)
        }
    }
}

impl Error for FilterFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}
