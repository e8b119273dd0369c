use serde::Serialize;
use std::fmt;
use thiserror::Error;
use validator::ValidationError;

/// The single error taxonomy every caller branches on.
///
/// Downstream consumers must only inspect `kind`, never exchange-specific
/// codes, so the exchange-facing adapter can be swapped without touching
/// calling code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Local field-level refusal; never reached the exchange.
    Validation,
    /// Bad or expired credentials. Fatal to the session, not retried.
    Auth,
    /// Exchange rate-limit signal. Retried with backoff, bounded attempts.
    RateLimit,
    /// Business-rule refusal from the exchange. Surfaced immediately.
    Rejected,
    /// Network, timeout, or 5xx failure. Retried with backoff, bounded attempts.
    Transient,
    /// The referenced entity no longer exists upstream.
    NotFound,
    /// Anything unclassified. Surfaced as-is and logged for investigation.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Transient => "transient",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TradeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TradeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimit | ErrorKind::Transient)
    }
}

impl From<ValidationError> for TradeError {
    fn from(err: ValidationError) -> Self {
        TradeError::new(ErrorKind::Validation, err.to_string())
    }
}
