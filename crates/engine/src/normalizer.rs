//! Maps adapter failures and exchange error codes into the single
//! [`TradeError`] taxonomy.
//!
//! The adapter reports only transport facts (timeout, HTTP status, raw
//! Binance code); what those facts mean for the caller is decided here and
//! nowhere else.

use crate::error::{ErrorKind, TradeError};
use api_client::error::ApiError;

// Binance futures error codes that need explicit classification.
const CODE_TOO_MANY_REQUESTS: i64 = -1003;
const CODE_INVALID_API_KEY: i64 = -2014;
const CODE_REJECTED_API_KEY: i64 = -2015;
const CODE_INVALID_SIGNATURE: i64 = -1022;
const CODE_UNKNOWN_ORDER: i64 = -2011;
const CODE_NO_SUCH_ORDER: i64 = -2013;

pub fn normalize(err: ApiError) -> TradeError {
    let normalized = match err {
        ApiError::Transport(e) => {
            if e.is_timeout() || e.is_connect() || e.is_request() {
                TradeError::new(ErrorKind::Transient, e.to_string())
            } else {
                TradeError::new(ErrorKind::Unknown, e.to_string())
            }
        }
        ApiError::Http { status, code, msg } => {
            let kind = match code {
                CODE_TOO_MANY_REQUESTS => ErrorKind::RateLimit,
                CODE_INVALID_API_KEY | CODE_REJECTED_API_KEY | CODE_INVALID_SIGNATURE => {
                    ErrorKind::Auth
                }
                CODE_UNKNOWN_ORDER | CODE_NO_SUCH_ORDER => ErrorKind::NotFound,
                _ => match status {
                    429 => ErrorKind::RateLimit,
                    401 | 403 => ErrorKind::Auth,
                    404 => ErrorKind::NotFound,
                    s if s >= 500 => ErrorKind::Transient,
                    s if s >= 400 => ErrorKind::Rejected,
                    _ => ErrorKind::Unknown,
                },
            };
            TradeError::new(kind, format!("exchange error {}: {}", code, msg))
        }
        ApiError::Deserialization(msg) => TradeError::new(ErrorKind::Unknown, msg),
    };

    if normalized.kind == ErrorKind::Unknown {
        tracing::error!(error = %normalized, "Unclassified exchange error.");
    }
    normalized
}
