use thiserror::Error;

/// Transport-classified failures from the exchange adapter.
///
/// This layer never interprets business rules: an HTTP error carries the raw
/// status and Binance error code through unchanged, and it is the engine's
/// normalizer that decides what the failure means for the caller.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Exchange returned HTTP {status} (code {code}): {msg}")]
    Http { status: u16, code: i64, msg: String },

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),
}
