//! Upstream call error type for retry classification.

use thiserror::Error;

/// Error from one call to the image API (generate or download).
/// Kept structured so the retry classifier can inspect it before it becomes a message.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Building the multipart body failed.
    #[error("form: {0}")]
    Form(#[from] curl::FormError),
    /// HTTP response had a non-2xx status. `body` is a truncated excerpt.
    #[error("{}", http_message(.status, .body))]
    Http { status: u32, body: String },
    /// 2xx response whose body was not the expected JSON.
    #[error("unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),
    /// No API key configured.
    #[error(
        "no API key configured (set {} or api_key in config.toml)",
        crate::config::API_KEY_ENV
    )]
    MissingApiKey,
    /// Base URL or image URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// The blocking worker running the request panicked or was aborted.
    #[error("request worker failed: {0}")]
    Worker(String),
}

/// Max characters of an error body kept in `ApiError::Http`.
pub const BODY_EXCERPT_CHARS: usize = 512;

impl ApiError {
    pub fn http(status: u32, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body)
            .chars()
            .take(BODY_EXCERPT_CHARS)
            .collect();
        ApiError::Http { status, body }
    }
}

fn http_message(status: &u32, body: &str) -> String {
    match body.trim() {
        "" => format!("HTTP {status}"),
        excerpt => format!("HTTP {status}: {excerpt}"),
    }
}
