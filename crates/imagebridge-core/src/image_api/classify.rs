//! Classify HTTP status and curl errors into retryable or fatal.

use super::error::ApiError;
use crate::retry::ErrorClass;

/// Classify an HTTP status code for retry decisions.
///
/// 408 and 429 are transient; 5xx is transient except 501 and 505, which a
/// retry can't fix. Everything else (auth, validation, not found) is fatal.
pub fn classify_http_status(code: u32) -> ErrorClass {
    match code {
        408 | 429 => ErrorClass::Retryable,
        501 | 505 => ErrorClass::Fatal,
        500..=599 => ErrorClass::Retryable,
        _ => ErrorClass::Fatal,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorClass {
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorClass::Retryable;
    }
    ErrorClass::Fatal
}

/// Classify an upstream error. This is the classifier the tool handler's policy uses.
pub fn classify(e: &ApiError) -> ErrorClass {
    match e {
        ApiError::Curl(ce) => classify_curl_error(ce),
        ApiError::Http { status, .. } => classify_http_status(*status),
        ApiError::Form(_)
        | ApiError::Decode(_)
        | ApiError::MissingApiKey
        | ApiError::InvalidUrl(_)
        | ApiError::Worker(_) => ErrorClass::Fatal,
    }
}
