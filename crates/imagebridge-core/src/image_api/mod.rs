//! Image generation API client.
//!
//! The [`ImageBackend`] trait is the seam between the tool handler and the
//! upstream service; [`CurlBackend`] is the libcurl implementation. Errors are
//! kept structured ([`ApiError`]) so [`classify`] can sort them into retryable
//! and fatal for the retry core.

mod backend;
mod classify;
mod error;
mod types;

pub use backend::{CurlBackend, ImageBackend, GENERATE_PATH};
pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::{ApiError, BODY_EXCERPT_CHARS};
pub use types::{GenerateRequest, GenerateResponse, GeneratedImage};
