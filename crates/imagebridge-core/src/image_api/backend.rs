//! Blocking image API backends.
//!
//! Uses the curl crate (libcurl). Calls run on the current thread; the tool
//! handler drives them from `spawn_blocking`.

use curl::easy::{Easy, Form, List};
use std::time::Duration;
use url::Url;

use super::error::ApiError;
use super::types::{GenerateRequest, GenerateResponse};
use crate::config::BridgeConfig;

/// Path of the generate endpoint, relative to the API base URL.
pub const GENERATE_PATH: &str = "v1/ideogram-v3/generate";

/// Upstream image service, one call per method. Implementations must be
/// safe to call again after a failure.
pub trait ImageBackend: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError>;
    fn download(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct CurlBackend {
    endpoint: Url,
    api_key: Option<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl CurlBackend {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(GENERATE_PATH)
            .map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            endpoint,
            api_key,
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(120),
        })
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    pub fn from_config(cfg: &BridgeConfig) -> Result<Self, ApiError> {
        Ok(Self::new(&cfg.api_base_url, cfg.resolved_api_key())?.with_timeouts(
            Duration::from_secs(cfg.connect_timeout_secs),
            Duration::from_secs(cfg.request_timeout_secs),
        ))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn easy(&self, url: &str) -> Result<Easy, ApiError> {
        let mut easy = Easy::new();
        easy.url(url)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.request_timeout)?;
        Ok(easy)
    }
}

/// Run the transfer and collect status and body.
fn perform(easy: &mut Easy) -> Result<(u32, Vec<u8>), ApiError> {
    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let code = easy.response_code()?;
    Ok((code, body))
}

impl ImageBackend for CurlBackend {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        let api_key = self.api_key.as_deref().ok_or(ApiError::MissingApiKey)?;

        let mut easy = self.easy(self.endpoint.as_str())?;
        let mut headers = List::new();
        headers.append(&format!("Api-Key: {}", api_key.trim()))?;
        headers.append("Accept: application/json")?;
        // No 100-continue round trip for small multipart bodies.
        headers.append("Expect:")?;
        easy.http_headers(headers)?;

        let mut form = Form::new();
        for (name, value) in request.form_fields() {
            form.part(name).contents(value.as_bytes()).add()?;
        }
        easy.httppost(form)?;

        tracing::debug!(endpoint = %self.endpoint, num_images = request.num_images, "POST generate");
        let (status, body) = perform(&mut easy)?;
        if !(200..300).contains(&status) {
            return Err(ApiError::http(status, &body));
        }
        serde_json::from_slice(&body).map_err(ApiError::Decode)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        Url::parse(url).map_err(|e| ApiError::InvalidUrl(format!("{url}: {e}")))?;
        let mut easy = self.easy(url)?;
        easy.follow_location(true)?;

        tracing::debug!(url, "GET image");
        let (status, body) = perform(&mut easy)?;
        if !(200..300).contains(&status) {
            return Err(ApiError::http(status, &body));
        }
        Ok(body)
    }
}
