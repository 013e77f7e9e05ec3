//! Tool-call dispatch: validate, call upstream through the retry core, store, respond.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::args::GenerateArgs;
use super::definition::TOOL_NAME;
use super::response::ToolResponse;
use crate::config::BridgeConfig;
use crate::image_api::{self, ApiError, CurlBackend, GeneratedImage, ImageBackend};
use crate::retry::{
    run_with_retry, AttemptSink, FanoutSink, InvocationError, InvocationResult, RetryPolicy,
    TracingSink,
};
use crate::storage::ImageStore;

/// An incoming tool call: `{"name": ..., "arguments": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Per-image line of the result.
#[derive(Debug, Clone, Serialize)]
struct ImageEntry {
    index: usize,
    url: Option<String>,
    path: Option<PathBuf>,
    sha256: Option<String>,
    resolution: Option<String>,
    seed: Option<u64>,
    error: Option<String>,
}

impl ImageEntry {
    fn from_generated(index: usize, img: &GeneratedImage) -> Self {
        Self {
            index,
            url: img.url.clone(),
            path: None,
            sha256: None,
            resolution: img.resolution.clone(),
            seed: img.seed,
            error: None,
        }
    }

    fn line(&self) -> String {
        let location = match (&self.path, &self.url) {
            (Some(p), _) => p.display().to_string(),
            (None, Some(u)) => u.clone(),
            (None, None) => "unavailable".to_string(),
        };
        let mut details = Vec::new();
        if let Some(r) = &self.resolution {
            details.push(r.clone());
        }
        if let Some(s) = self.seed {
            details.push(format!("seed {s}"));
        }
        let mut line = format!("{}. {}", self.index, location);
        if !details.is_empty() {
            line.push_str(&format!(" ({})", details.join(", ")));
        }
        if let Some(e) = &self.error {
            line.push_str(&format!(" [{e}]"));
        }
        line
    }
}

/// User-facing message for each failure kind of the retry core.
pub fn failure_message(what: &str, err: &InvocationError<ApiError>) -> String {
    match err {
        InvocationError::Configuration(e) => format!("Image service is misconfigured: {e}"),
        InvocationError::Fatal { error, .. } => format!("Image {what} request was rejected: {error}"),
        InvocationError::Exhausted { error, attempts } => format!(
            "Image service unavailable after {attempts} attempt(s); last error: {error}"
        ),
        InvocationError::Cancelled { attempts, .. } => {
            format!("Image {what} was cancelled after {attempts} attempt(s)")
        }
    }
}

pub struct ToolHandler {
    backend: Arc<dyn ImageBackend>,
    policy: RetryPolicy<ApiError>,
    store: Option<ImageStore>,
    extra_sink: Option<Arc<dyn AttemptSink>>,
}

impl ToolHandler {
    pub fn new(backend: Arc<dyn ImageBackend>, policy: RetryPolicy<ApiError>) -> Self {
        Self {
            backend,
            policy,
            store: None,
            extra_sink: None,
        }
    }

    /// Save downloaded images to `store`; without one, upstream URLs are relayed.
    pub fn with_store(mut self, store: ImageStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Also report attempts to `sink` (in addition to tracing).
    pub fn with_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.extra_sink = Some(sink);
        self
    }

    /// Handler wired to the curl backend, the configured retry policy and storage.
    pub fn from_config(cfg: &BridgeConfig) -> Result<Self> {
        let backend = CurlBackend::from_config(cfg).context("configure image API client")?;
        if cfg.resolved_api_key().is_none() {
            tracing::warn!("no API key configured; generate calls will be rejected");
        }
        let policy = cfg.retry_or_default().to_policy(image_api::classify);
        let mut handler = Self::new(Arc::new(backend), policy);
        if cfg.storage.save_locally {
            handler = handler.with_store(ImageStore::new(cfg.storage.resolve_output_dir()?));
        }
        Ok(handler)
    }

    /// Run one upstream call on the blocking pool under the retry policy.
    async fn call_with_retry<T, F>(
        &self,
        op: &'static str,
        cancel: &CancellationToken,
        f: F,
    ) -> InvocationResult<T, ApiError>
    where
        T: Send + 'static,
        F: Fn(&dyn ImageBackend) -> Result<T, ApiError> + Clone + Send + 'static,
    {
        let tracing_sink = TracingSink::new(op);
        let mut sinks: Vec<&dyn AttemptSink> = vec![&tracing_sink];
        if let Some(extra) = &self.extra_sink {
            sinks.push(extra.as_ref());
        }
        let sink = FanoutSink::new(sinks);

        run_with_retry(&self.policy, &sink, cancel, || {
            let backend = Arc::clone(&self.backend);
            let f = f.clone();
            async move {
                tokio::task::spawn_blocking(move || f(backend.as_ref()))
                    .await
                    .unwrap_or_else(|e| Err(ApiError::Worker(e.to_string())))
            }
        })
        .await
    }

    /// Handle one tool call. Every outcome, including failures, is a [`ToolResponse`].
    pub async fn handle(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResponse {
        if call.name != TOOL_NAME {
            return ToolResponse::error(format!(
                "Unknown tool `{}`; this server provides `{TOOL_NAME}`",
                call.name
            ));
        }
        let args = match GenerateArgs::from_value(call.arguments.clone()) {
            Ok(args) => args,
            Err(e) => return ToolResponse::error(format!("Invalid arguments: {e}")),
        };
        tracing::info!(
            num_images = args.num_images,
            aspect_ratio = %args.aspect_ratio,
            "generate_image called"
        );

        let request = Arc::new(args.to_request());
        let generated = {
            let request = Arc::clone(&request);
            self.call_with_retry("generate", cancel, move |b: &dyn ImageBackend| {
                b.generate(&request)
            })
            .await
        };
        let generated = match generated {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!(kind = ?e.kind(), attempts = e.attempts(), "generate failed: {}", e);
                return ToolResponse::error(failure_message("generation", &e));
            }
        };

        let store = self.store.as_ref().filter(|_| args.save);
        let mut entries = Vec::with_capacity(generated.value.data.len());
        let mut withheld = 0usize;
        for (i, img) in generated.value.data.iter().enumerate() {
            let mut entry = ImageEntry::from_generated(i + 1, img);
            let url = match (&img.url, img.is_image_safe) {
                (_, false) => {
                    entry.error = Some("withheld by the upstream safety filter".to_string());
                    withheld += 1;
                    entries.push(entry);
                    continue;
                }
                (None, true) => {
                    entry.error = Some("no URL returned".to_string());
                    entries.push(entry);
                    continue;
                }
                (Some(url), true) => url.clone(),
            };

            if let Some(store) = store {
                let downloaded = {
                    let url = url.clone();
                    self.call_with_retry("download", cancel, move |b: &dyn ImageBackend| {
                        b.download(&url)
                    })
                    .await
                };
                match downloaded {
                    Ok(done) => match save_blocking(store, done.value).await {
                        Ok(stored) => {
                            entry.path = Some(stored.path);
                            entry.sha256 = Some(stored.sha256);
                        }
                        Err(e) => {
                            tracing::warn!("storing image {} failed: {:#}", i + 1, e);
                            entry.error = Some(format!("not saved: {e:#}"));
                        }
                    },
                    Err(e @ InvocationError::Cancelled { .. }) => {
                        return ToolResponse::error(failure_message("download", &e));
                    }
                    Err(e) => {
                        tracing::warn!("downloading image {} failed: {}", i + 1, e);
                        entry.error = Some(failure_message("download", &e));
                    }
                }
            }
            entries.push(entry);
        }

        let delivered = entries.iter().filter(|e| e.error.is_none()).count();
        let mut text = if delivered == entries.len() {
            format!("Generated {delivered} image(s)")
        } else {
            format!("Generated {delivered} of {} image(s)", entries.len())
        };
        text.push_str(&format!(" in {} attempt(s)", generated.attempts));
        if withheld > 0 {
            text.push_str(&format!("; {withheld} withheld by the safety filter"));
        }
        text.push('.');
        for e in &entries {
            text.push('\n');
            text.push_str(&e.line());
        }
        let structured = json!({
            "created": generated.value.created,
            "attempts": generated.attempts,
            "delivered": delivered,
            "withheld": withheld,
            "images": entries,
        });
        ToolResponse::success(text, structured)
    }
}

async fn save_blocking(store: &ImageStore, data: Vec<u8>) -> Result<crate::storage::StoredImage> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || store.save(&data))
        .await
        .context("storage worker failed")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_api::{GenerateRequest, GenerateResponse};
    use crate::retry::{AttemptOutcome, MemorySink};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nimage";

    #[derive(Default)]
    struct FakeBackend {
        generate_script: Mutex<VecDeque<Result<GenerateResponse, ApiError>>>,
        generate_calls: AtomicU32,
        download_calls: AtomicU32,
    }

    impl FakeBackend {
        fn scripted(script: Vec<Result<GenerateResponse, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                generate_script: Mutex::new(script.into()),
                ..Default::default()
            })
        }
    }

    fn one_image() -> GenerateResponse {
        GenerateResponse {
            created: Some("2025-01-01T00:00:00Z".into()),
            data: vec![GeneratedImage {
                url: Some("https://img.example/1.png".into()),
                prompt: Some("a fox".into()),
                resolution: Some("1024x1024".into()),
                is_image_safe: true,
                seed: Some(5),
                style_type: None,
            }],
        }
    }

    impl ImageBackend for FakeBackend {
        fn generate(&self, _request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.generate_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(one_image()))
        }

        fn download(&self, _url: &str) -> Result<Vec<u8>, ApiError> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PNG.to_vec())
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy<ApiError> {
        RetryPolicy::new(image_api::classify)
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_jitter_ratio(0.0)
    }

    fn call(args: Value) -> ToolCall {
        ToolCall {
            name: TOOL_NAME.to_string(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected_without_upstream_call() {
        let backend = FakeBackend::scripted(vec![]);
        let handler = ToolHandler::new(backend.clone(), policy(3));
        let resp = handler
            .handle(
                &ToolCall {
                    name: "edit_image".into(),
                    arguments: json!({}),
                },
                &CancellationToken::new(),
            )
            .await;
        assert!(resp.is_error);
        assert!(resp.text().unwrap().contains("Unknown tool"));
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_upstream() {
        let backend = FakeBackend::scripted(vec![]);
        let handler = ToolHandler::new(backend.clone(), policy(3));
        let resp = handler
            .handle(&call(json!({"prompt": ""})), &CancellationToken::new())
            .await;
        assert!(resp.is_error);
        assert!(resp.text().unwrap().starts_with("Invalid arguments"));
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transient_failures_then_success_stores_image() {
        let backend = FakeBackend::scripted(vec![
            Err(ApiError::http(503, b"")),
            Err(ApiError::http(429, b"slow down")),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let handler = ToolHandler::new(backend.clone(), policy(3))
            .with_store(ImageStore::new(dir.path()))
            .with_sink(sink.clone());

        let resp = handler
            .handle(&call(json!({"prompt": "a fox"})), &CancellationToken::new())
            .await;

        assert!(!resp.is_error, "{:?}", resp.text());
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 3);
        assert_eq!(backend.download_calls.load(Ordering::SeqCst), 1);
        let structured = resp.structured_content.unwrap();
        assert_eq!(structured["attempts"], 3);
        let path = structured["images"][0]["path"].as_str().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), PNG);

        let outcomes: Vec<AttemptOutcome> = sink.events().iter().map(|e| e.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::RetryableFailure,
                AttemptOutcome::RetryableFailure,
                AttemptOutcome::Success,
                AttemptOutcome::Success,
            ]
        );
    }

    #[tokio::test]
    async fn rejected_request_is_fatal_and_not_retried() {
        let backend = FakeBackend::scripted(vec![Err(ApiError::http(401, b"invalid api key"))]);
        let handler = ToolHandler::new(backend.clone(), policy(5));
        let resp = handler
            .handle(&call(json!({"prompt": "a fox"})), &CancellationToken::new())
            .await;
        assert!(resp.is_error);
        let text = resp.text().unwrap();
        assert!(text.contains("rejected"), "{text}");
        assert!(text.contains("HTTP 401"), "{text}");
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_reports_attempts_and_last_error() {
        let backend = FakeBackend::scripted(vec![
            Err(ApiError::http(500, b"")),
            Err(ApiError::http(502, b"bad gateway")),
        ]);
        let handler = ToolHandler::new(backend.clone(), policy(2));
        let resp = handler
            .handle(&call(json!({"prompt": "a fox"})), &CancellationToken::new())
            .await;
        assert!(resp.is_error);
        let text = resp.text().unwrap();
        assert!(text.contains("unavailable after 2 attempt(s)"), "{text}");
        assert!(text.contains("HTTP 502"), "{text}");
    }

    #[tokio::test]
    async fn invalid_policy_is_a_configuration_error() {
        let backend = FakeBackend::scripted(vec![]);
        let handler = ToolHandler::new(backend.clone(), policy(0));
        let resp = handler
            .handle(&call(json!({"prompt": "a fox"})), &CancellationToken::new())
            .await;
        assert!(resp.is_error);
        assert!(resp.text().unwrap().contains("misconfigured"));
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_call_reports_cancellation() {
        let backend = FakeBackend::scripted(vec![]);
        let handler = ToolHandler::new(backend.clone(), policy(3));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let resp = handler.handle(&call(json!({"prompt": "a fox"})), &cancel).await;
        assert!(resp.is_error);
        assert!(resp.text().unwrap().contains("cancelled"));
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn save_false_relays_urls() {
        let backend = FakeBackend::scripted(vec![]);
        let dir = tempfile::tempdir().unwrap();
        let handler =
            ToolHandler::new(backend.clone(), policy(3)).with_store(ImageStore::new(dir.path()));
        let resp = handler
            .handle(
                &call(json!({"prompt": "a fox", "save": false})),
                &CancellationToken::new(),
            )
            .await;
        assert!(!resp.is_error);
        assert_eq!(backend.download_calls.load(Ordering::SeqCst), 0);
        assert!(resp.text().unwrap().contains("https://img.example/1.png"));
    }

    #[tokio::test]
    async fn storage_failure_is_reported_per_image() {
        let backend = FakeBackend::scripted(vec![]);
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the image directory should be.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let handler =
            ToolHandler::new(backend.clone(), policy(3)).with_store(ImageStore::new(&blocker));

        let resp = handler
            .handle(&call(json!({"prompt": "a fox"})), &CancellationToken::new())
            .await;

        assert!(!resp.is_error);
        let image = &resp.structured_content.unwrap()["images"][0];
        assert!(image["path"].is_null());
        assert!(image["error"].as_str().unwrap().starts_with("not saved"));
        assert_eq!(image["url"], "https://img.example/1.png");
    }

    #[tokio::test]
    async fn unsafe_images_are_withheld() {
        let mut resp = one_image();
        resp.data[0].is_image_safe = false;
        resp.data[0].url = None;
        let backend = FakeBackend::scripted(vec![Ok(resp)]);
        let dir = tempfile::tempdir().unwrap();
        let handler =
            ToolHandler::new(backend.clone(), policy(3)).with_store(ImageStore::new(dir.path()));
        let out = handler
            .handle(&call(json!({"prompt": "a fox"})), &CancellationToken::new())
            .await;
        assert!(!out.is_error);
        assert!(out.text().unwrap().contains("safety filter"));
        assert_eq!(backend.download_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn summary_counts_only_delivered_images() {
        let mut resp = one_image();
        let mut hidden = resp.data[0].clone();
        hidden.is_image_safe = false;
        hidden.url = None;
        let mut missing = resp.data[0].clone();
        missing.url = None;
        resp.data.push(hidden);
        resp.data.push(missing);
        let backend = FakeBackend::scripted(vec![Ok(resp)]);
        let handler = ToolHandler::new(backend.clone(), policy(3));

        let out = handler
            .handle(&call(json!({"prompt": "a fox"})), &CancellationToken::new())
            .await;

        assert!(!out.is_error);
        let text = out.text().unwrap();
        assert!(
            text.starts_with(
                "Generated 1 of 3 image(s) in 1 attempt(s); 1 withheld by the safety filter."
            ),
            "{text}"
        );
        let structured = out.structured_content.unwrap();
        assert_eq!(structured["delivered"], 1);
        assert_eq!(structured["withheld"], 1);
        assert_eq!(structured["images"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn summary_without_losses_is_plain() {
        let backend = FakeBackend::scripted(vec![]);
        let handler = ToolHandler::new(backend.clone(), policy(3));
        let out = handler
            .handle(&call(json!({"prompt": "a fox"})), &CancellationToken::new())
            .await;
        assert!(out
            .text()
            .unwrap()
            .starts_with("Generated 1 image(s) in 1 attempt(s)."));
    }

    #[test]
    fn failure_messages_are_distinct() {
        let msgs = [
            failure_message("generation", &InvocationError::Configuration(crate::retry::PolicyError::NoAttempts)),
            failure_message(
                "generation",
                &InvocationError::Fatal {
                    error: ApiError::MissingApiKey,
                    attempts: 1,
                },
            ),
            failure_message(
                "generation",
                &InvocationError::Exhausted {
                    error: ApiError::http(503, b""),
                    attempts: 3,
                },
            ),
            failure_message(
                "generation",
                &InvocationError::Cancelled {
                    attempts: 2,
                    last_error: None,
                },
            ),
        ];
        for (i, a) in msgs.iter().enumerate() {
            for b in msgs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(msgs[2].contains("3 attempt(s)"));
    }
}
