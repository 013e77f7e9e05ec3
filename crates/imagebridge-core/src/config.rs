use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{ErrorClass, RetryPolicy};

/// Environment variable that overrides `api_key` from the config file.
pub const API_KEY_ENV: &str = "IDEOGRAM_API_KEY";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per upstream call (including the first).
    /// Zero or negative disables the call: every invocation reports a configuration error.
    pub max_attempts: i64,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter ratio in [0, 1].
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter_ratio: 0.1,
        }
    }
}

impl RetryConfig {
    /// Build a policy from these settings and the given classifier.
    pub fn to_policy<E, F>(&self, classifier: F) -> RetryPolicy<E>
    where
        F: Fn(&E) -> ErrorClass + Send + Sync + 'static,
    {
        let attempts = u32::try_from(self.max_attempts.max(0)).unwrap_or(u32::MAX);
        RetryPolicy::new(classifier)
            .with_max_attempts(attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_jitter_ratio(self.jitter_ratio)
    }
}

/// Where generated images go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Download and save images locally; when false the upstream URLs are relayed as-is.
    pub save_locally: bool,
    /// Output directory; defaults to `$XDG_DATA_HOME/imagebridge/images`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_locally: true,
            output_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn resolve_output_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("imagebridge")?;
        Ok(xdg_dirs.get_data_home().join("images"))
    }
}

/// Global configuration loaded from `~/.config/imagebridge/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the image API.
    pub api_base_url: String,
    /// API key; `IDEOGRAM_API_KEY` takes precedence when set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Connect timeout for upstream requests, in seconds.
    pub connect_timeout_secs: u64,
    /// Total timeout for one upstream request, in seconds.
    pub request_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.ideogram.ai".to_string(),
            api_key: None,
            connect_timeout_secs: 15,
            request_timeout_secs: 120,
            retry: None,
            storage: StorageConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// API key from the environment, else from the file. Empty values count as unset.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("imagebridge")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BridgeConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<BridgeConfig> {
    if !path.exists() {
        let default_cfg = BridgeConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BridgeConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.api_base_url, "https://api.ideogram.ai");
        assert_eq!(cfg.connect_timeout_secs, 15);
        assert!(cfg.retry.is_none());
        assert!(cfg.storage.save_locally);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = BridgeConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: BridgeConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.api_base_url, cfg.api_base_url);
        assert_eq!(parsed.request_timeout_secs, cfg.request_timeout_secs);
    }

    #[test]
    fn config_toml_retry_and_storage() {
        let toml = r#"
            api_base_url = "http://127.0.0.1:9000"
            connect_timeout_secs = 5
            request_timeout_secs = 30

            [retry]
            max_attempts = 4
            base_delay_ms = 250
            max_delay_ms = 2000
            jitter_ratio = 0.0

            [storage]
            save_locally = false
            output_dir = "/tmp/images"
        "#;
        let cfg: BridgeConfig = toml::from_str(toml).unwrap();
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 4);
        assert!(!cfg.storage.save_locally);
        assert_eq!(
            cfg.storage.resolve_output_dir().unwrap(),
            PathBuf::from("/tmp/images")
        );

        let policy = retry.to_policy(|_: &()| ErrorClass::Retryable);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_millis(2000));
    }

    #[test]
    fn negative_attempts_map_to_invalid_policy() {
        let retry = RetryConfig {
            max_attempts: -2,
            ..RetryConfig::default()
        };
        let policy = retry.to_policy(|_: &()| ErrorClass::Retryable);
        assert_eq!(policy.max_attempts, 0);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn load_or_init_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.api_base_url, BridgeConfig::default().api_base_url);
        let again = load_or_init_at(&path).unwrap();
        assert_eq!(again.request_timeout_secs, cfg.request_timeout_secs);
    }
}
