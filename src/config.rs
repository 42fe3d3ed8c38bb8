//! Sweep configuration
//!
//! The engine-wide configuration governing concurrency, timeouts, retry
//! behavior, rate limiting, and the probe transport. Callers usually start
//! from [`SweepConfig::default`] and override fields; deployments embedding
//! the engine can load the same shape from a TOML section.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{limits, sweep};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for batch validation sweeps
///
/// All duration-like fields are plain integers so the struct round-trips
/// through TOML and JSON unchanged; accessor methods return [`Duration`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Concurrent probe slots (semaphore width)
    pub concurrency: usize,
    /// Per-attempt timeout in seconds
    pub timeout_seconds: u64,
    /// Probe attempts per credential; 0 still makes one attempt
    pub max_retries: u32,
    /// Base delay for retry backoff in milliseconds
    pub retry_delay_ms: u64,
    /// Outbound probe rate and burst (tokens per second)
    pub rate_limit_per_sec: u32,
    /// Reuse upstream connections across probes
    pub enable_multiplexing: bool,
    /// Outbound HTTP proxy URL; empty disables proxying
    pub proxy_url: String,
    /// Negotiate HTTP/2 with adaptive flow control
    pub enable_http2: bool,
    /// Credential count at which chunked streaming dispatch kicks in
    pub streaming_threshold: usize,
    /// Persist classifications to the credential store; false runs a dry sweep
    pub backup_results: bool,
    /// Cap on any single retry backoff, in seconds
    pub max_retry_backoff_secs: u64,
    /// Add up to 10% random jitter on top of each backoff delay
    pub enable_jitter: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            concurrency: limits::DEFAULT_CONCURRENCY,
            timeout_seconds: limits::DEFAULT_TIMEOUT_SECS,
            max_retries: limits::DEFAULT_MAX_RETRIES,
            retry_delay_ms: limits::DEFAULT_RETRY_DELAY_MS,
            rate_limit_per_sec: limits::DEFAULT_RATE_LIMIT_RPS,
            enable_multiplexing: true,
            proxy_url: String::new(),
            enable_http2: true,
            streaming_threshold: sweep::DEFAULT_STREAMING_THRESHOLD,
            backup_results: true,
            max_retry_backoff_secs: limits::DEFAULT_MAX_BACKOFF_SECS,
            enable_jitter: true,
        }
    }
}

impl SweepConfig {
    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Base retry delay
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Backoff cap
    pub fn max_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.max_retry_backoff_secs)
    }

    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.concurrency == 0 || self.concurrency > limits::MAX_CONCURRENCY {
            return Err(ConfigError::InvalidValue {
                field: "concurrency",
                value: self.concurrency.to_string(),
                reason: format!("must be between 1 and {}", limits::MAX_CONCURRENCY),
            });
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > limits::MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "timeout_seconds",
                value: self.timeout_seconds.to_string(),
                reason: format!("must be between 1 and {}", limits::MAX_TIMEOUT_SECS),
            });
        }

        if self.max_retries > limits::MAX_MAX_RETRIES {
            return Err(ConfigError::InvalidValue {
                field: "max_retries",
                value: self.max_retries.to_string(),
                reason: format!("must be between 0 and {}", limits::MAX_MAX_RETRIES),
            });
        }

        if self.rate_limit_per_sec == 0 || self.rate_limit_per_sec > limits::MAX_RATE_LIMIT_RPS {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit_per_sec",
                value: self.rate_limit_per_sec.to_string(),
                reason: format!("must be between 1 and {}", limits::MAX_RATE_LIMIT_RPS),
            });
        }

        if self.streaming_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "streaming_threshold",
                value: self.streaming_threshold.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.retry_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry_delay_ms",
                value: self.retry_delay_ms.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if !self.proxy_url.is_empty() {
            Url::parse(&self.proxy_url).map_err(|e| ConfigError::InvalidValue {
                field: "proxy_url",
                value: self.proxy_url.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Parse a configuration from a TOML document
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SweepConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults when the file
    /// does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
