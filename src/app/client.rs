//! Probe transport construction
//!
//! This module builds the shared `reqwest::Client` used by all HTTP probes,
//! translating the sweep configuration's transport knobs (proxy, HTTP/2,
//! multiplexing) into client-builder settings.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SweepConfig;
use crate::constants::http;
use crate::errors::{ConfigError, ConfigResult};

/// Transport configuration for the probe HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeClientConfig {
    /// Negotiate HTTP/2 with adaptive flow control
    pub http2: bool,
    /// Keep upstream connections alive for reuse between probes
    pub multiplexing: bool,
    /// Outbound proxy URL; `None` connects directly
    pub proxy_url: Option<String>,
    /// Outer bound on any single request
    pub request_timeout: Duration,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
}

impl Default for ProbeClientConfig {
    fn default() -> Self {
        Self {
            http2: true,
            multiplexing: true,
            proxy_url: None,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_idle_timeout: http::POOL_IDLE_TIMEOUT,
            pool_max_per_host: http::POOL_MAX_PER_HOST,
        }
    }
}

impl From<&SweepConfig> for ProbeClientConfig {
    fn from(config: &SweepConfig) -> Self {
        Self {
            http2: config.enable_http2,
            multiplexing: config.enable_multiplexing,
            proxy_url: if config.proxy_url.is_empty() {
                None
            } else {
                Some(config.proxy_url.clone())
            },
            ..Default::default()
        }
    }
}

impl ProbeClientConfig {
    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> ConfigResult<Client> {
        let mut builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(http::USER_AGENT)
            .pool_idle_timeout(self.pool_idle_timeout);

        // Multiplexing off means every probe gets a fresh connection
        builder = if self.multiplexing {
            builder.pool_max_idle_per_host(self.pool_max_per_host)
        } else {
            builder.pool_max_idle_per_host(0)
        };

        if self.http2 {
            builder = builder
                .http2_adaptive_window(true)
                .http2_keep_alive_interval(Some(http::HTTP2_KEEP_ALIVE_INTERVAL))
                .http2_keep_alive_timeout(http::HTTP2_KEEP_ALIVE_TIMEOUT);
        }

        if let Some(proxy_url) = &self.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| ConfigError::InvalidValue {
                field: "proxy_url",
                value: proxy_url.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(|e| ConfigError::InvalidValue {
            field: "client",
            value: String::new(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ProbeClientConfig::default();
        assert!(config.http2);
        assert!(config.multiplexing);
        assert!(config.proxy_url.is_none());
    }

    #[test]
    fn test_client_builds_with_defaults() {
        let config = ProbeClientConfig::default();
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_client_builds_without_multiplexing() {
        let config = ProbeClientConfig {
            multiplexing: false,
            http2: false,
            ..Default::default()
        };
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let config = ProbeClientConfig {
            proxy_url: Some("::not-a-proxy::".to_string()),
            ..Default::default()
        };
        assert!(config.build_http_client().is_err());
    }

    #[test]
    fn test_from_sweep_config() {
        let sweep = SweepConfig {
            enable_http2: false,
            enable_multiplexing: false,
            proxy_url: "http://127.0.0.1:8888".to_string(),
            ..Default::default()
        };

        let config = ProbeClientConfig::from(&sweep);
        assert!(!config.http2);
        assert!(!config.multiplexing);
        assert_eq!(config.proxy_url.as_deref(), Some("http://127.0.0.1:8888"));
    }
}
