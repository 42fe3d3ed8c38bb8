//! HTTP probe for the built-in channel kinds
//!
//! Issues the cheapest authenticated request each provider accepts and
//! classifies the response status. Request shapes follow the providers'
//! public APIs; the prompt is a single token to keep quota cost negligible.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ChannelProbe, ProbeVerdict};
use crate::app::models::{ChannelKind, Credential, CredentialGroup};
use crate::constants::channels;
use crate::errors::{ProbeError, ProbeResult};

/// Probe implementation for HTTP-based providers
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Create a probe over a shared HTTP client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build the provider-specific request, or `None` for kinds this probe
    /// does not understand
    fn build_request(
        &self,
        credential: &Credential,
        group: &CredentialGroup,
    ) -> Option<RequestBuilder> {
        match &group.channel_kind {
            ChannelKind::Openai => {
                let url = group.probe_url(channels::OPENAI_DEFAULT_URL);
                let body = json!({
                    "model": channels::OPENAI_PROBE_MODEL,
                    "messages": [{"role": "user", "content": channels::PROBE_PROMPT}],
                    "max_tokens": 1,
                });
                Some(
                    self.client
                        .post(url)
                        .header("Authorization", format!("Bearer {}", credential.secret))
                        .json(&body),
                )
            }
            ChannelKind::Gemini => {
                let url = group.probe_url(channels::GEMINI_DEFAULT_URL);
                let body = json!({
                    "contents": [{"parts": [{"text": channels::PROBE_PROMPT}]}],
                });
                Some(
                    self.client
                        .post(url)
                        .header(channels::GEMINI_KEY_HEADER, &credential.secret)
                        .json(&body),
                )
            }
            ChannelKind::Other(_) => None,
        }
    }
}

/// Map a response status onto a verdict
fn classify_status(status: StatusCode, latency: Duration) -> ProbeVerdict {
    match status.as_u16() {
        200 => ProbeVerdict::valid(latency),
        401 | 403 => ProbeVerdict::invalid(latency, "unauthorized"),
        429 => ProbeVerdict::invalid(latency, "rate_limited"),
        code => ProbeVerdict::invalid(latency, format!("http {code}")),
    }
}

#[async_trait]
impl ChannelProbe for HttpProbe {
    async fn probe(
        &self,
        cancel: &CancellationToken,
        credential: &Credential,
        group: &CredentialGroup,
    ) -> ProbeResult<ProbeVerdict> {
        let Some(request) = self.build_request(credential, group) else {
            // No network call for kinds we cannot shape a request for
            return Ok(ProbeVerdict::invalid(
                Duration::ZERO,
                "unsupported channel kind",
            ));
        };

        let started = Instant::now();

        // Dropping the send future aborts the in-flight request
        let response = tokio::select! {
            result = request.send() => result.map_err(ProbeError::from)?,
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
        };

        let latency = started.elapsed();
        let verdict = classify_status(response.status(), latency);
        debug!(
            key_id = credential.id,
            status = response.status().as_u16(),
            latency_ms = latency.as_millis() as u64,
            valid = verdict.valid,
            "probe classified"
        );
        Ok(verdict)
    }
}
