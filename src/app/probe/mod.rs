//! Per-channel credential probes
//!
//! A probe issues one authenticated request against a credential's upstream
//! provider and classifies the outcome. The seam between "the HTTP layer
//! answered" and "the transport failed" is load-bearing: a response of any
//! status is a final [`ProbeVerdict`], while a transport failure is a
//! [`ProbeError`](crate::errors::ProbeError) the retry wrapper may re-drive.
//!
//! Probes are pluggable per channel kind through [`ProbeRegistry`]; the
//! default registry backs `openai` and `gemini` with [`HttpProbe`].

mod http;

pub use http::HttpProbe;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::models::{ChannelKind, Credential, CredentialGroup};
use crate::errors::ProbeResult;

/// Classified result of a single probe attempt
///
/// Produced whenever the upstream answered at the HTTP layer, including
/// 4xx/5xx responses. Never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeVerdict {
    /// Whether the credential authenticated successfully
    pub valid: bool,
    /// Wall time of the attempt
    pub latency: Duration,
    /// Classification detail; `None` on success
    pub error: Option<String>,
}

impl ProbeVerdict {
    /// A successful classification
    pub fn valid(latency: Duration) -> Self {
        Self {
            valid: true,
            latency,
            error: None,
        }
    }

    /// A failed classification with detail
    pub fn invalid(latency: Duration, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            latency,
            error: Some(error.into()),
        }
    }
}

/// A per-channel credential probe
///
/// Implementations must abort the in-flight request promptly when `cancel`
/// fires and must never panic on HTTP-level outcomes.
#[async_trait]
pub trait ChannelProbe: Send + Sync {
    /// Probe one credential against its upstream provider
    async fn probe(
        &self,
        cancel: &CancellationToken,
        credential: &Credential,
        group: &CredentialGroup,
    ) -> ProbeResult<ProbeVerdict>;
}

/// Registry mapping channel kinds to their probe implementations
///
/// A group whose kind resolves to no probe fails the job at init.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: HashMap<ChannelKind, Arc<dyn ChannelProbe>>,
}

impl ProbeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in HTTP probes for the known kinds
    pub fn with_defaults(client: reqwest::Client) -> Self {
        let probe: Arc<dyn ChannelProbe> = Arc::new(HttpProbe::new(client));
        let mut registry = Self::new();
        registry.register(ChannelKind::Openai, probe.clone());
        registry.register(ChannelKind::Gemini, probe);
        registry
    }

    /// Register (or replace) the probe for a channel kind
    pub fn register(&mut self, kind: ChannelKind, probe: Arc<dyn ChannelProbe>) {
        self.probes.insert(kind, probe);
    }

    /// Resolve the probe for a channel kind
    pub fn resolve(&self, kind: &ChannelKind) -> Option<Arc<dyn ChannelProbe>> {
        self.probes.get(kind).cloned()
    }
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("kinds", &self.probes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_known_kinds() {
        let registry = ProbeRegistry::with_defaults(reqwest::Client::new());
        assert!(registry.resolve(&ChannelKind::Openai).is_some());
        assert!(registry.resolve(&ChannelKind::Gemini).is_some());
        assert!(registry
            .resolve(&ChannelKind::Other("mystery".into()))
            .is_none());
    }

    #[test]
    fn test_verdict_constructors() {
        let ok = ProbeVerdict::valid(Duration::from_millis(80));
        assert!(ok.valid);
        assert!(ok.error.is_none());

        let bad = ProbeVerdict::invalid(Duration::from_millis(40), "unauthorized");
        assert!(!bad.valid);
        assert_eq!(bad.error.as_deref(), Some("unauthorized"));
    }
}
