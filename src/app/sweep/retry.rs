//! Per-credential retry ladder
//!
//! A credential gets up to `max_retries` probe attempts. HTTP-classified
//! verdicts — any status, including 5xx — are final after one attempt; only
//! transport failures re-enter the ladder. Backoff grows exponentially from
//! the base delay, capped, with optional jitter to avoid thundering herds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::app::limiter::ProbeRateLimiter;
use crate::app::models::{Credential, CredentialGroup, ProbeOutcome};
use crate::app::probe::{ChannelProbe, ProbeVerdict};
use crate::config::SweepConfig;
use crate::constants::limits;
use crate::errors::ProbeError;

/// Retry schedule derived from the sweep configuration
#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    attempts: u32,
    base: Duration,
    cap: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &SweepConfig) -> Self {
        Self {
            // max_retries = 0 still makes exactly one attempt
            attempts: config.max_retries.max(1),
            base: config.retry_delay(),
            cap: config.max_retry_backoff(),
            jitter: config.enable_jitter,
        }
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Backoff before re-running attempt `attempt + 1` (0-indexed)
    pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let exponential = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        let capped = exponential.min(self.cap.as_millis() as u64);

        let jitter = if self.jitter {
            let range = (capped as f64 * limits::BACKOFF_JITTER_FACTOR) as u64;
            if range > 0 {
                fastrand::u64(0..=range)
            } else {
                0
            }
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// Everything a worker needs to probe one credential
pub(crate) struct ProbeAttemptEnv {
    pub group: CredentialGroup,
    pub probe: Arc<dyn ChannelProbe>,
    pub limiter: Arc<ProbeRateLimiter>,
    pub policy: RetryPolicy,
    pub attempt_timeout: Duration,
}

/// Drive one credential through the retry ladder to a final outcome
///
/// Never returns an error: transport exhaustion and cancellation both
/// become classified outcomes.
pub(crate) async fn probe_credential(
    env: &ProbeAttemptEnv,
    credential: &Credential,
    cancel: &CancellationToken,
) -> ProbeOutcome {
    let started = Instant::now();
    let mut last_error = String::new();

    for attempt in 0..env.policy.attempts() {
        if env.limiter.acquire(cancel).await.is_err() {
            return cancellation_outcome(credential, started);
        }

        let attempt_result =
            tokio::time::timeout(env.attempt_timeout, env.probe.probe(cancel, credential, &env.group))
                .await;

        match attempt_result {
            Ok(Ok(verdict)) => return classified_outcome(credential, verdict),
            Ok(Err(ProbeError::Cancelled)) => return cancellation_outcome(credential, started),
            Ok(Err(transport)) => {
                last_error = transport.to_string();
            }
            Err(_) => {
                last_error = ProbeError::Timeout {
                    seconds: env.attempt_timeout.as_secs(),
                }
                .to_string();
            }
        }

        if attempt + 1 < env.policy.attempts() {
            let delay = env.policy.delay_for(attempt);
            debug!(
                key_id = credential.id,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "probe transport failure, backing off"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return cancellation_outcome(credential, started),
            }
        }
    }

    exhausted_outcome(credential, env.policy.attempts(), &last_error, started)
}

fn classified_outcome(credential: &Credential, verdict: ProbeVerdict) -> ProbeOutcome {
    ProbeOutcome {
        key_id: credential.id,
        key: credential.secret.clone(),
        group_id: credential.group_id,
        valid: verdict.valid,
        response_time_ms: verdict.latency.as_millis() as i64,
        error_message: verdict.error.unwrap_or_default(),
        checked_at: Utc::now(),
    }
}

fn cancellation_outcome(credential: &Credential, started: Instant) -> ProbeOutcome {
    ProbeOutcome {
        key_id: credential.id,
        key: credential.secret.clone(),
        group_id: credential.group_id,
        valid: false,
        response_time_ms: started.elapsed().as_millis() as i64,
        error_message: "cancelled".to_string(),
        checked_at: Utc::now(),
    }
}

fn exhausted_outcome(
    credential: &Credential,
    attempts: u32,
    last_error: &str,
    started: Instant,
) -> ProbeOutcome {
    ProbeOutcome {
        key_id: credential.id,
        key: credential.secret.clone(),
        group_id: credential.group_id,
        valid: false,
        response_time_ms: started.elapsed().as_millis() as i64,
        error_message: format!("failed after {attempts} attempts: {last_error}"),
        checked_at: Utc::now(),
    }
}
