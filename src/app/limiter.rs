//! Process-wide probe rate limiting
//!
//! A token bucket shared by every sweep: capacity and refill rate both equal
//! the configured probes-per-second, so a burst can momentarily reach the
//! configured rate but sustained throughput cannot exceed it. Waiting
//! acquires abort as soon as the owning job is cancelled.

use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::errors::{ConfigError, ConfigResult, ProbeError, ProbeResult};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket throttling outbound probes
///
/// Rebuilt atomically on configuration updates; acquires already in flight
/// may observe either the old or the new rate.
#[derive(Debug)]
pub struct ProbeRateLimiter {
    inner: RwLock<Arc<DirectLimiter>>,
}

impl ProbeRateLimiter {
    /// Create a limiter allowing `rate_per_sec` probes per second
    pub fn new(rate_per_sec: u32) -> ConfigResult<Self> {
        Ok(Self {
            inner: RwLock::new(Arc::new(Self::build(rate_per_sec)?)),
        })
    }

    fn build(rate_per_sec: u32) -> ConfigResult<DirectLimiter> {
        let rate = NonZeroU32::new(rate_per_sec).ok_or(ConfigError::InvalidValue {
            field: "rate_limit_per_sec",
            value: rate_per_sec.to_string(),
            reason: "must be non-zero".to_string(),
        })?;
        let quota = Quota::per_second(rate).allow_burst(rate);
        Ok(RateLimiter::direct(quota))
    }

    /// Block until a token is available or the job is cancelled
    pub async fn acquire(&self, cancel: &CancellationToken) -> ProbeResult<()> {
        let limiter = {
            let guard = self
                .inner
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.clone()
        };

        tokio::select! {
            _ = limiter.until_ready() => Ok(()),
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
        }
    }

    /// Replace the bucket with one allowing `rate_per_sec` probes per second
    pub fn set_rate(&self, rate_per_sec: u32) -> ConfigResult<()> {
        let rebuilt = Arc::new(Self::build(rate_per_sec)?);
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = rebuilt;
        Ok(())
    }
}
