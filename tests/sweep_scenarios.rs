//! End-to-end sweep scenarios
//!
//! These tests drive the whole engine — manager, dispatcher, retry ladder,
//! rate limiter, fan-out, store write-back — with scripted probes against
//! the in-memory credential store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use keysweep::app::{ChannelProbe, ProbeRegistry, ProbeVerdict};
use keysweep::errors::{ProbeError, ProbeResult};
use keysweep::prelude::*;

/// Scripted probe behavior
enum Behavior {
    /// Classify every attempt with this HTTP status
    Status(u16),
    /// Fail the first `n` attempts at the transport layer, then succeed
    TransportFailuresThenOk(u32),
    /// Fail every attempt at the transport layer
    AlwaysTransportFailure,
}

struct StubProbe {
    behavior: Behavior,
    delay: Duration,
    invocations: AtomicU32,
}

impl StubProbe {
    fn new(behavior: Behavior) -> Arc<Self> {
        Self::with_delay(behavior, Duration::ZERO)
    }

    fn with_delay(behavior: Behavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            delay,
            invocations: AtomicU32::new(0),
        })
    }

    fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelProbe for StubProbe {
    async fn probe(
        &self,
        cancel: &CancellationToken,
        _credential: &Credential,
        _group: &CredentialGroup,
    ) -> ProbeResult<ProbeVerdict> {
        let attempt = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            }
        }

        match self.behavior {
            Behavior::Status(200) => Ok(ProbeVerdict::valid(self.delay)),
            Behavior::Status(401) | Behavior::Status(403) => {
                Ok(ProbeVerdict::invalid(self.delay, "unauthorized"))
            }
            Behavior::Status(429) => Ok(ProbeVerdict::invalid(self.delay, "rate_limited")),
            Behavior::Status(code) => Ok(ProbeVerdict::invalid(self.delay, format!("http {code}"))),
            Behavior::TransportFailuresThenOk(failures) => {
                if attempt <= failures {
                    Err(ProbeError::Transport {
                        reason: "connection reset".to_string(),
                    })
                } else {
                    Ok(ProbeVerdict::valid(self.delay))
                }
            }
            Behavior::AlwaysTransportFailure => Err(ProbeError::Transport {
                reason: "connection reset".to_string(),
            }),
        }
    }
}

/// Route engine logs into the test output when RUST_LOG is set
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Seed a store with one group and `count` credentials
async fn seeded_store(count: u64) -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    store
        .insert_group(CredentialGroup {
            id: 1,
            name: "pool".to_string(),
            channel_kind: ChannelKind::Openai,
            validation_endpoint: None,
        })
        .await;
    for id in 1..=count {
        store
            .insert_credential(Credential {
                id,
                secret: format!("sk-{id}"),
                group_id: 1,
            })
            .await;
    }
    store
}

/// Build a manager whose openai channel is served by the given probe
fn manager_with(
    store: Arc<MemoryCredentialStore>,
    probe: Arc<dyn ChannelProbe>,
    config: SweepConfig,
) -> Arc<JobManager> {
    let mut registry = ProbeRegistry::new();
    registry.register(ChannelKind::Openai, probe);
    Arc::new(
        JobManagerBuilder::new()
            .store(store)
            .config(config)
            .registry(registry)
            .build()
            .unwrap(),
    )
}

/// Fast test configuration: generous rate limit, no jitter, quick retries
fn test_config() -> SweepConfig {
    SweepConfig {
        rate_limit_per_sec: 500,
        retry_delay_ms: 10,
        enable_jitter: false,
        ..Default::default()
    }
}

/// Poll a job until it reaches a terminal state
async fn wait_terminal(
    manager: &JobManager,
    job_id: &str,
    timeout: Duration,
) -> ProgressSnapshot {
    let deadline = Instant::now() + timeout;
    loop {
        let snapshot = manager.get_progress(job_id).await.unwrap();
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "job {job_id} did not reach a terminal state within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Happy path: every credential authenticates
///
/// Three credentials, probe answers 200. The sweep completes with all
/// counters accounted for and every credential persisted as active.
#[tokio::test(flavor = "multi_thread")]
async fn test_happy_path() {
    init_tracing();
    let store = seeded_store(3).await;
    let probe = StubProbe::new(Behavior::Status(200));
    let manager = manager_with(store.clone(), probe, test_config());

    let job = manager.start_batch(1, 10, 2).await.unwrap();
    let snapshot = wait_terminal(&manager, job.id(), Duration::from_secs(5)).await;

    assert_eq!(snapshot.status, JobState::Completed);
    assert_eq!(snapshot.total_keys, 3);
    assert_eq!(snapshot.processed_keys, 3);
    assert_eq!(snapshot.valid_keys, 3);
    assert_eq!(snapshot.invalid_keys, 0);
    assert!(snapshot.estimated_end.is_none());

    let results = manager.get_results(job.id()).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|o| o.valid && o.error_message.is_empty()));

    for id in 1..=3 {
        let stored = store.stored(id).await.unwrap();
        assert_eq!(stored.status, Some(CredentialStatus::Active));
        assert!(stored.last_error.is_empty());
    }
}

/// All invalid: every probe is rejected with 401
#[tokio::test(flavor = "multi_thread")]
async fn test_all_invalid() {
    let store = seeded_store(5).await;
    let probe = StubProbe::new(Behavior::Status(401));
    let manager = manager_with(store.clone(), probe, test_config());

    let job = manager.start_batch(1, 10, 4).await.unwrap();
    let snapshot = wait_terminal(&manager, job.id(), Duration::from_secs(5)).await;

    assert_eq!(snapshot.status, JobState::Completed);
    assert_eq!(snapshot.valid_keys, 0);
    assert_eq!(snapshot.invalid_keys, 5);

    let results = manager.get_results(job.id()).await.unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|o| o.error_message == "unauthorized"));

    for id in 1..=5 {
        let stored = store.stored(id).await.unwrap();
        assert_eq!(stored.status, Some(CredentialStatus::Invalid));
        assert_eq!(stored.last_error, "unauthorized");
    }
}

/// Cancel mid-run: a large slow sweep stops promptly
///
/// 1000 credentials with 100 ms probes would need many seconds; cancelling
/// after 200 ms must settle the job within a second, with a terminal
/// snapshot delivered to the subscriber.
#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_mid_run() {
    init_tracing();
    let store = seeded_store(1000).await;
    let probe = StubProbe::with_delay(Behavior::Status(200), Duration::from_millis(100));
    let config = SweepConfig {
        concurrency: 50,
        streaming_threshold: 1000,
        ..test_config()
    };
    let manager = manager_with(store, probe, config);

    let job = manager.start_batch(1, 100, 50).await.unwrap();
    let (sink, mut progress_rx) = ChannelSink::new(256);
    manager.subscribe(job.id(), Arc::new(sink)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let cancelled_at = Instant::now();
    manager.cancel(job.id()).await.unwrap();

    let snapshot = wait_terminal(&manager, job.id(), Duration::from_secs(1)).await;
    assert_eq!(snapshot.status, JobState::Cancelled);
    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert!(snapshot.processed_keys < 1000);

    // The subscriber saw at least the terminal snapshot
    let mut saw_terminal = false;
    while let Ok(received) = progress_rx.try_recv() {
        if received.status == JobState::Cancelled {
            saw_terminal = true;
        }
    }
    assert!(saw_terminal);
}

/// Pause stops the dispatcher at a chunk boundary; resume finishes the job
#[tokio::test(flavor = "multi_thread")]
async fn test_pause_resume() {
    init_tracing();
    let store = seeded_store(100).await;
    let probe = StubProbe::with_delay(Behavior::Status(200), Duration::from_millis(20));
    let config = SweepConfig {
        concurrency: 5,
        // Force the chunked path: 100 credentials in chunks of 10
        streaming_threshold: 1,
        ..test_config()
    };
    let manager = manager_with(store, probe, config);

    let job = manager.start_batch(1, 10, 5).await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    manager.pause(job.id()).await.unwrap();

    // The pause lands at the next chunk boundary
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if manager.get_progress(job.id()).await.unwrap().status == JobState::Paused {
            break;
        }
        assert!(Instant::now() < deadline, "job never paused");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // While paused, the processed count stops advancing
    let frozen = manager.get_progress(job.id()).await.unwrap().processed_keys;
    tokio::time::sleep(Duration::from_millis(500)).await;
    let still = manager.get_progress(job.id()).await.unwrap();
    assert_eq!(still.status, JobState::Paused);
    assert_eq!(still.processed_keys, frozen);

    manager.resume(job.id()).await.unwrap();
    let snapshot = wait_terminal(&manager, job.id(), Duration::from_secs(10)).await;
    assert_eq!(snapshot.status, JobState::Completed);
    assert_eq!(snapshot.processed_keys, 100);
}

/// Transport failures are retried with backoff until a response arrives
///
/// Two transport failures then success, base delay 10 ms without jitter:
/// exactly three probe invocations and at least 10 + 20 ms of backoff.
#[tokio::test(flavor = "multi_thread")]
async fn test_retry_on_transport_failure() {
    let store = seeded_store(1).await;
    let probe = StubProbe::new(Behavior::TransportFailuresThenOk(2));
    let config = SweepConfig {
        max_retries: 3,
        retry_delay_ms: 10,
        enable_jitter: false,
        ..test_config()
    };
    let manager = manager_with(store, probe.clone(), config);

    let started = Instant::now();
    let job = manager.start_batch(1, 10, 1).await.unwrap();
    let snapshot = wait_terminal(&manager, job.id(), Duration::from_secs(5)).await;
    let elapsed = started.elapsed();

    assert_eq!(snapshot.status, JobState::Completed);
    assert_eq!(snapshot.valid_keys, 1);
    assert_eq!(probe.invocations(), 3);
    assert!(
        elapsed >= Duration::from_millis(30),
        "backoff too short: {elapsed:?}"
    );

    let results = manager.get_results(job.id()).await.unwrap();
    assert!(results[0].valid);
}

/// Exhausted retries fold the last transport error into the outcome
#[tokio::test(flavor = "multi_thread")]
async fn test_retry_exhaustion() {
    let store = seeded_store(1).await;
    let probe = StubProbe::new(Behavior::AlwaysTransportFailure);
    let config = SweepConfig {
        max_retries: 3,
        retry_delay_ms: 10,
        enable_jitter: false,
        ..test_config()
    };
    let manager = manager_with(store.clone(), probe.clone(), config);

    let job = manager.start_batch(1, 10, 1).await.unwrap();
    let snapshot = wait_terminal(&manager, job.id(), Duration::from_secs(5)).await;

    assert_eq!(snapshot.status, JobState::Completed);
    assert_eq!(snapshot.invalid_keys, 1);
    assert_eq!(probe.invocations(), 3);

    let results = manager.get_results(job.id()).await.unwrap();
    assert!(results[0]
        .error_message
        .starts_with("failed after 3 attempts:"));
    assert_eq!(
        store.stored(1).await.unwrap().status,
        Some(CredentialStatus::Invalid)
    );
}

/// The token bucket caps sustained probe throughput
///
/// 50 instant probes at 10/s: the burst covers the first 10, the remaining
/// 40 refill at 10/s, so the sweep cannot finish in under ~4 seconds.
#[tokio::test(flavor = "multi_thread")]
async fn test_rate_limit_paces_sweep() {
    init_tracing();
    let store = seeded_store(50).await;
    let probe = StubProbe::new(Behavior::Status(200));
    let config = SweepConfig {
        concurrency: 50,
        rate_limit_per_sec: 10,
        max_retries: 1,
        ..test_config()
    };
    let manager = manager_with(store, probe, config);

    let started = Instant::now();
    let job = manager.start_batch(1, 100, 50).await.unwrap();
    let snapshot = wait_terminal(&manager, job.id(), Duration::from_secs(30)).await;
    let elapsed = started.elapsed();

    assert_eq!(snapshot.status, JobState::Completed);
    assert_eq!(snapshot.processed_keys, 50);
    assert!(
        elapsed >= Duration::from_millis(3_900),
        "sweep finished too fast for the configured rate: {elapsed:?}"
    );
}
