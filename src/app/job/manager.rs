//! Job registry and operator API
//!
//! The [`JobManager`] owns every sweep job in the process: it admits new
//! sweeps, resolves their probes, exposes the operator surface
//! (progress, results, pause/resume/cancel, subscribe, export), applies
//! configuration updates, and retires finished jobs after their retention
//! window. The manager itself is passive — operator calls mutate it
//! directly and the only spawned work is the per-job dispatcher and the
//! optional cleanup sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{JobState, ProgressSnapshot, SweepJob};
use crate::app::client::ProbeClientConfig;
use crate::app::export::{render_export, ExportFilter, ExportFormat};
use crate::app::fanout::{ProgressSink, SubscriptionId};
use crate::app::limiter::ProbeRateLimiter;
use crate::app::models::ProbeOutcome;
use crate::app::probe::ProbeRegistry;
use crate::app::store::CredentialStore;
use crate::app::sweep::{run_sweep, SweepContext};
use crate::config::SweepConfig;
use crate::constants::{jobs, limits};
use crate::errors::{AppError, JobError, Result};

/// Process-wide registry and lifecycle manager for sweep jobs
pub struct JobManager {
    jobs: RwLock<HashMap<String, Arc<SweepJob>>>,
    config: std::sync::RwLock<SweepConfig>,
    limiter: Arc<ProbeRateLimiter>,
    registry: ProbeRegistry,
    store: Arc<dyn CredentialStore>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Create a manager over a credential store with default configuration
    pub fn new(store: Arc<dyn CredentialStore>) -> Result<Self> {
        JobManagerBuilder::new().store(store).build()
    }

    /// Start a sweep of a group's credentials
    ///
    /// Returns the job immediately; execution proceeds in the background.
    /// `concurrency` overrides the configured semaphore width for this job.
    ///
    /// # Errors
    ///
    /// Rejects invalid parameters, unknown groups, and empty groups without
    /// creating a job. A group whose channel kind has no registered probe
    /// produces a job in the `failed` state.
    pub async fn start_batch(
        &self,
        group_id: u64,
        batch_size: usize,
        concurrency: usize,
    ) -> Result<Arc<SweepJob>> {
        if batch_size == 0 {
            return Err(JobError::InvalidParameter {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if concurrency == 0 || concurrency > limits::MAX_CONCURRENCY {
            return Err(JobError::InvalidParameter {
                field: "concurrency",
                reason: format!("must be between 1 and {}", limits::MAX_CONCURRENCY),
            }
            .into());
        }

        let group = self
            .store
            .find_group(group_id)
            .await?
            .ok_or(JobError::GroupNotFound { group_id })?;

        let credentials = self.store.list_credentials_by_group(group_id).await?;
        if credentials.is_empty() {
            return Err(JobError::NoCredentials { group_id }.into());
        }

        let mut config = self.get_config();
        config.concurrency = concurrency;

        let job = {
            let mut registry = self.jobs.write().await;
            let id = Self::unique_job_id(&registry, group_id);
            let job = Arc::new(SweepJob::new(id, group_id, credentials.len() as u64));
            registry.insert(job.id().to_string(), job.clone());
            job
        };

        info!(
            job = %job.id(),
            group = group_id,
            credentials = credentials.len(),
            concurrency,
            "batch check started"
        );

        match self.registry.resolve(&group.channel_kind) {
            Some(probe) => {
                let ctx = SweepContext {
                    job: job.clone(),
                    group,
                    credentials,
                    probe,
                    limiter: self.limiter.clone(),
                    store: self.store.clone(),
                    config,
                };
                tokio::spawn(run_sweep(ctx));
            }
            None => {
                let message = format!(
                    "no probe registered for channel kind {}",
                    group.channel_kind
                );
                warn!(job = %job.id(), group = group_id, "{message}");
                job.fail(message);
                job.broadcast().await;
            }
        }

        Ok(job)
    }

    /// Look up a job by id
    pub async fn get_job(&self, job_id: &str) -> Result<Arc<SweepJob>> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| {
                JobError::NotFound {
                    job_id: job_id.to_string(),
                }
                .into()
            })
    }

    /// Current progress snapshot of a job
    pub async fn get_progress(&self, job_id: &str) -> Result<ProgressSnapshot> {
        Ok(self.get_job(job_id).await?.snapshot())
    }

    /// Outcome list of a job, in completion order
    pub async fn get_results(&self, job_id: &str) -> Result<Vec<ProbeOutcome>> {
        Ok(self.get_job(job_id).await?.results())
    }

    /// Request a pause; takes effect at the next chunk boundary
    pub async fn pause(&self, job_id: &str) -> Result<()> {
        let job = self.get_job(job_id).await?;
        if job.state() != JobState::Running || !job.gate.request() {
            return Err(JobError::NotPausable {
                job_id: job_id.to_string(),
            }
            .into());
        }
        debug!(job = job_id, "pause requested");
        Ok(())
    }

    /// Resume a paused (or pause-pending) job
    pub async fn resume(&self, job_id: &str) -> Result<()> {
        let job = self.get_job(job_id).await?;
        if !job.gate.release() {
            return Err(JobError::NotPaused {
                job_id: job_id.to_string(),
            }
            .into());
        }
        debug!(job = job_id, "resume requested");
        Ok(())
    }

    /// Cancel a job; in-flight probes abort via the job's token
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self.get_job(job_id).await?;
        job.cancel();
        debug!(job = job_id, "cancellation requested");
        Ok(())
    }

    /// Register a progress sink; the current snapshot is delivered before
    /// the sink joins the broadcast set
    pub async fn subscribe(
        &self,
        job_id: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<SubscriptionId> {
        let job = self.get_job(job_id).await?;
        Ok(job.attach_subscriber(sink).await)
    }

    /// Remove a previously registered progress sink
    pub async fn unsubscribe(&self, job_id: &str, subscription: SubscriptionId) -> Result<()> {
        let job = self.get_job(job_id).await?;
        job.subscribers.unsubscribe(subscription).await;
        Ok(())
    }

    /// Render a job's outcomes as a downloadable byte stream
    pub async fn export(
        &self,
        job_id: &str,
        format: ExportFormat,
        filter: ExportFilter,
    ) -> Result<Vec<u8>> {
        let job = self.get_job(job_id).await?;
        Ok(render_export(job.id(), &job.results(), format, filter)?)
    }

    /// Remove terminal jobs older than `max_age`; returns how many were
    /// retired
    pub async fn cleanup_expired(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut registry = self.jobs.write().await;
        let before = registry.len();

        registry.retain(|_, job| {
            if !job.state().is_terminal() {
                return true;
            }
            let age = now
                .signed_duration_since(job.tracker.start_time())
                .to_std()
                .unwrap_or_default();
            age <= max_age
        });

        let removed = before - registry.len();
        if removed > 0 {
            info!(removed, "expired jobs retired");
        }
        removed
    }

    /// Spawn the periodic TTL sweeper
    ///
    /// Holds only a weak reference; the task ends when the manager is
    /// dropped or [`shutdown`](Self::shutdown) is called.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        interval: Duration,
        max_age: Duration,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(manager) = weak.upgrade() else { break };
                        manager.cleanup_expired(max_age).await;
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }

    /// Spawn the TTL sweeper with the default cadence and retention window
    pub fn spawn_default_cleanup_task(self: &Arc<Self>) -> JoinHandle<()> {
        self.spawn_cleanup_task(jobs::CLEANUP_INTERVAL, jobs::DEFAULT_RETENTION)
    }

    /// Replace the engine configuration
    ///
    /// The rate limiter is rebuilt atomically; acquires already waiting may
    /// observe either rate. Transport settings (proxy, HTTP/2) apply to
    /// probes created for managers built after the change; the shared
    /// client of this manager is not rebuilt.
    pub fn update_config(&self, config: SweepConfig) -> Result<()> {
        config.validate()?;
        self.limiter.set_rate(config.rate_limit_per_sec)?;
        let mut guard = self
            .config
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = config;
        Ok(())
    }

    /// Current engine configuration
    pub fn get_config(&self) -> SweepConfig {
        self.config
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of registered jobs (any state)
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Cancel every job and stop background tasks
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let registry = self.jobs.read().await;
        for job in registry.values() {
            job.cancel();
        }
        info!(jobs = registry.len(), "job manager shut down");
    }

    fn unique_job_id(registry: &HashMap<String, Arc<SweepJob>>, group_id: u64) -> String {
        let base = format!("batch_{}_{}", group_id, Utc::now().timestamp());
        if !registry.contains_key(&base) {
            return base;
        }
        // Same group, same second: disambiguate with a short suffix
        let mut n = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if !registry.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Builder for [`JobManager`] instances with validation
#[derive(Default)]
pub struct JobManagerBuilder {
    store: Option<Arc<dyn CredentialStore>>,
    config: SweepConfig,
    registry: Option<ProbeRegistry>,
}

impl JobManagerBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the credential store (required)
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the engine configuration
    pub fn config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the probe registry (tests, custom channels)
    pub fn registry(mut self, registry: ProbeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the manager (validates configuration, builds the transport)
    pub fn build(self) -> Result<JobManager> {
        let store = self
            .store
            .ok_or_else(|| AppError::generic("credential store is required"))?;

        self.config.validate()?;
        let limiter = Arc::new(ProbeRateLimiter::new(self.config.rate_limit_per_sec)?);

        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let client = ProbeClientConfig::from(&self.config).build_http_client()?;
                ProbeRegistry::with_defaults(client)
            }
        };

        Ok(JobManager {
            jobs: RwLock::new(HashMap::new()),
            config: std::sync::RwLock::new(self.config),
            limiter,
            registry,
            store,
            shutdown: CancellationToken::new(),
        })
    }
}
