//! Sweep execution
//!
//! The worker pool that drains a credential list through the rate limiter
//! into per-channel probes. A single dispatcher walks the list in chunks —
//! one chunk of everything below the streaming threshold, chunks of
//! `2 × concurrency` above it — and fans each chunk out under a counting
//! semaphore. Pause and cancellation are honored at chunk boundaries;
//! individual probes observe cancellation through the job's token.

mod retry;

pub(crate) use retry::RetryPolicy;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::job::{JobState, SweepJob};
use super::limiter::ProbeRateLimiter;
use super::models::{Credential, CredentialGroup};
use super::probe::ChannelProbe;
use super::store::CredentialStore;
use crate::config::SweepConfig;
use crate::constants::sweep;

use retry::ProbeAttemptEnv;

/// Everything a sweep needs, assembled by the job manager
pub(crate) struct SweepContext {
    pub job: Arc<SweepJob>,
    pub group: CredentialGroup,
    pub credentials: Vec<Credential>,
    pub probe: Arc<dyn ChannelProbe>,
    pub limiter: Arc<ProbeRateLimiter>,
    pub store: Arc<dyn CredentialStore>,
    pub config: SweepConfig,
}

struct WorkerEnv {
    job: Arc<SweepJob>,
    store: Arc<dyn CredentialStore>,
    attempt: ProbeAttemptEnv,
    persist: bool,
}

/// Run a sweep to its terminal state
pub(crate) async fn run_sweep(ctx: SweepContext) {
    let job = ctx.job.clone();
    let total = ctx.credentials.len();
    let concurrency = ctx.config.concurrency;

    let streaming = total >= ctx.config.streaming_threshold;
    let chunk_size = if streaming {
        (sweep::CHUNK_CONCURRENCY_FACTOR * concurrency).max(1)
    } else {
        total.max(1)
    };
    let total_batches = total.div_ceil(chunk_size);
    job.tracker.set_total_batches(total_batches);

    info!(
        job = %job.id(),
        total,
        concurrency,
        streaming,
        total_batches,
        "sweep starting"
    );

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let env = Arc::new(WorkerEnv {
        job: job.clone(),
        store: ctx.store,
        attempt: ProbeAttemptEnv {
            group: ctx.group,
            probe: ctx.probe,
            limiter: ctx.limiter,
            policy: RetryPolicy::from_config(&ctx.config),
            attempt_timeout: ctx.config.timeout(),
        },
        persist: ctx.config.backup_results,
    });

    let chunks: Vec<&[Credential]> = ctx.credentials.chunks(chunk_size).collect();
    let chunk_count = chunks.len();

    for (index, chunk) in chunks.into_iter().enumerate() {
        if job.cancel_token().is_cancelled() {
            break;
        }

        // Pause takes effect here, never mid-chunk
        if job.gate.take_park() {
            job.set_state(JobState::Paused);
            job.broadcast().await;

            let resumed = job.gate.wait_released(job.cancel_token()).await;
            if !resumed || job.cancel_token().is_cancelled() {
                break;
            }
            job.set_state(JobState::Running);
            job.broadcast().await;
        }

        job.tracker.set_current_batch(index + 1);
        dispatch_chunk(&env, &semaphore, chunk).await;
        job.broadcast().await;

        if streaming && index + 1 < chunk_count && !job.cancel_token().is_cancelled() {
            // Brief spacing keeps peak memory and burst pressure bounded
            tokio::select! {
                _ = tokio::time::sleep(sweep::CHUNK_SPACING) => {}
                _ = job.cancel_token().cancelled() => {}
            }
        }
    }

    let terminal = if job.cancel_token().is_cancelled() {
        JobState::Cancelled
    } else {
        JobState::Completed
    };
    job.set_state(terminal);

    let snapshot = job.snapshot();
    info!(
        job = %job.id(),
        status = %snapshot.status,
        processed = snapshot.processed_keys,
        valid = snapshot.valid_keys,
        invalid = snapshot.invalid_keys,
        "sweep finished"
    );
    job.broadcast().await;
}

/// Fan one chunk out under the semaphore and wait for every worker
async fn dispatch_chunk(env: &Arc<WorkerEnv>, semaphore: &Arc<Semaphore>, chunk: &[Credential]) {
    let mut workers = JoinSet::new();

    for credential in chunk {
        // Acquire before spawning so at most `concurrency` workers exist
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = env.job.cancel_token().cancelled() => break,
        };

        let env = env.clone();
        let credential = credential.clone();
        workers.spawn(async move {
            let _permit = permit;
            process_credential(&env, &credential).await;
        });
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "sweep worker terminated abnormally");
        }
    }
}

async fn process_credential(env: &WorkerEnv, credential: &Credential) {
    let outcome =
        retry::probe_credential(&env.attempt, credential, env.job.cancel_token()).await;

    // A cancelled attempt is not a classification; do not reclassify the key
    if env.persist && !outcome.is_cancellation() {
        let result = env
            .store
            .update_credential_status(outcome.key_id, outcome.status(), &outcome.error_message)
            .await;
        if let Err(e) = result {
            warn!(key_id = outcome.key_id, error = %e, "credential status write-back failed");
        }
    }

    let processed = env.job.tracker.record(outcome);
    if processed % sweep::PROGRESS_TICK_EVERY == 0 {
        env.job.broadcast().await;
    }
}
