//! Progress accounting
//!
//! Each job owns a [`ProgressTracker`]: atomic counters for lock-free
//! monotone reads, plus a short mutex that ties the outcome list and the
//! counters together so snapshots are internally consistent
//! (`valid + invalid == processed == results.len()` under the lock).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobState;
use crate::app::models::ProbeOutcome;
use crate::constants::sweep;

/// Progress snapshot pushed to subscribers
///
/// Field names are the wire format consumed by the operator console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Job identifier
    pub task_id: String,
    /// Observable job state
    pub status: JobState,
    /// Credentials in the sweep
    pub total_keys: u64,
    /// Credentials with a recorded outcome
    pub processed_keys: u64,
    /// Outcomes classified valid
    pub valid_keys: u64,
    /// Outcomes classified invalid
    pub invalid_keys: u64,
    /// 1-based index of the chunk in flight; 0 before dispatch
    pub current_batch: usize,
    /// Number of chunks the dispatcher will process
    pub total_batches: usize,
    /// When the job started
    pub start_time: DateTime<Utc>,
    /// Projected completion; `null` unless `speed > 0` and work remains
    pub estimated_end: Option<DateTime<Utc>>,
    /// Failure detail for `failed` jobs; empty otherwise
    #[serde(default)]
    pub error_message: String,
    /// Throughput in keys per second
    pub speed: f64,
}

#[derive(Debug, Default)]
struct TrackerInner {
    results: Vec<ProbeOutcome>,
    speed: f64,
    estimated_end: Option<DateTime<Utc>>,
}

/// Counters and result accumulation for one job
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: u64,
    processed: AtomicU64,
    valid: AtomicU64,
    invalid: AtomicU64,
    current_batch: AtomicUsize,
    total_batches: AtomicUsize,
    start_time: DateTime<Utc>,
    started: Instant,
    inner: Mutex<TrackerInner>,
}

impl ProgressTracker {
    pub(crate) fn new(total: u64) -> Self {
        Self {
            total,
            processed: AtomicU64::new(0),
            valid: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            current_batch: AtomicUsize::new(0),
            total_batches: AtomicUsize::new(0),
            start_time: Utc::now(),
            started: Instant::now(),
            inner: Mutex::new(TrackerInner {
                results: Vec::with_capacity(total as usize),
                ..Default::default()
            }),
        }
    }

    pub(crate) fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub(crate) fn set_total_batches(&self, batches: usize) {
        self.total_batches.store(batches, Ordering::Release);
    }

    pub(crate) fn set_current_batch(&self, index: usize) {
        self.current_batch.store(index, Ordering::Release);
    }

    /// Record one finished credential; returns the processed count after
    /// the append
    ///
    /// Every [`sweep::PROGRESS_TICK_EVERY`] completions the throughput and
    /// projected completion are recomputed under the same lock.
    pub(crate) fn record(&self, outcome: ProbeOutcome) -> u64 {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if outcome.valid {
            self.valid.fetch_add(1, Ordering::AcqRel);
        } else {
            self.invalid.fetch_add(1, Ordering::AcqRel);
        }
        inner.results.push(outcome);
        let processed = self.processed.fetch_add(1, Ordering::AcqRel) + 1;

        if processed % sweep::PROGRESS_TICK_EVERY == 0 {
            let elapsed = self.started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                inner.speed = processed as f64 / elapsed;
            }
            inner.estimated_end = if inner.speed > 0.0 && processed < self.total {
                let remaining_secs = (self.total - processed) as f64 / inner.speed;
                Some(Utc::now() + chrono::Duration::milliseconds((remaining_secs * 1000.0) as i64))
            } else {
                None
            };
        }

        processed
    }

    /// Clone the outcome list in completion order
    pub(crate) fn results(&self) -> Vec<ProbeOutcome> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .results
            .clone()
    }

    /// Build a consistent snapshot for the given observable state
    pub(crate) fn snapshot(
        &self,
        task_id: &str,
        status: JobState,
        error_message: &str,
    ) -> ProgressSnapshot {
        let (processed, valid, invalid, speed, estimated_end) = {
            let inner = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            (
                inner.results.len() as u64,
                self.valid.load(Ordering::Acquire),
                self.invalid.load(Ordering::Acquire),
                inner.speed,
                inner.estimated_end,
            )
        };

        // The estimate is only meaningful while work remains
        let estimated_end = if speed > 0.0 && processed < self.total {
            estimated_end
        } else {
            None
        };

        ProgressSnapshot {
            task_id: task_id.to_string(),
            status,
            total_keys: self.total,
            processed_keys: processed,
            valid_keys: valid,
            invalid_keys: invalid,
            current_batch: self.current_batch.load(Ordering::Acquire),
            total_batches: self.total_batches.load(Ordering::Acquire),
            start_time: self.start_time,
            estimated_end,
            error_message: error_message.to_string(),
            speed,
        }
    }
}
