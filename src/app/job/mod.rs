//! Job lifecycle
//!
//! A [`SweepJob`] is one sweep of a group's credentials: an observable state
//! machine, atomic progress accounting, an append-only outcome list, a root
//! cancellation token, a pause gate, and a set of progress subscribers.
//! Jobs are owned by the [`JobManager`]; they hold no back-pointer to it.
//!
//! ```text
//!  running ──pause──▶ paused ──resume──▶ running
//!     │                 │
//!     │ cancel          │ cancel
//!     ▼                 ▼
//!  cancelled ◀────── cancelled
//!
//!  running ──(all done)──▶ completed
//!  running ──(fatal init)──▶ failed
//! ```

mod gate;
mod manager;
mod progress;

pub use manager::{JobManager, JobManagerBuilder};
pub use progress::ProgressSnapshot;

pub(crate) use gate::PauseGate;
pub(crate) use progress::ProgressTracker;

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::fanout::{ProgressSink, SubscriberSet, SubscriptionId};
use super::models::ProbeOutcome;

/// Observable state of a sweep job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// The sweep is dispatching probes
    Running,
    /// The dispatcher is parked at a chunk boundary
    Paused,
    /// Every credential was processed
    Completed,
    /// The job was cancelled before draining
    Cancelled,
    /// The job could not start (no probe for the group's channel kind)
    Failed,
}

impl JobState {
    /// Terminal states are never left
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct StateCell {
    state: JobState,
    error_message: String,
}

/// One sweep of a group's credentials
#[derive(Debug)]
pub struct SweepJob {
    id: String,
    group_id: u64,
    cell: Mutex<StateCell>,
    pub(crate) tracker: ProgressTracker,
    pub(crate) gate: PauseGate,
    pub(crate) subscribers: SubscriberSet,
    // Serializes snapshot construction with delivery so subscribers never
    // observe counters moving backwards between broadcasts
    broadcast_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

impl SweepJob {
    pub(crate) fn new(id: String, group_id: u64, total_credentials: u64) -> Self {
        Self {
            id,
            group_id,
            cell: Mutex::new(StateCell {
                state: JobState::Running,
                error_message: String::new(),
            }),
            tracker: ProgressTracker::new(total_credentials),
            gate: PauseGate::new(),
            subscribers: SubscriberSet::new(),
            broadcast_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// Job identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The swept group
    pub fn group_id(&self) -> u64 {
        self.group_id
    }

    /// Current observable state
    pub fn state(&self) -> JobState {
        self.cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .state
    }

    /// The job's root cancellation token
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fire the cancellation token
    ///
    /// The terminating dispatcher moves the state to `cancelled`; cancelling
    /// an already-terminal job is a no-op.
    pub fn cancel(&self) {
        self.cancel.cancel();
        // Also wake a parked dispatcher so cancellation is not gated on resume
        self.gate.release();
    }

    /// Transition to a new state; terminal states are never left
    ///
    /// Returns whether the transition was applied.
    pub(crate) fn set_state(&self, next: JobState) -> bool {
        let mut cell = self
            .cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if cell.state.is_terminal() {
            return false;
        }
        debug!(job = %self.id, from = %cell.state, to = %next, "state transition");
        cell.state = next;
        true
    }

    /// Mark the job failed with a reason (fatal init)
    pub(crate) fn fail(&self, message: impl Into<String>) {
        let mut cell = self
            .cell
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if cell.state.is_terminal() {
            return;
        }
        cell.state = JobState::Failed;
        cell.error_message = message.into();
    }

    /// Build a consistent progress snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        let (state, error_message) = {
            let cell = self
                .cell
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            (cell.state, cell.error_message.clone())
        };
        self.tracker.snapshot(&self.id, state, &error_message)
    }

    /// The outcome list in completion order
    pub fn results(&self) -> Vec<ProbeOutcome> {
        self.tracker.results()
    }

    /// Push the current snapshot to every subscriber
    pub(crate) async fn broadcast(&self) {
        let _ordered = self.broadcast_lock.lock().await;
        let snapshot = self.snapshot();
        self.subscribers.broadcast(&snapshot).await;
    }

    /// Register a sink, delivering the current snapshot before it joins the
    /// broadcast set
    pub(crate) async fn attach_subscriber(&self, sink: Arc<dyn ProgressSink>) -> SubscriptionId {
        let _ordered = self.broadcast_lock.lock().await;
        let snapshot = self.snapshot();
        self.subscribers.subscribe(sink, &snapshot).await
    }
}
