//! Progress fan-out
//!
//! Jobs publish progress snapshots to any number of push subscribers. The
//! engine is decoupled from the push transport: operators register a
//! [`ProgressSink`] (a WebSocket adapter, an SSE writer, a channel) and the
//! subscriber set delivers snapshots with a bounded per-sink budget. A sink
//! that fails or stalls is dropped; it can never block other sinks or the
//! job itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use super::job::ProgressSnapshot;
use crate::constants::fanout;
use crate::errors::SinkError;

/// A push subscriber for progress snapshots
///
/// `deliver` must be bounded in time; the subscriber set additionally wraps
/// every call in a delivery timeout.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Deliver one snapshot, reporting failure if the sink is gone
    async fn deliver(&self, snapshot: &ProgressSnapshot) -> Result<(), SinkError>;
}

/// Registration handle returned by [`SubscriberSet::subscribe`]
pub type SubscriptionId = u64;

/// The set of live subscribers of one job
#[derive(Debug, Default)]
pub struct SubscriberSet {
    sinks: RwLock<Vec<(SubscriptionId, Arc<dyn ProgressSink>)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for dyn ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgressSink")
    }
}

impl SubscriberSet {
    /// Create an empty subscriber set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink, pushing the current snapshot before it joins the
    /// broadcast set
    ///
    /// A sink whose initial delivery fails is treated as already gone and is
    /// not registered; the returned handle is inert in that case.
    pub async fn subscribe(
        &self,
        sink: Arc<dyn ProgressSink>,
        snapshot: &ProgressSnapshot,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        match Self::deliver_bounded(&sink, snapshot).await {
            Ok(()) => {
                self.sinks.write().await.push((id, sink));
            }
            Err(e) => {
                debug!(subscription = id, error = %e, "initial snapshot delivery failed, sink not registered");
            }
        }
        id
    }

    /// Remove a sink by its registration handle
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.sinks.write().await.retain(|(sink_id, _)| *sink_id != id);
    }

    /// Number of live subscribers
    pub async fn len(&self) -> usize {
        self.sinks.read().await.len()
    }

    /// Whether the set holds no subscribers
    pub async fn is_empty(&self) -> bool {
        self.sinks.read().await.is_empty()
    }

    /// Deliver a snapshot to every subscriber, dropping the ones that fail
    pub async fn broadcast(&self, snapshot: &ProgressSnapshot) {
        // Clone the sink list so delivery happens outside the lock
        let sinks: Vec<(SubscriptionId, Arc<dyn ProgressSink>)> =
            self.sinks.read().await.clone();
        if sinks.is_empty() {
            return;
        }

        let mut dead = Vec::new();
        for (id, sink) in &sinks {
            if let Err(e) = Self::deliver_bounded(sink, snapshot).await {
                debug!(subscription = id, error = %e, "dropping subscriber");
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            self.sinks
                .write()
                .await
                .retain(|(id, _)| !dead.contains(id));
            warn!(dropped = dead.len(), job = %snapshot.task_id, "removed failed subscribers");
        }
    }

    async fn deliver_bounded(
        sink: &Arc<dyn ProgressSink>,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), SinkError> {
        match tokio::time::timeout(fanout::DELIVERY_TIMEOUT, sink.deliver(snapshot)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout),
        }
    }
}

/// [`ProgressSink`] adapter over a bounded tokio channel
///
/// Snapshots are pushed without blocking; a full buffer skips the update
/// (the next one supersedes it), a closed receiver reports the sink dead.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressSnapshot>,
}

impl ChannelSink {
    /// Create a channel sink and its receiving half
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ProgressSnapshot>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn deliver(&self, snapshot: &ProgressSnapshot) -> Result<(), SinkError> {
        match self.tx.try_send(snapshot.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Stale progress is worthless; drop the update, keep the sink
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }
}
