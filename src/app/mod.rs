//! Core engine logic for keysweep
//!
//! This module contains the engine components: the data model, the
//! credential-store seam, the probe transport and per-channel probes, the
//! rate limiter, the sweep worker pool, job lifecycle management, progress
//! fan-out, and result export.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keysweep::app::{JobManager, MemoryCredentialStore};
//! use keysweep::app::models::{ChannelKind, Credential, CredentialGroup};
//!
//! # async fn example() -> keysweep::Result<()> {
//! let store = Arc::new(MemoryCredentialStore::new());
//! store.insert_group(CredentialGroup {
//!     id: 1,
//!     name: "openai-pool".to_string(),
//!     channel_kind: ChannelKind::Openai,
//!     validation_endpoint: None,
//! }).await;
//! store.insert_credential(Credential {
//!     id: 1,
//!     secret: "sk-example".to_string(),
//!     group_id: 1,
//! }).await;
//!
//! let manager = Arc::new(JobManager::new(store)?);
//! let job = manager.start_batch(1, 100, 10).await?;
//! println!("sweeping as {}", job.id());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod export;
pub mod fanout;
pub mod job;
pub mod limiter;
pub mod models;
pub mod probe;
pub mod store;

pub(crate) mod sweep;

// Re-export main public API
pub use client::ProbeClientConfig;
pub use export::{render_export, ExportFilter, ExportFormat};
pub use fanout::{ChannelSink, ProgressSink, SubscriberSet, SubscriptionId};
pub use job::{JobManager, JobManagerBuilder, JobState, ProgressSnapshot, SweepJob};
pub use limiter::ProbeRateLimiter;
pub use models::{ChannelKind, Credential, CredentialGroup, CredentialStatus, ProbeOutcome};
pub use probe::{ChannelProbe, HttpProbe, ProbeRegistry, ProbeVerdict};
pub use store::{CredentialStore, MemoryCredentialStore};
