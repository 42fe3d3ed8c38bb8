//! keysweep
//!
//! Batch API-key validation engine for multi-tenant LLM proxies. Operators
//! maintain pools of upstream credentials (OpenAI, Gemini, …) grouped by
//! channel type; those credentials rot silently as they are revoked,
//! quota-exhausted, or rate-limited. keysweep sweeps a pool on demand,
//! probes each credential against its provider, classifies it as valid or
//! invalid, persists the classification, and streams live progress to any
//! number of observers.
//!
//! # Key Features
//!
//! - **Bounded-concurrency worker pool** with a process-wide token-bucket
//!   rate limit on outbound probes
//! - **Exponential-backoff retries** for transport failures, with HTTP
//!   responses classified exactly once
//! - **Job lifecycle control**: pause and resume at chunk boundaries,
//!   prompt cancellation of in-flight probes, TTL retirement of finished
//!   jobs
//! - **Streaming dispatch** for large pools to bound peak memory
//! - **Progress fan-out** to pluggable push sinks that can never stall a
//!   sweep
//! - **CSV/JSON export** of classified outcomes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keysweep::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> keysweep::Result<()> {
//!     // The store is the seam to your credential database
//!     let store = Arc::new(MemoryCredentialStore::new());
//!     store.insert_group(CredentialGroup {
//!         id: 1,
//!         name: "openai-pool".to_string(),
//!         channel_kind: ChannelKind::Openai,
//!         validation_endpoint: None,
//!     }).await;
//!
//!     let manager = Arc::new(JobManager::new(store)?);
//!     manager.spawn_default_cleanup_task();
//!
//!     let job = manager.start_batch(1, 100, 50).await?;
//!
//!     // Watch the sweep through a channel sink
//!     let (sink, mut progress) = ChannelSink::new(16);
//!     manager.subscribe(job.id(), Arc::new(sink)).await?;
//!     while let Some(snapshot) = progress.recv().await {
//!         println!("{}/{} checked", snapshot.processed_keys, snapshot.total_keys);
//!         if snapshot.status.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! [`SweepConfig`] carries the engine knobs (concurrency, per-attempt
//! timeout, retries, backoff, rate limit, transport options) with validated
//! ranges. It can be embedded in a larger TOML document and loaded with
//! [`SweepConfig::from_toml_str`].
//!
//! # Error Handling
//!
//! Operator-facing errors are structured per domain ([`errors`]) so a
//! transport adapter can map them to status codes without string matching.
//! Probe transport failures never escalate out of a worker: they are
//! retried and, once exhausted, folded into the credential's outcome.

// Core modules - these contain the main library functionality
pub mod app;
pub mod config;
pub mod constants;
pub mod errors;

// Prelude module for convenient imports
pub mod prelude;

// Re-export the most commonly used types at the top level
pub use errors::{AppError, Result};

pub use app::{
    // Fan-out
    ChannelSink,
    // Data model
    ChannelKind,
    ChannelProbe,
    Credential,
    CredentialGroup,
    CredentialStatus,
    // Store seam
    CredentialStore,
    // Export
    ExportFilter,
    ExportFormat,
    HttpProbe,
    // Job control
    JobManager,
    JobManagerBuilder,
    JobState,
    MemoryCredentialStore,
    ProbeOutcome,
    ProbeRegistry,
    ProgressSink,
    ProgressSnapshot,
    SweepJob,
};

pub use config::SweepConfig;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "keysweep");
    }

    #[test]
    fn test_public_api_accessibility() {
        // Ensure key types are accessible at the top level
        let _config = SweepConfig::default();
        let _filter = ExportFilter::All;
        let _state = JobState::Running;

        let kind = ChannelKind::from_str_lossy("openai");
        assert_eq!(kind, ChannelKind::Openai);
    }

    #[test]
    fn test_error_types() {
        let err = AppError::from(errors::JobError::NotFound {
            job_id: "batch_1_0".to_string(),
        });
        assert_eq!(err.category(), "job");
        assert!(!err.is_recoverable());
    }
}
