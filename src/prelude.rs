//! Prelude module for keysweep
//!
//! Re-exports the items needed for typical embeddings so a single
//! `use keysweep::prelude::*;` is enough to wire the engine into a proxy.

// Core result types
pub use crate::errors::{AppError, Result};

// Engine surface
pub use crate::app::{
    ChannelKind, ChannelProbe, ChannelSink, Credential, CredentialGroup, CredentialStatus,
    CredentialStore, ExportFilter, ExportFormat, JobManager, JobManagerBuilder, JobState,
    MemoryCredentialStore, ProbeOutcome, ProbeRegistry, ProgressSink, ProgressSnapshot, SweepJob,
};

// Configuration
pub use crate::config::SweepConfig;
