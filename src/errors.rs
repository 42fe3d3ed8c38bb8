//! Error types for keysweep
//!
//! This module defines the error types for all components of the engine.
//! Errors are structured by domain so callers can map them onto transport
//! status codes without inspecting message strings.

use thiserror::Error;

/// Configuration errors
///
/// Surfaced at submit time or on `update_config`; no job is created when
/// configuration is rejected.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration value is outside its allowed range
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Configuration file could not be parsed
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// I/O error reading a configuration file
    #[error("I/O error reading configuration")]
    Io(#[from] std::io::Error),
}

/// Probe transport errors
///
/// These occur *inside* the retry loop and are recoverable up to
/// `max_retries`. An HTTP response, whatever its status, is never an error:
/// it is a classified [`ProbeVerdict`](crate::app::probe::ProbeVerdict).
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Transport-level failure (DNS, TCP, TLS, connection reset)
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The per-attempt timeout elapsed before a response arrived
    #[error("attempt timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The job was cancelled while the attempt was in flight
    #[error("cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        ProbeError::Transport {
            reason: err.to_string(),
        }
    }
}

/// Job lifecycle and operator-API errors
#[derive(Error, Debug)]
pub enum JobError {
    /// No job registered under the given id
    #[error("job not found: {job_id}")]
    NotFound { job_id: String },

    /// Group lookup failed at submit time
    #[error("group not found: {group_id}")]
    GroupNotFound { group_id: u64 },

    /// The group exists but holds no credentials to sweep
    #[error("no credentials to check in group {group_id}")]
    NoCredentials { group_id: u64 },

    /// Pause requested while the job is not in a pausable state
    #[error("job {job_id} cannot be paused")]
    NotPausable { job_id: String },

    /// Resume requested while no pause is pending
    #[error("job {job_id} is not paused")]
    NotPaused { job_id: String },

    /// Invalid submit-time parameter (batch size, concurrency)
    #[error("invalid {field}: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },
}

/// Credential store errors
///
/// Write-back failures are logged and swallowed by the engine; lookups at
/// submit time propagate to the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend failure (database, network)
    #[error("credential store error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Create a backend error from any displayable cause
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Result export errors
#[derive(Error, Debug)]
pub enum ExportError {
    /// Unknown export format requested
    #[error("unsupported export format: {format}")]
    UnsupportedFormat { format: String },

    /// Serialization of the JSON envelope failed
    #[error("export serialization failed")]
    Serialization(#[from] serde_json::Error),
}

/// Progress-sink delivery errors
///
/// A failing sink is removed from the broadcast set; delivery errors never
/// propagate to the job or to other sinks.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink's receiving side has gone away
    #[error("sink closed")]
    Closed,

    /// Delivery did not complete within the bounded window
    #[error("sink delivery timed out")]
    Timeout,

    /// Transport-specific delivery failure
    #[error("sink delivery failed: {0}")]
    Delivery(String),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Probe transport error
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Job lifecycle error
    #[error(transparent)]
    Job(#[from] JobError),

    /// Credential store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Export error
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Probe(ProbeError::Transport { .. })
                | AppError::Probe(ProbeError::Timeout { .. })
                | AppError::Store(StoreError::Backend { .. })
        )
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Probe(_) => "probe",
            AppError::Job(_) => "job",
            AppError::Store(_) => "store",
            AppError::Export(_) => "export",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Probe result type alias
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Job result type alias
pub type JobResult<T> = std::result::Result<T, JobError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Export result type alias
pub type ExportResult<T> = std::result::Result<T, ExportError>;
