//! Data models for keysweep
//!
//! This module defines the core data structures shared across the engine:
//! the read-only credential and group views supplied by the caller, the
//! channel kind enumeration, and the probe outcome record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream provider family, determining the probe request shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// OpenAI-compatible chat completions API
    Openai,
    /// Google Gemini generateContent API
    Gemini,
    /// Any other provider; carries the raw kind string
    #[serde(untagged)]
    Other(String),
}

impl ChannelKind {
    /// Parse a channel kind from its wire string
    pub fn from_str_lossy(kind: &str) -> Self {
        match kind {
            "openai" => Self::Openai,
            "gemini" => Self::Gemini,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire string for this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::Openai => "openai",
            Self::Gemini => "gemini",
            Self::Other(kind) => kind,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single upstream API credential
///
/// Owned by the caller; the engine holds a read-only view for the duration
/// of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque numeric identifier
    pub id: u64,
    /// The secret used to authenticate against the upstream provider
    pub secret: String,
    /// Owning group
    pub group_id: u64,
}

/// An operator-defined bucket of credentials sharing a channel kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialGroup {
    /// Group identifier
    pub id: u64,
    /// Display name
    pub name: String,
    /// Upstream provider family
    pub channel_kind: ChannelKind,
    /// Overrides the channel's default validation URL when set
    pub validation_endpoint: Option<String>,
}

impl CredentialGroup {
    /// The probe URL for this group: the configured endpoint when present
    /// and non-empty, otherwise the channel default
    pub fn probe_url<'a>(&'a self, default_url: &'a str) -> &'a str {
        match self.validation_endpoint.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => default_url,
        }
    }
}

/// Persisted classification of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    /// The credential authenticated successfully
    Active,
    /// The credential was rejected or otherwise classified unusable
    Invalid,
}

/// The classified result of one credential's probe attempts
///
/// Immutable once produced. Field names match the operator console's wire
/// format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Credential identifier
    pub key_id: u64,
    /// The raw secret, carried through for export
    pub key: String,
    /// Owning group
    pub group_id: u64,
    /// Whether the credential authenticated successfully
    pub valid: bool,
    /// Wall time of the deciding attempt, in milliseconds
    pub response_time_ms: i64,
    /// Classification detail; empty on success
    #[serde(default)]
    pub error_message: String,
    /// When the probe concluded
    pub checked_at: DateTime<Utc>,
}

impl ProbeOutcome {
    /// Whether this outcome was produced by job cancellation rather than a
    /// real classification
    pub fn is_cancellation(&self) -> bool {
        self.error_message == "cancelled"
    }

    /// The status this outcome persists to the credential store
    pub fn status(&self) -> CredentialStatus {
        if self.valid {
            CredentialStatus::Active
        } else {
            CredentialStatus::Invalid
        }
    }
}
