//! Credential store interface
//!
//! The engine consumes a [`CredentialStore`] supplied by the embedding
//! application: it lists the credentials of a group at submit time and
//! receives classification write-backs after each probe. Persistence
//! failures are logged and never fail the job.
//!
//! [`MemoryCredentialStore`] is an in-process implementation used by the
//! test suite and by embedders that manage persistence elsewhere.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::models::{Credential, CredentialGroup, CredentialStatus};
use crate::errors::StoreResult;

/// Capability the engine needs from the surrounding credential database
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a group by id
    async fn find_group(&self, group_id: u64) -> StoreResult<Option<CredentialGroup>>;

    /// List all credentials belonging to a group, in storage order
    async fn list_credentials_by_group(&self, group_id: u64) -> StoreResult<Vec<Credential>>;

    /// Persist a classification: `Active` clears the stored error,
    /// `Invalid` records it
    async fn update_credential_status(
        &self,
        credential_id: u64,
        status: CredentialStatus,
        last_error: &str,
    ) -> StoreResult<()>;
}

/// A stored credential together with its last classification
#[derive(Debug, Clone)]
pub struct StoredCredential {
    /// The credential itself
    pub credential: Credential,
    /// Last persisted classification, if any sweep has reached it
    pub status: Option<CredentialStatus>,
    /// Error recorded with the last `Invalid` classification
    pub last_error: String,
}

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    groups: RwLock<HashMap<u64, CredentialGroup>>,
    credentials: RwLock<HashMap<u64, StoredCredential>>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a group
    pub async fn insert_group(&self, group: CredentialGroup) {
        self.groups.write().await.insert(group.id, group);
    }

    /// Insert or replace a credential
    pub async fn insert_credential(&self, credential: Credential) {
        self.credentials.write().await.insert(
            credential.id,
            StoredCredential {
                credential,
                status: None,
                last_error: String::new(),
            },
        );
    }

    /// Read back a credential's persisted state (test observability)
    pub async fn stored(&self, credential_id: u64) -> Option<StoredCredential> {
        self.credentials.read().await.get(&credential_id).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_group(&self, group_id: u64) -> StoreResult<Option<CredentialGroup>> {
        Ok(self.groups.read().await.get(&group_id).cloned())
    }

    async fn list_credentials_by_group(&self, group_id: u64) -> StoreResult<Vec<Credential>> {
        let credentials = self.credentials.read().await;
        let mut listed: Vec<Credential> = credentials
            .values()
            .filter(|stored| stored.credential.group_id == group_id)
            .map(|stored| stored.credential.clone())
            .collect();
        // HashMap iteration order is arbitrary; storage order is by id
        listed.sort_by_key(|credential| credential.id);
        Ok(listed)
    }

    async fn update_credential_status(
        &self,
        credential_id: u64,
        status: CredentialStatus,
        last_error: &str,
    ) -> StoreResult<()> {
        let mut credentials = self.credentials.write().await;
        if let Some(stored) = credentials.get_mut(&credential_id) {
            stored.status = Some(status);
            stored.last_error = match status {
                CredentialStatus::Active => String::new(),
                CredentialStatus::Invalid => last_error.to_string(),
            };
        }
        Ok(())
    }
}
