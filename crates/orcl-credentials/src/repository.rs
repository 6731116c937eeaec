use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CredentialError;
use crate::model::VerifiableCredential;

/// A stored credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    pub credential: VerifiableCredential,
    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(credential: VerifiableCredential) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            issuer: credential.issuer.clone(),
            holder: credential.subject_did().map(str::to_string),
            credential,
            created_at: Utc::now(),
        }
    }
}

/// Storage for credentials an agent issued or holds.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn save(&self, record: CredentialRecord) -> Result<(), CredentialError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<CredentialRecord>, CredentialError>;

    async fn find_by_issuer(&self, issuer: &str) -> Result<Vec<CredentialRecord>, CredentialError>;

    async fn find_by_holder(&self, holder: &str) -> Result<Vec<CredentialRecord>, CredentialError>;

    /// One page of records, oldest first. Pages start at 1.
    async fn list(&self, per_page: usize, page: usize) -> Result<Vec<CredentialRecord>, CredentialError>;

    async fn remove(&self, id: &str) -> Result<bool, CredentialError>;
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    records: DashMap<String, CredentialRecord>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect<F>(&self, filter: F) -> Vec<CredentialRecord>
    where
        F: Fn(&CredentialRecord) -> bool,
    {
        let mut records: Vec<CredentialRecord> = self
            .records
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn save(&self, record: CredentialRecord) -> Result<(), CredentialError> {
        tracing::debug!(record_id = %record.id, issuer = %record.issuer, "credential record saved");
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CredentialRecord>, CredentialError> {
        Ok(self.records.get(id).map(|entry| entry.clone()))
    }

    async fn find_by_issuer(&self, issuer: &str) -> Result<Vec<CredentialRecord>, CredentialError> {
        Ok(self.collect(|record| record.issuer == issuer))
    }

    async fn find_by_holder(&self, holder: &str) -> Result<Vec<CredentialRecord>, CredentialError> {
        Ok(self.collect(|record| record.holder.as_deref() == Some(holder)))
    }

    async fn list(&self, per_page: usize, page: usize) -> Result<Vec<CredentialRecord>, CredentialError> {
        if per_page == 0 || page == 0 {
            return Err(CredentialError::Storage(format!(
                "invalid page {} of size {}",
                page, per_page
            )));
        }
        Ok(self
            .collect(|_| true)
            .into_iter()
            .skip(per_page * (page - 1))
            .take(per_page)
            .collect())
    }

    async fn remove(&self, id: &str) -> Result<bool, CredentialError> {
        Ok(self.records.remove(id).is_some())
    }
}
