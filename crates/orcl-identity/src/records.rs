use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::document::DidDocument;

/// How the local agent came to know a DID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidDocumentRole {
    /// Registered by this agent; it may update or deactivate it.
    Created,
    /// Learned from a peer.
    Received,
}

/// A DID known to the local agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidRecord {
    pub did: String,
    pub role: DidDocumentRole,
    pub did_document: DidDocument,
    pub deactivated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DidRecord {
    pub fn created(did_document: DidDocument) -> Self {
        let now = Utc::now();
        Self {
            did: did_document.id.clone(),
            role: DidDocumentRole::Created,
            did_document,
            deactivated: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Local store of DID records, keyed by DID.
#[derive(Debug, Default)]
pub struct DidRecordStore {
    records: DashMap<String, DidRecord>,
}

impl DidRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, record: DidRecord) {
        tracing::debug!(did = %record.did, role = ?record.role, "DID record saved");
        self.records.insert(record.did.clone(), record);
    }

    pub fn get(&self, did: &str) -> Option<DidRecord> {
        self.records.get(did).map(|entry| entry.clone())
    }

    /// The record of a DID this agent registered itself.
    pub fn find_created(&self, did: &str) -> Option<DidRecord> {
        self.records
            .get(did)
            .filter(|entry| entry.role == DidDocumentRole::Created)
            .map(|entry| entry.clone())
    }

    /// Replace the stored document of an existing record.
    pub fn update_document(&self, did: &str, document: DidDocument) -> bool {
        match self.records.get_mut(did) {
            Some(mut entry) => {
                entry.did_document = document;
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn mark_deactivated(&self, did: &str) -> bool {
        match self.records.get_mut(did) {
            Some(mut entry) => {
                entry.deactivated = true;
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// DIDs this agent created and has not deactivated.
    pub fn active_created(&self) -> Vec<DidRecord> {
        self.records
            .iter()
            .filter(|entry| entry.role == DidDocumentRole::Created && !entry.deactivated)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
