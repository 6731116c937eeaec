use std::sync::Arc;

use serde::{Deserialize, Serialize};

use orcl_core::parse_did;
use orcl_crypto::PublicKey;
use orcl_ledger::{LedgerError, LedgerService, Modification};

use crate::document::{DidDocument, VerificationMethodType, DID_CONTEXT_V1};
use crate::records::{DidRecord, DidRecordStore};
use crate::resolver::{DidResolver, OrclDidResolver};

const REASON_NOT_FOUND: &str = "Did not found";
const REASON_NOTHING_TO_CREATE: &str =
    "Provide a didDocument or at least one verificationMethod with a public key";
const REASON_BOTH_SUPPLIED: &str = "Provide either a didDocument or a verificationMethod, not both";

/// Outcome of a registrar operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidOperationState {
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidState {
    pub state: DidOperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did_document: Option<DidDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Registrar results are values; callers branch on `did_state.state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidRegistrationResult {
    pub did_state: DidState,
}

pub type DidCreateResult = DidRegistrationResult;
pub type DidUpdateResult = DidRegistrationResult;
pub type DidDeactivateResult = DidRegistrationResult;

impl DidRegistrationResult {
    fn finished(document: DidDocument) -> Self {
        Self {
            did_state: DidState {
                state: DidOperationState::Finished,
                did: Some(document.id.clone()),
                did_document: Some(document),
                reason: None,
            },
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            did_state: DidState {
                state: DidOperationState::Failed,
                did: None,
                did_document: None,
                reason: Some(reason.into()),
            },
        }
    }

    pub fn is_finished(&self) -> bool {
        self.did_state.state == DidOperationState::Finished
    }

    pub fn did(&self) -> Option<&str> {
        self.did_state.did.as_deref()
    }

    pub fn document(&self) -> Option<&DidDocument> {
        self.did_state.did_document.as_ref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.did_state.reason.as_deref()
    }
}

/// The key a new DID is registered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVerificationMethod {
    pub method_type: VerificationMethodType,
    pub public_key: PublicKey,
}

impl NewVerificationMethod {
    pub fn ed25519_2018(public_key: PublicKey) -> Self {
        Self {
            method_type: VerificationMethodType::Ed25519VerificationKey2018,
            public_key,
        }
    }

    pub fn ed25519_2020(public_key: PublicKey) -> Self {
        Self {
            method_type: VerificationMethodType::Ed25519VerificationKey2020,
            public_key,
        }
    }

    /// The encoding the ledger publishes for this method type.
    fn ledger_encoding(&self) -> String {
        match self.method_type {
            VerificationMethodType::Ed25519VerificationKey2020 => self.public_key.to_multibase(),
            _ => self.public_key.to_pem(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DidCreateOptions {
    /// A complete document to adopt without touching the ledger.
    pub did_document: Option<DidDocument>,
    pub verification_method: Option<NewVerificationMethod>,
}

#[derive(Debug, Clone)]
pub struct DidUpdateOptions {
    pub did: String,
    pub modification: Modification,
}

#[derive(Debug, Clone)]
pub struct DidDeactivateOptions {
    pub did: String,
}

/// Registers, updates and deactivates `did:orcl` documents.
pub struct DidRegistrar {
    ledger: Arc<dyn LedgerService>,
    records: Arc<DidRecordStore>,
    resolver: Arc<OrclDidResolver>,
}

fn ledger_failure(error: &LedgerError) -> String {
    match error {
        LedgerError::Transaction { raw_log, .. } => format!("unknownError: {}", raw_log),
        other => format!("unknownError: {}", other),
    }
}

impl DidRegistrar {
    pub fn new(
        ledger: Arc<dyn LedgerService>,
        records: Arc<DidRecordStore>,
        resolver: Arc<OrclDidResolver>,
    ) -> Self {
        Self {
            ledger,
            records,
            resolver,
        }
    }

    pub fn records(&self) -> &Arc<DidRecordStore> {
        &self.records
    }

    pub async fn create(&self, options: DidCreateOptions) -> DidCreateResult {
        match (options.did_document, options.verification_method) {
            (Some(_), Some(_)) => DidRegistrationResult::failed(REASON_BOTH_SUPPLIED),
            (None, None) => DidRegistrationResult::failed(REASON_NOTHING_TO_CREATE),
            (Some(document), None) => self.adopt(document),
            (None, Some(method)) => self.register(method).await,
        }
    }

    fn adopt(&self, document: DidDocument) -> DidCreateResult {
        if parse_did(&document.id).is_none() {
            return DidRegistrationResult::failed(format!("Invalid did '{}'", document.id));
        }
        self.records.save(DidRecord::created(document.clone()));
        tracing::info!(did = %document.id, "DID document adopted");
        DidRegistrationResult::finished(document)
    }

    async fn register(&self, method: NewVerificationMethod) -> DidCreateResult {
        let created = match self.ledger.create(&method.ledger_encoding()).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "DID registration failed");
                return DidRegistrationResult::failed(ledger_failure(&e));
            }
        };
        let mut document = match DidDocument::from_value(created) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(error = %e, "ledger returned an unreadable document");
                return DidRegistrationResult::failed(format!("unknownError: {}", e));
            }
        };

        document.context = std::iter::once(DID_CONTEXT_V1)
            .chain(method.method_type.context_url())
            .map(str::to_string)
            .collect();

        self.records.save(DidRecord::created(document.clone()));
        tracing::info!(
            did = %document.id,
            method_type = %method.method_type,
            "DID registered"
        );
        DidRegistrationResult::finished(document)
    }

    /// A DID may be changed only while it resolves, is active, and was
    /// created by this agent.
    async fn owned_active(&self, did: &str) -> Option<DidRecord> {
        let resolved = self.resolver.resolve(did).await;
        if !resolved.is_found() || resolved.is_deactivated() {
            return None;
        }
        self.records.find_created(did).filter(|r| !r.deactivated)
    }

    pub async fn update(&self, options: DidUpdateOptions) -> DidUpdateResult {
        let Some(record) = self.owned_active(&options.did).await else {
            tracing::warn!(did = %options.did, "update of unknown DID");
            return DidRegistrationResult::failed(REASON_NOT_FOUND);
        };

        let controller = record.did_document.controller().to_string();
        if let Err(e) = self
            .ledger
            .update(&options.did, &controller, &options.modification)
            .await
        {
            tracing::error!(did = %options.did, error = %e, "DID update failed");
            return DidRegistrationResult::failed(ledger_failure(&e));
        }
        self.resolver.invalidate(&options.did);

        let updated = self.resolver.resolve(&options.did).await;
        let document = match updated.did_document {
            Some(document) => document,
            None => {
                return DidRegistrationResult::failed(format!(
                    "unknownError: {}",
                    updated
                        .did_resolution_metadata
                        .message
                        .unwrap_or_else(|| "updated document unavailable".into())
                ))
            }
        };
        self.records.update_document(&options.did, document.clone());
        tracing::info!(
            did = %options.did,
            operation = options.modification.operation(),
            "DID updated"
        );
        DidRegistrationResult::finished(document)
    }

    pub async fn deactivate(&self, options: DidDeactivateOptions) -> DidDeactivateResult {
        let Some(record) = self.owned_active(&options.did).await else {
            tracing::warn!(did = %options.did, "deactivation of unknown DID");
            return DidRegistrationResult::failed(REASON_NOT_FOUND);
        };

        if let Err(e) = self.ledger.deactivate(&options.did).await {
            tracing::error!(did = %options.did, error = %e, "DID deactivation failed");
            return DidRegistrationResult::failed(ledger_failure(&e));
        }
        self.resolver.invalidate(&options.did);
        self.records.mark_deactivated(&options.did);
        tracing::info!(did = %options.did, "DID deactivated");
        DidRegistrationResult::finished(record.did_document)
    }
}
