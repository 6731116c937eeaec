//! An in-process ledger with the same contract as the chaincode gateway.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};

use orcl_core::Did;

use crate::error::LedgerError;
use crate::modification::{Modification, RELATIONSHIPS};
use crate::service::LedgerService;
use crate::wire::{DocumentMetadata, LedgerDocument, LedgerResponse};

const CODE_NOT_FOUND: u32 = 5;
const CODE_UNAUTHORIZED: u32 = 4;
const CODE_CONFLICT: u32 = 18;

struct Entry {
    document: Value,
    deactivated: bool,
}

/// In-memory DID ledger.
///
/// Documents are keyed by DID. Deactivated documents stay resolvable with
/// `deactivated = true` and reject every further transaction.
#[derive(Default)]
pub struct InMemoryLedger {
    documents: DashMap<String, Entry>,
    tx_counter: AtomicU64,
    offline: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable ledger: every call fails with a transport
    /// error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of DID documents ever created.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn ensure_online(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("ledger unreachable".into()));
        }
        Ok(())
    }

    fn committed(&self, log: impl Into<String>) -> LedgerResponse {
        let tx = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        LedgerResponse {
            code: 0,
            raw_log: log.into(),
            tx_hash: Some(format!("{:064x}", tx)),
        }
    }

    fn reject(code: u32, raw_log: impl Into<String>) -> LedgerError {
        LedgerError::Transaction {
            code,
            raw_log: raw_log.into(),
        }
    }
}

/// Build the document the ledger publishes for a freshly registered key.
fn initial_document(did: &str, public_key: &str) -> Value {
    let key_id = format!("{}#keys-1", did);
    let mut method = json!({
        "id": key_id,
        "type": "Ed25519VerificationKey2018",
        "controller": did,
    });
    let field = if public_key.trim_start().starts_with("-----BEGIN") {
        "publicKeyPem"
    } else {
        "publicKeyMultibase"
    };
    method[field] = Value::String(public_key.to_string());

    json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": did,
        "controller": did,
        "verificationMethod": [method],
        "authentication": [key_id],
        "assertionMethod": [key_id],
    })
}

/// Method ids may be absolute (`did#frag`) or relative (`#frag`).
fn same_method(did: &str, a: &str, b: &str) -> bool {
    let absolute = |id: &str| {
        if id.starts_with('#') {
            format!("{}{}", did, id)
        } else {
            id.to_string()
        }
    };
    absolute(a) == absolute(b)
}

fn reference_id(entry: &Value) -> Option<&str> {
    entry
        .as_str()
        .or_else(|| entry.get("id").and_then(Value::as_str))
}

fn apply(did: &str, document: &mut Value, modification: &Modification) -> Result<(), LedgerError> {
    let object = document
        .as_object_mut()
        .ok_or_else(|| InMemoryLedger::reject(CODE_CONFLICT, "stored document is not an object"))?;

    match modification {
        Modification::AddNewMethod { method } => {
            let new_id = modification.method_id().unwrap_or_default().to_string();
            let methods = object
                .entry("verificationMethod")
                .or_insert_with(|| Value::Array(Vec::new()));
            let list = methods
                .as_array_mut()
                .ok_or_else(|| InMemoryLedger::reject(CODE_CONFLICT, "verificationMethod is not a list"))?;
            if list
                .iter()
                .filter_map(reference_id)
                .any(|id| same_method(did, id, &new_id))
            {
                return Err(InMemoryLedger::reject(
                    CODE_CONFLICT,
                    format!("method {} already exists", new_id),
                ));
            }
            list.push(method.clone());
        }
        Modification::AddMethod {
            relationship,
            method_id,
        } => {
            let known = object
                .get("verificationMethod")
                .and_then(Value::as_array)
                .is_some_and(|list| {
                    list.iter()
                        .filter_map(reference_id)
                        .any(|id| same_method(did, id, method_id))
                });
            if !known {
                return Err(InMemoryLedger::reject(
                    CODE_NOT_FOUND,
                    format!("method {} not found", method_id),
                ));
            }
            let list = object
                .entry(relationship.as_str())
                .or_insert_with(|| Value::Array(Vec::new()))
                .as_array_mut()
                .ok_or_else(|| InMemoryLedger::reject(CODE_CONFLICT, format!("{} is not a list", relationship)))?;
            if !list
                .iter()
                .filter_map(reference_id)
                .any(|id| same_method(did, id, method_id))
            {
                list.push(Value::String(method_id.clone()));
            }
        }
        Modification::RemoveMethod {
            relationship,
            method_id,
        } => {
            let list = object
                .get_mut(relationship.as_str())
                .and_then(Value::as_array_mut)
                .ok_or_else(|| {
                    InMemoryLedger::reject(CODE_NOT_FOUND, format!("{} is empty", relationship))
                })?;
            let before = list.len();
            list.retain(|entry| !reference_id(entry).is_some_and(|id| same_method(did, id, method_id)));
            if list.len() == before {
                return Err(InMemoryLedger::reject(
                    CODE_NOT_FOUND,
                    format!("method {} not found in {}", method_id, relationship),
                ));
            }
            if relationship == "verificationMethod" {
                if list.is_empty() {
                    return Err(InMemoryLedger::reject(
                        CODE_CONFLICT,
                        format!("{} is the last verification method", method_id),
                    ));
                }
                // a removed method is no longer referenced by any relationship
                for name in RELATIONSHIPS.iter().filter(|name| **name != "verificationMethod") {
                    if let Some(references) = object.get_mut(*name).and_then(Value::as_array_mut) {
                        references.retain(|entry| {
                            !reference_id(entry).is_some_and(|id| same_method(did, id, method_id))
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

#[async_trait]
impl LedgerService for InMemoryLedger {
    async fn create(&self, public_key: &str) -> Result<Value, LedgerError> {
        self.ensure_online()?;
        let did = Did::new_orcl();
        let document = initial_document(did.as_str(), public_key);
        self.documents.insert(
            did.to_string(),
            Entry {
                document: document.clone(),
                deactivated: false,
            },
        );
        tracing::debug!(did = %did, "ledger document created");
        Ok(document)
    }

    async fn resolve(&self, did: &str) -> Result<Option<LedgerDocument>, LedgerError> {
        self.ensure_online()?;
        Ok(self.documents.get(did).map(|entry| LedgerDocument {
            did_document: entry.document.clone(),
            did_document_metadata: DocumentMetadata {
                deactivated: entry.deactivated,
                ..DocumentMetadata::default()
            },
        }))
    }

    async fn update(
        &self,
        did: &str,
        controller: &str,
        modification: &Modification,
    ) -> Result<LedgerResponse, LedgerError> {
        modification.validate()?;
        self.ensure_online()?;

        let mut entry = self
            .documents
            .get_mut(did)
            .ok_or_else(|| Self::reject(CODE_NOT_FOUND, format!("document {} not found", did)))?;
        if entry.deactivated {
            return Err(Self::reject(
                CODE_NOT_FOUND,
                format!("document {} is deactivated", did),
            ));
        }
        let stored_controller = entry
            .document
            .get("controller")
            .and_then(Value::as_str)
            .unwrap_or(did);
        if stored_controller != controller {
            return Err(Self::reject(
                CODE_UNAUTHORIZED,
                format!("{} does not control {}", controller, did),
            ));
        }

        // apply to a copy so a failed modification leaves the document intact
        let mut document = entry.document.clone();
        apply(did, &mut document, modification)?;
        entry.document = document;

        Ok(self.committed(format!("{} applied", modification.operation())))
    }

    async fn deactivate(&self, did: &str) -> Result<LedgerResponse, LedgerError> {
        self.ensure_online()?;
        let mut entry = self
            .documents
            .get_mut(did)
            .ok_or_else(|| Self::reject(CODE_NOT_FOUND, format!("document {} not found", did)))?;
        if entry.deactivated {
            return Err(Self::reject(
                CODE_NOT_FOUND,
                format!("document {} is deactivated", did),
            ));
        }
        entry.deactivated = true;
        tracing::debug!(did = %did, "ledger document deactivated");
        Ok(self.committed("document deactivated"))
    }
}
