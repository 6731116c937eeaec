use async_trait::async_trait;
use serde_json::Value;

use crate::error::LedgerError;
use crate::modification::Modification;
use crate::wire::{LedgerDocument, LedgerResponse};

/// A ledger holding DID documents.
///
/// Every failure is returned as a value. A non-zero transaction code from
/// `update` or `deactivate` is reported as [`LedgerError::Transaction`]
/// with the ledger's raw log.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Mint a DID document around `public_key` and return it.
    async fn create(&self, public_key: &str) -> Result<Value, LedgerError>;

    /// Fetch a DID document. `Ok(None)` when the ledger has no such DID.
    async fn resolve(&self, did: &str) -> Result<Option<LedgerDocument>, LedgerError>;

    /// Apply a verification-method modification.
    async fn update(
        &self,
        did: &str,
        controller: &str,
        modification: &Modification,
    ) -> Result<LedgerResponse, LedgerError>;

    /// Tombstone a DID document. Irreversible.
    async fn deactivate(&self, did: &str) -> Result<LedgerResponse, LedgerError>;
}

/// Map a transaction response with a non-zero code to an error.
pub(crate) fn check_response(response: LedgerResponse) -> Result<LedgerResponse, LedgerError> {
    if response.code != 0 {
        return Err(LedgerError::Transaction {
            code: response.code,
            raw_log: response.raw_log,
        });
    }
    Ok(response)
}
