//! Mapping from a proof's verification method to the key that must have
//! signed it.

use std::sync::Arc;

use orcl_core::parse_did;
use orcl_crypto::PublicKey;
use orcl_ledger::DocumentMetadata;

use crate::document::{DidDocument, ProofPurpose, VerificationMethodType};
use crate::error::IdentityError;
use crate::resolver::DidResolver;

/// A verification key together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedKey {
    pub did: String,
    pub method_id: String,
    pub method_type: VerificationMethodType,
    pub public_key: PublicKey,
}

/// Select the key `method_ref` names in `document`, checking it may be used
/// for `purpose`.
pub fn key_for_method(
    document: &DidDocument,
    metadata: &DocumentMetadata,
    method_ref: &str,
    purpose: ProofPurpose,
) -> Result<TrustedKey, IdentityError> {
    if metadata.deactivated {
        return Err(IdentityError::Deactivated(document.id.clone()));
    }
    let method = document
        .find_method(method_ref)
        .ok_or_else(|| IdentityError::KeyNotFound {
            did: document.id.clone(),
            method: method_ref.to_string(),
        })?;
    let method_id = document.absolute_id(&method.id);
    if !document.authorizes(purpose, &method_id) {
        return Err(IdentityError::PurposeNotAuthorized {
            method: method_id,
            purpose: purpose.to_string(),
        });
    }
    Ok(TrustedKey {
        did: document.id.clone(),
        method_id,
        method_type: method.method_type.clone(),
        public_key: method.public_key()?,
    })
}

/// Resolves verification methods to trusted keys through a DID resolver.
#[derive(Clone)]
pub struct TrustStore {
    resolver: Arc<dyn DidResolver>,
}

impl TrustStore {
    pub fn new(resolver: Arc<dyn DidResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve `did` and return its document.
    pub async fn document(&self, did: &str) -> Result<(DidDocument, DocumentMetadata), IdentityError> {
        let result = self.resolver.resolve(did).await;
        match result.did_document {
            Some(document) => Ok((document, result.did_document_metadata)),
            None => Err(IdentityError::DidNotFound(format!(
                "{} ({})",
                did,
                result
                    .did_resolution_metadata
                    .message
                    .unwrap_or_else(|| "no document".into())
            ))),
        }
    }

    /// Resolve the key a proof references.
    ///
    /// `verification_method` is a DID URL (`did:orcl:<id>#keys-1`); the DID
    /// part is resolved and the fragment looked up in the document.
    pub async fn resolve_key(
        &self,
        verification_method: &str,
        purpose: ProofPurpose,
    ) -> Result<TrustedKey, IdentityError> {
        let parsed = parse_did(verification_method)
            .ok_or_else(|| IdentityError::InvalidDid(verification_method.to_string()))?;
        let (document, metadata) = self.document(&parsed.did).await?;
        let key = key_for_method(&document, &metadata, verification_method, purpose)?;
        tracing::debug!(
            did = %key.did,
            method = %key.method_id,
            purpose = %purpose,
            "verification key resolved"
        );
        Ok(key)
    }
}
