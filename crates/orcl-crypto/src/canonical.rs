//! JSON canonicalization (RFC 8785) and the digest a proof signs.
//!
//! A proof signs `sha256(JCS(proof options)) || sha256(JCS(document))`.
//! The document is taken without its `proof` member and the options without
//! their signature value, so signer and verifier always hash the same bytes.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Proof members that carry the signature itself and are never signed.
const SIGNATURE_FIELDS: [&str; 2] = ["jws", "proofValue"];

/// Serialize `value` in canonical JSON form.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    json_canon::to_string(value).map_err(|e| CryptoError::Canonicalization(e.to_string()))
}

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Compute the bytes a proof signs over `document`.
pub fn signing_input(proof_options: &Value, document: &Value) -> Result<Vec<u8>, CryptoError> {
    let mut options = proof_options.clone();
    if let Some(map) = options.as_object_mut() {
        for field in SIGNATURE_FIELDS {
            map.remove(field);
        }
    }
    let mut unsecured = document.clone();
    if let Some(map) = unsecured.as_object_mut() {
        map.remove("proof");
    }

    let canon_options = canonicalize(&options)?;
    let canon_document = canonicalize(&unsecured)?;
    tracing::trace!(
        options_len = canon_options.len(),
        document_len = canon_document.len(),
        "computed canonical signing input"
    );

    Ok([
        sha256(canon_options.as_bytes()),
        sha256(canon_document.as_bytes()),
    ]
    .concat())
}
