use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::Signer;
use rand::RngCore;

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

/// Ed25519 signature (64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    inner: ed25519_dalek::Signature,
}

impl Signature {
    /// Get the raw bytes (64 bytes).
    pub fn to_bytes(&self) -> [u8; 64] {
        self.inner.to_bytes()
    }

    /// Create from raw bytes (64 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_arr: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidInput(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        let inner = ed25519_dalek::Signature::from_bytes(&bytes_arr);
        Ok(Self { inner })
    }

    /// Encode as base64, the form embedded in a proof's `jws`.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode from base64.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid base64 signature: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

/// Sign a message using Ed25519.
pub fn sign(message: &[u8], keypair: &KeyPair) -> Signature {
    let sig = keypair.signing_key().sign(message);
    Signature { inner: sig }
}

/// Verify an Ed25519 signature.
pub fn verify(message: &[u8], signature: &Signature, pubkey: &PublicKey) -> Result<(), CryptoError> {
    pubkey
        .verifying_key()
        .verify_strict(message, &signature.inner)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

/// Generate a random nonce for challenges, as 32 lowercase hex characters.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn test_sign_verify_roundtrip() {
        let kp = KeyPair::generate();
        let message = b"hello orcl";
        let sig = sign(message, &kp);
        assert!(verify(message, &sig, &kp.public_key()).is_ok());
    }

    #[test]
    fn test_verify_wrong_message_fails() {
        let kp = KeyPair::generate();
        let sig = sign(b"correct message", &kp);
        let result = verify(b"wrong message", &sig, &kp.public_key());
        assert_eq!(result, Err(CryptoError::SignatureVerificationFailed));
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let sig = sign(b"test message", &kp1);
        let result = verify(b"test message", &sig, &kp2.public_key());
        assert!(result.is_err());
    }

    #[test]
    fn test_signature_base64() {
        let kp = KeyPair::generate();
        let sig = sign(b"test", &kp);
        let encoded = sig.to_base64();
        assert_eq!(Signature::from_base64(&encoded).unwrap(), sig);
        assert!(Signature::from_base64("!!!").is_err());
        assert!(Signature::from_base64("AAAA").is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let kp = KeyPair::from_seed(&[99u8; 32]);
        let sig1 = sign(b"deterministic test", &kp);
        let sig2 = sign(b"deterministic test", &kp);
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_nonce_is_fresh() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
