use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::key_codec;

/// Ed25519 key pair for signing operations.
/// Private key material is zeroized on drop.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair using OS-provided entropy.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Create a key pair from raw private key bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(bytes);
        let kp = Self::from_seed(&seed);
        seed.zeroize();
        Ok(kp)
    }

    /// Import a PKCS#8 DER private key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        let raw = Zeroizing::new(key_codec::strip_private_key_to_raw(der)?);
        Self::from_bytes(&raw)
    }

    /// Import a PEM-encoded PKCS#8 private key.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        match key_codec::pem_to_key_material(pem)? {
            key_codec::RawKey::Private(raw) => Self::from_bytes(&raw[..]),
            key_codec::RawKey::Public(_) => Err(CryptoError::MalformedKey(
                "expected a private key, found a public key".into(),
            )),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Get the raw private key bytes (32 bytes).
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Export as PKCS#8 DER.
    pub fn to_pkcs8_der(&self) -> Zeroizing<Vec<u8>> {
        key_codec::private_key_to_pkcs8_der(&self.secret_bytes())
    }

    /// Export as a PEM-encoded PKCS#8 private key.
    pub fn to_pem(&self) -> Zeroizing<String> {
        Zeroizing::new(key_codec::der_to_pem("PRIVATE KEY", &self.to_pkcs8_der()))
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key().to_hex())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key for verification operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    /// Create from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        let verifying_key = VerifyingKey::from_bytes(&bytes_arr)
            .map_err(|e| CryptoError::MalformedKey(format!("invalid public key: {}", e)))?;
        Ok(Self { verifying_key })
    }

    /// Get the raw bytes (32 bytes).
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.verifying_key.as_bytes()
    }

    /// Encode as hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Decode from hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Export as SubjectPublicKeyInfo DER.
    pub fn to_spki_der(&self) -> Vec<u8> {
        key_codec::public_key_to_spki_der(self.as_bytes())
    }

    /// Export as a PEM-encoded SubjectPublicKeyInfo, the form published to
    /// the ledger.
    pub fn to_pem(&self) -> String {
        key_codec::der_to_pem("PUBLIC KEY", &self.to_spki_der())
    }

    /// Import a PEM-encoded SubjectPublicKeyInfo.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        match key_codec::pem_to_key_material(pem)? {
            key_codec::RawKey::Public(raw) => Self::from_bytes(&raw),
            key_codec::RawKey::Private(_) => Err(CryptoError::MalformedKey(
                "expected a public key, found a private key".into(),
            )),
        }
    }

    /// Encode as a multibase (`z` base58btc) multicodec key.
    pub fn to_multibase(&self) -> String {
        key_codec::public_key_to_multibase(self.as_bytes())
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }
}
