/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("unsupported key format: {0}")]
    UnsupportedKeyFormat(String),

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
