/// Identity-layer errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentityError {
    #[error("DID not found: {0}")]
    DidNotFound(String),

    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("DID is deactivated: {0}")]
    Deactivated(String),

    #[error("verification method {method} not found in {did}")]
    KeyNotFound { did: String, method: String },

    #[error("verification method {method} is not authorized for {purpose}")]
    PurposeNotAuthorized { method: String, purpose: String },

    #[error("invalid DID document: {0}")]
    InvalidDocument(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] orcl_crypto::CryptoError),

    #[error("ledger error: {0}")]
    Ledger(#[from] orcl_ledger::LedgerError),
}
