/// Credential and presentation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CredentialError {
    #[error("issuer key unavailable for {did}: {reason}")]
    MissingIssuerKey { did: String, reason: String },

    #[error("signature verification failed for {did}")]
    SignatureVerificationFailed { did: String },

    #[error("credential expired at {expired_at}")]
    ExpiredCredential { expired_at: String },

    #[error("credential subject {subject} is not the presenting holder {holder}")]
    HolderMismatch { holder: String, subject: String },

    #[error("presentation does not match request: {field}")]
    PresentationMismatch { field: String },

    #[error("document carries no proof")]
    MissingProof,

    #[error("unsupported proof type: {0}")]
    UnsupportedProofType(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("no wallet key for verification method {0}")]
    KeyNotInWallet(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("DID registration failed: {0}")]
    Registration(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] orcl_crypto::CryptoError),

    #[error("identity error: {0}")]
    Identity(#[from] orcl_identity::IdentityError),
}

impl From<serde_json::Error> for CredentialError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Errors raised while driving an exchange protocol.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExchangeError {
    #[error(transparent)]
    InvalidTransition(#[from] orcl_core::CoreError),

    #[error("exchange record not found: {0}")]
    RecordNotFound(String),

    #[error("exchange {record} has no {attachment}")]
    MissingAttachment {
        record: String,
        attachment: &'static str,
    },

    #[error("exchange {0} has nothing verified to accept")]
    NotVerified(String),

    #[error("message {message} does not belong to a {protocol} exchange")]
    UnexpectedMessage {
        message: String,
        protocol: &'static str,
    },

    #[error(transparent)]
    Credential(#[from] CredentialError),
}
