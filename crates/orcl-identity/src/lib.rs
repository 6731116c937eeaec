//! Orcl identity: DID documents, resolution against the ledger,
//! registration, and the mapping from verification methods to trusted keys.

pub mod document;
pub mod error;
pub mod records;
pub mod registrar;
pub mod resolver;
pub mod trust;

pub use document::{
    DidDocument, ProofPurpose, VerificationMethod, VerificationMethodType,
    VerificationRelationship, DID_CONTEXT_V1,
};
pub use error::IdentityError;
pub use records::{DidDocumentRole, DidRecord, DidRecordStore};
pub use registrar::{
    DidCreateOptions, DidCreateResult, DidDeactivateOptions, DidDeactivateResult,
    DidOperationState, DidRegistrar, DidRegistrationResult, DidState, DidUpdateOptions,
    DidUpdateResult, NewVerificationMethod,
};
pub use resolver::{
    DidResolutionResult, DidResolver, OrclDidResolver, ResolutionMetadata, ResolverRegistry,
    ERROR_INVALID_DID_URL, ERROR_METHOD_NOT_SUPPORTED, ERROR_NOT_FOUND,
};
pub use trust::{key_for_method, TrustStore, TrustedKey};
