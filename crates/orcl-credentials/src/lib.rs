//! Orcl credentials: issuing and verifying verifiable credentials, holder
//! presentations, the key wallet, and the issue-credential and present-proof
//! exchanges that move them between agents.

pub mod agent;
pub mod credential;
pub mod error;
pub mod exchange;
pub mod model;
pub mod presentation;
pub mod repository;
pub mod wallet;

pub use agent::Agent;
pub use credential::CredentialService;
pub use error::{CredentialError, ExchangeError};
pub use exchange::{
    AgentMessage, CredentialExchangeRecord, CredentialExchangeService, ExchangeOutcome,
    MessageBody, ProofExchangeRecord, ProofExchangeService, Protocol,
};
pub use model::{
    CredentialSubject, Proof, VerifiableCredential, VerifiablePresentation,
    CREDENTIALS_CONTEXT_V1, ED25519_SIGNATURE_2018, ED25519_SIGNATURE_2020,
};
pub use presentation::{
    PresentationProofOptions, PresentationService, ProofDetail, ProofDetailOptions,
    VerificationFailure, VerificationLayer, VerificationResult,
};
pub use repository::{CredentialRecord, CredentialRepository, InMemoryCredentialRepository};
pub use wallet::{Wallet, WalletKey};
