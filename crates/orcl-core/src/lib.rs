//! Orcl Core: DID syntax, exchange state machines, errors and agent
//! configuration shared by every Orcl crate.

pub mod config;
pub mod did;
pub mod error;
pub mod issuance_state;
pub mod proof_state;

pub use config::{
    AgentConfig, CredentialConfig, ExpiryPolicy, LedgerConfig, LoggingConfig, PresentationConfig,
    ResolverConfig,
};
pub use did::{parse_did, parse_orcl_did, Did, ParsedDid, ORCL_METHOD};
pub use error::CoreError;
pub use issuance_state::{
    IssuanceEffect, IssuanceEvent, IssuanceState, IssuanceStateMachine, IssuanceTransition,
};
pub use proof_state::{
    ProofEffect, ProofEvent, ProofExchangeState, ProofStateMachine, ProofTransition, Role,
};
