//! Orcl ledger: the DID document store behind `did:orcl`.
//!
//! [`HttpLedgerClient`] talks to a chaincode gateway; [`InMemoryLedger`]
//! implements the same [`LedgerService`] contract in process.

pub mod error;
pub mod http;
pub mod memory;
pub mod modification;
pub mod retry;
pub mod service;
pub mod wire;

pub use error::LedgerError;
pub use http::HttpLedgerClient;
pub use memory::InMemoryLedger;
pub use modification::Modification;
pub use retry::RetryPolicy;
pub use service::LedgerService;
pub use wire::{DocumentMetadata, LedgerDocument, LedgerResponse};
