/// Ledger transport and transaction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger transaction failed with code {code}: {raw_log}")]
    Transaction { code: u32, raw_log: String },

    #[error("ledger request timed out after {0} ms")]
    Timeout(u64),

    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("ledger returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("invalid modification: {0}")]
    InvalidModification(String),

    #[error("ledger client configuration error: {0}")]
    Config(String),
}
