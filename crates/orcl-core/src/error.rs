/// Core protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid state transition from {from} on {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("exchange is in terminal state {0}")]
    TerminalState(String),

    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}
