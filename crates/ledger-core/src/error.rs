use thiserror::Error;

/// Why an incoming block was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockRejection {
    #[error("previous hash {found} does not match head {expected}")]
    PreviousHashMismatch { expected: String, found: String },

    #[error("hash of block {index} does not match its contents")]
    HashMismatch { index: u64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient balance: {sender} holds {balance}, tried to send {amount}")]
    InsufficientBalance {
        sender: String,
        balance: f64,
        amount: f64,
    },

    #[error("invalid block: {0}")]
    InvalidBlock(#[from] BlockRejection),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
