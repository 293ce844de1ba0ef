//! Error types for the ledger

use crate::types::AccountId;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Amount is not a positive integer (or would overflow the balance)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Kind is neither credit nor debit
    #[error("Invalid kind: {0:?}")]
    InvalidKind(String),

    /// Description length outside 1..=10 characters
    #[error("Invalid description length: {0}")]
    InvalidDescription(usize),

    /// Account id outside the provisioned set
    #[error("Unknown account: {0}")]
    UnknownAccount(i64),

    /// Debit would take the balance below `-limit`
    #[error("Limit exceeded on account {account_id}: balance {balance}, limit {limit}, debit {amount}")]
    LimitExceeded {
        /// Account
        account_id: AccountId,
        /// Balance before the rejected debit
        balance: i64,
        /// Account limit
        limit: i64,
        /// Rejected amount
        amount: i64,
    },

    /// Storage error (RocksDB)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Deadline elapsed before the operation completed
    #[error("Operation timed out")]
    Timeout,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Business-rule rejection, as opposed to an infrastructure failure.
    ///
    /// Rejections leave all state unchanged and are never retried.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::InvalidKind(_)
                | Error::InvalidDescription(_)
                | Error::UnknownAccount(_)
                | Error::LimitExceeded { .. }
        )
    }

    /// Stable tag for logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InvalidKind(_) => "invalid_kind",
            Error::InvalidDescription(_) => "invalid_description",
            Error::UnknownAccount(_) => "unknown_account",
            Error::LimitExceeded { .. } => "limit_exceeded",
            Error::StorageUnavailable(_) => "storage_unavailable",
            Error::Timeout => "timeout",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}
