//! Credit Ledger Core
//!
//! Fixed population of accounts with credit limits, accepting credit and
//! debit transactions and serving consistent statements.
//!
//! # Architecture
//!
//! - **Account Store / Transaction Log**: RocksDB column families, written
//!   together in one atomic batch
//! - **Per-account actors**: one writer task per account serializes every
//!   apply and statement on that account; distinct accounts run in parallel
//! - **Account Resolver**: O(1) lookup over the configured account set
//!
//! # Invariants
//!
//! - Overdraft: `balance >= -limit` for every account, at all times
//! - Append-only: transactions are never modified or deleted
//! - Atomicity: a balance change and its log entry persist together or not at all
//! - Linearizable per account: each apply observes every completed apply before it

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod ledger;
pub mod error;
pub mod actor;
pub mod config;
pub mod resolver;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Account, AccountId, Receipt, Statement, Transaction, TransactionKind, TransactionRequest,
};
pub use ledger::Ledger;
pub use config::{AccountSeed, Config};
pub use storage::Storage;
