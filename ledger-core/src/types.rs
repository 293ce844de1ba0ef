//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Integer arithmetic (amounts are whole units, never floats)
//! - Immutability of logged transactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Maximum description length, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 10;

/// Number of transactions returned in a statement
pub const STATEMENT_DEPTH: usize = 10;

/// Account identifier drawn from the provisioned set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(u32);

impl AccountId {
    /// Create new account ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get as integer
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Big-endian key bytes, used as the storage prefix for this account
    pub fn to_be_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionKind {
    /// Adds to the balance
    Credit = 1,
    /// Subtracts from the balance
    Debit = 2,
}

impl TransactionKind {
    /// Wire code (`c` or `d`)
    pub fn code(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "c",
            TransactionKind::Debit => "d",
        }
    }

    /// Parse from wire code
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "c" => Some(TransactionKind::Credit),
            "d" => Some(TransactionKind::Debit),
            _ => None,
        }
    }

    /// Signed balance delta for a positive magnitude
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            TransactionKind::Credit => amount,
            TransactionKind::Debit => -amount,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Persisted account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub id: AccountId,

    /// Maximum overdraft (immutable after provisioning)
    pub limit: i64,

    /// Current balance, never below `-limit`
    pub balance: i64,

    /// Number of transactions logged for this account; next log sequence
    pub transaction_count: u64,
}

impl Account {
    /// Fresh account with zero balance
    pub fn open(id: AccountId, limit: i64) -> Self {
        Self {
            id,
            limit,
            balance: 0,
            transaction_count: 0,
        }
    }

    /// Compute the account after applying `tx`, or reject it.
    ///
    /// Pure: `self` is left untouched either way.
    pub fn after(&self, tx: &ValidTransaction) -> Result<Account> {
        let delta = tx.kind.signed(tx.amount);
        let balance = self
            .balance
            .checked_add(delta)
            .ok_or(Error::InvalidAmount(tx.amount))?;

        if tx.kind == TransactionKind::Debit && balance < -self.limit {
            return Err(Error::LimitExceeded {
                account_id: self.id,
                balance: self.balance,
                limit: self.limit,
                amount: tx.amount,
            });
        }

        Ok(Account {
            id: self.id,
            limit: self.limit,
            balance,
            transaction_count: self.transaction_count + 1,
        })
    }
}

/// Raw, unvalidated transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Wire kind code, expected `c` or `d`
    pub kind: String,

    /// Magnitude, expected positive
    pub amount: i64,

    /// Free text, 1..=10 characters
    pub description: String,
}

impl TransactionRequest {
    /// Create new request
    pub fn new(kind: impl Into<String>, amount: i64, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            amount,
            description: description.into(),
        }
    }

    /// Check amount, kind and description, in that order
    pub fn validate(self) -> Result<ValidTransaction> {
        if self.amount <= 0 {
            return Err(Error::InvalidAmount(self.amount));
        }

        let kind = TransactionKind::parse(&self.kind).ok_or(Error::InvalidKind(self.kind))?;

        let len = self.description.chars().count();
        if len == 0 || len > MAX_DESCRIPTION_CHARS {
            return Err(Error::InvalidDescription(len));
        }

        Ok(ValidTransaction {
            kind,
            amount: self.amount,
            description: self.description,
        })
    }
}

/// Transaction input that passed every stateless check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTransaction {
    /// Kind
    pub kind: TransactionKind,
    /// Positive magnitude
    pub amount: i64,
    /// Description, 1..=10 characters
    pub description: String,
}

/// Logged transaction (immutable)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Account this transaction was applied to
    pub account_id: AccountId,

    /// Per-account log position, starting at 1
    pub sequence: u64,

    /// Kind
    pub kind: TransactionKind,

    /// Positive magnitude
    pub amount: i64,

    /// Description
    pub description: String,

    /// Assigned at the moment of application
    pub occurred_at: DateTime<Utc>,
}

/// Result of a successful apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Balance after the transaction
    pub balance: i64,
    /// Account limit
    pub limit: i64,
}

impl From<&Account> for Receipt {
    fn from(account: &Account) -> Self {
        Self {
            balance: account.balance,
            limit: account.limit,
        }
    }
}

/// Consistent snapshot of an account and its recent history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Balance at the snapshot point
    pub balance: i64,

    /// Account limit
    pub limit: i64,

    /// When the statement was produced
    pub generated_at: DateTime<Utc>,

    /// Up to `STATEMENT_DEPTH` transactions, newest first
    pub last_transactions: Vec<Transaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(limit: i64, balance: i64) -> Account {
        Account {
            id: AccountId::new(1),
            limit,
            balance,
            transaction_count: 0,
        }
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(TransactionKind::parse("c"), Some(TransactionKind::Credit));
        assert_eq!(TransactionKind::parse("d"), Some(TransactionKind::Debit));
        assert_eq!(TransactionKind::parse("x"), None);
        assert_eq!(TransactionKind::parse("C"), None);
        assert_eq!(TransactionKind::Debit.code(), "d");
    }

    #[test]
    fn test_validation_order() {
        // amount is checked before kind and description
        let err = TransactionRequest::new("x", 0, "").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(0)));

        let err = TransactionRequest::new("x", 5, "").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidKind(_)));

        let err = TransactionRequest::new("c", 5, "").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDescription(0)));

        let err = TransactionRequest::new("c", -5, "ok").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(-5)));
    }

    #[test]
    fn test_description_boundaries() {
        assert!(TransactionRequest::new("c", 1, "0123456789").validate().is_ok());
        assert!(matches!(
            TransactionRequest::new("c", 1, "01234567890").validate(),
            Err(Error::InvalidDescription(11))
        ));
        // counted in characters, not bytes
        assert!(TransactionRequest::new("c", 1, "depósitoçã").validate().is_ok());
    }

    #[test]
    fn test_after_debit_within_limit() {
        let acc = account(1000, 0);
        let tx = TransactionRequest::new("d", 1000, "compra").validate().unwrap();
        let next = acc.after(&tx).unwrap();
        assert_eq!(next.balance, -1000);
        assert_eq!(next.transaction_count, 1);
        assert_eq!(acc.balance, 0);
    }

    #[test]
    fn test_after_debit_over_limit() {
        let acc = account(1000, -500);
        let tx = TransactionRequest::new("d", 600, "compra").validate().unwrap();
        assert!(matches!(acc.after(&tx), Err(Error::LimitExceeded { .. })));
    }

    #[test]
    fn test_after_credit_overflow() {
        let acc = account(0, i64::MAX - 1);
        let tx = TransactionRequest::new("c", 2, "big").validate().unwrap();
        assert!(matches!(acc.after(&tx), Err(Error::InvalidAmount(2))));
    }
}
