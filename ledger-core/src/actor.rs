//! Actor-based per-account serialization
//!
//! Every provisioned account is owned by exactly one Tokio task:
//! - The task handles one message at a time, so the read-check-write of an
//!   apply and the combined read of a statement never interleave with any
//!   other operation on that account
//! - Actors for different accounts share nothing and run in parallel
//! - Bounded mailboxes give backpressure to callers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │            HTTP handlers (one task per request)       │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ AccountRegistry::get(id)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              AccountHandle (Clone)                    │
//! │         Sends messages to one actor's mailbox         │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │        AccountActor (one task per account)            │
//! │   Apply:     get_account → check → commit (batch)     │
//! │   Statement: snapshot read of account + history       │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! RocksDB calls are synchronous, so they run on the blocking pool.

use crate::types::{AccountId, Receipt, Statement, Transaction, ValidTransaction, STATEMENT_DEPTH};
use crate::{Error, Result, Storage};
use chrono::Utc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const PENDING: u8 = 0;
const CLAIMED: u8 = 1;
const CANCELLED: u8 = 2;

/// Decides, exactly once, whether an apply commits or its caller gives up
///
/// The actor claims before writing and the caller cancels once its deadline
/// passes; whichever side gets there first wins.
#[derive(Debug, Clone, Default)]
pub struct Claim(Arc<AtomicU8>);

impl Claim {
    /// Reserve the right to commit; false if the caller already gave up
    pub fn claim(&self) -> bool {
        self.transition(CLAIMED)
    }

    /// Abandon the apply; false if a commit is already underway
    pub fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Message sent to an account actor
#[derive(Debug)]
pub enum AccountMessage {
    /// Validate against current state and commit
    Apply {
        transaction: ValidTransaction,
        deadline: Instant,
        claim: Claim,
        response: oneshot::Sender<Result<Receipt>>,
    },

    /// Read balance and recent history as one snapshot
    Statement {
        response: oneshot::Sender<Result<Statement>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns one account
pub struct AccountActor {
    /// Account served by this actor
    account_id: AccountId,

    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<AccountMessage>,
}

impl AccountActor {
    /// Create new actor
    pub fn new(
        account_id: AccountId,
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<AccountMessage>,
    ) -> Self {
        Self {
            account_id,
            storage,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                AccountMessage::Shutdown => break,
                msg => self.handle_message(msg).await,
            }
        }

        tracing::debug!(account_id = %self.account_id, "Account actor stopped");
    }

    /// Handle a single message
    async fn handle_message(&self, msg: AccountMessage) {
        match msg {
            AccountMessage::Apply {
                transaction,
                deadline,
                claim,
                response,
            } => {
                let result = self.apply(transaction, deadline, claim).await;
                let _ = response.send(result);
            }

            AccountMessage::Statement { response } => {
                let result = self.statement().await;
                let _ = response.send(result);
            }

            AccountMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Read-check-write, run to completion before the next message
    async fn apply(
        &self,
        transaction: ValidTransaction,
        deadline: Instant,
        claim: Claim,
    ) -> Result<Receipt> {
        let storage = Arc::clone(&self.storage);
        let account_id = self.account_id;

        tokio::task::spawn_blocking(move || {
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }

            let account = storage
                .get_account(account_id)?
                .ok_or_else(|| Error::UnknownAccount(account_id.as_u32().into()))?;

            let next = account.after(&transaction)?;

            // Past this point the write either lands or the caller hears Timeout, never both
            if Instant::now() >= deadline || !claim.claim() {
                return Err(Error::Timeout);
            }

            let logged = Transaction {
                account_id,
                sequence: next.transaction_count,
                kind: transaction.kind,
                amount: transaction.amount,
                description: transaction.description,
                occurred_at: Utc::now(),
            };
            storage.commit(&next, &logged)?;

            Ok(Receipt::from(&next))
        })
        .await
        .map_err(|e| Error::Concurrency(format!("Apply task failed: {}", e)))?
    }

    async fn statement(&self) -> Result<Statement> {
        let storage = Arc::clone(&self.storage);
        let account_id = self.account_id;

        tokio::task::spawn_blocking(move || {
            storage
                .read_statement(account_id, STATEMENT_DEPTH)?
                .ok_or_else(|| Error::UnknownAccount(account_id.as_u32().into()))
        })
        .await
        .map_err(|e| Error::Concurrency(format!("Statement task failed: {}", e)))?
    }
}

/// Handle for sending messages to an account actor
#[derive(Clone, Debug)]
pub struct AccountHandle {
    account_id: AccountId,
    sender: mpsc::Sender<AccountMessage>,
}

impl AccountHandle {
    /// Create new handle
    pub fn new(account_id: AccountId, sender: mpsc::Sender<AccountMessage>) -> Self {
        Self { account_id, sender }
    }

    /// Account served by this handle
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Apply a validated transaction
    ///
    /// Returns `Timeout` once `deadline` passes, whether the message is still
    /// queued or waiting behind another commit, and only if nothing was
    /// written. A commit that has already started is awaited for its real
    /// outcome.
    pub async fn apply(&self, transaction: ValidTransaction, deadline: Instant) -> Result<Receipt> {
        let (tx, mut rx) = oneshot::channel();
        let claim = Claim::default();
        let msg = AccountMessage::Apply {
            transaction,
            deadline,
            claim: claim.clone(),
            response: tx,
        };

        tokio::time::timeout_at(deadline, self.sender.send(msg))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        let waited = tokio::time::timeout_at(deadline, &mut rx).await;
        let response = match waited {
            Ok(response) => response,
            Err(_) if claim.cancel() => return Err(Error::Timeout),
            Err(_) => rx.await,
        };

        response.map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Build a statement
    pub async fn statement(&self, deadline: Instant) -> Result<Statement> {
        tokio::time::timeout_at(deadline, async {
            let (tx, rx) = oneshot::channel();
            self.sender
                .send(AccountMessage::Statement { response: tx })
                .await
                .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

            rx.await
                .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
        })
        .await
        .map_err(|_| Error::Timeout)?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(AccountMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the actor for one account
pub fn spawn_account_actor(
    account_id: AccountId,
    storage: Arc<Storage>,
    mailbox_capacity: usize,
) -> (AccountHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = AccountActor::new(account_id, storage, rx);

    let task = tokio::spawn(async move {
        actor.run().await;
    });

    (AccountHandle::new(account_id, tx), task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionRequest;
    use crate::Config;
    use tokio::time::Duration;

    fn open_storage() -> (Arc<Storage>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let storage = Arc::new(Storage::open(&config).unwrap());
        storage.provision(&config.accounts).unwrap();
        (storage, temp_dir)
    }

    fn later() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn debit(amount: i64) -> ValidTransaction {
        TransactionRequest::new("d", amount, "compra").validate().unwrap()
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (storage, _temp) = open_storage();
        let (handle, task) = spawn_account_actor(AccountId::new(1), storage, 16);

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        // Mailbox is gone once the actor has stopped
        assert!(matches!(
            handle.statement(later()).await,
            Err(Error::Concurrency(_))
        ));
    }

    #[tokio::test]
    async fn test_actor_apply_and_statement() {
        let (storage, _temp) = open_storage();
        let (handle, _task) = spawn_account_actor(AccountId::new(1), storage, 16);

        let receipt = handle.apply(debit(500), later()).await.unwrap();
        assert_eq!(receipt, Receipt { balance: -500, limit: 100_000 });

        let statement = handle.statement(later()).await.unwrap();
        assert_eq!(statement.balance, -500);
        assert_eq!(statement.last_transactions.len(), 1);
        assert_eq!(statement.last_transactions[0].description, "compra");

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_rejects_over_limit() {
        let (storage, _temp) = open_storage();
        let (handle, _task) = spawn_account_actor(AccountId::new(2), Arc::clone(&storage), 16);

        let result = handle.apply(debit(80_001), later()).await;
        assert!(matches!(result, Err(Error::LimitExceeded { .. })));

        let account = storage.get_account(AccountId::new(2)).unwrap().unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.transaction_count, 0);
    }

    #[tokio::test]
    async fn test_actor_expired_deadline_writes_nothing() {
        let (storage, _temp) = open_storage();
        let (handle, _task) = spawn_account_actor(AccountId::new(3), Arc::clone(&storage), 16);

        let result = handle.apply(debit(10), Instant::now()).await;
        assert!(matches!(result, Err(Error::Timeout)));

        let account = storage.get_account(AccountId::new(3)).unwrap().unwrap();
        assert_eq!(account.balance, 0);
        assert!(storage
            .recent_transactions(AccountId::new(3), 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_claim_is_decided_once() {
        let claim = Claim::default();
        assert!(claim.claim());
        assert!(!claim.cancel());

        let claim = Claim::default();
        assert!(claim.cancel());
        assert!(!claim.claim());
    }

    fn detached_handle() -> (AccountHandle, mpsc::Receiver<AccountMessage>) {
        let (tx, rx) = mpsc::channel(4);
        (AccountHandle::new(AccountId::new(1), tx), rx)
    }

    #[tokio::test]
    async fn test_apply_times_out_while_actor_is_busy() {
        let (handle, mut mailbox) = detached_handle();
        let deadline = Instant::now() + Duration::from_millis(50);

        // Nobody answers: the caller must still return at its deadline
        let result = tokio::time::timeout(Duration::from_secs(5), handle.apply(debit(1), deadline))
            .await
            .expect("apply outlived its deadline");
        assert!(matches!(result, Err(Error::Timeout)));

        // The message is still queued, and the actor may no longer commit it
        match mailbox.recv().await {
            Some(AccountMessage::Apply { claim, .. }) => assert!(!claim.claim()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_apply_waits_for_claimed_commit() {
        let (handle, mut mailbox) = detached_handle();
        let deadline = Instant::now() + Duration::from_millis(50);

        let responder = tokio::spawn(async move {
            match mailbox.recv().await {
                Some(AccountMessage::Apply { claim, response, .. }) => {
                    assert!(claim.claim());
                    // Commit finishes after the caller's deadline
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    let _ = response.send(Ok(Receipt { balance: -1, limit: 10 }));
                }
                other => panic!("unexpected message: {:?}", other),
            }
        });

        let receipt = handle.apply(debit(1), deadline).await.unwrap();
        assert_eq!(receipt, Receipt { balance: -1, limit: 10 });
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_unprovisioned_account() {
        let (storage, _temp) = open_storage();
        let (handle, _task) = spawn_account_actor(AccountId::new(99), storage, 16);

        assert!(matches!(
            handle.apply(debit(1), later()).await,
            Err(Error::UnknownAccount(99))
        ));
        assert!(matches!(
            handle.statement(later()).await,
            Err(Error::UnknownAccount(99))
        ));
    }
}
