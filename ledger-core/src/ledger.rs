//! Main ledger orchestration layer
//!
//! This module ties together storage, account resolution and the per-account
//! actors into the two operations the service exposes: applying a
//! transaction and building a statement.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger, TransactionRequest};
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let ledger = Ledger::open(Config::default()).await?;
//!
//!     let receipt = ledger.apply(1, TransactionRequest::new("d", 500, "compra")).await?;
//!     println!("balance {} / limit {}", receipt.balance, receipt.limit);
//!
//!     let statement = ledger.statement(1).await?;
//!     assert_eq!(statement.balance, receipt.balance);
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::spawn_account_actor,
    resolver::AccountRegistry,
    types::{AccountId, Receipt, Statement, TransactionRequest},
    Config, Result, Storage,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Main ledger interface
#[derive(Debug)]
pub struct Ledger {
    /// Account resolver and per-account actor handles
    registry: AccountRegistry,

    /// Actor tasks, awaited on shutdown
    tasks: Vec<JoinHandle<()>>,

    /// Direct storage access (for stats)
    storage: Arc<Storage>,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);
        let accounts = {
            let storage = Arc::clone(&storage);
            let seeds = config.accounts.clone();
            tokio::task::spawn_blocking(move || storage.provision(&seeds))
                .await
                .map_err(|e| crate::Error::Concurrency(format!("Provisioning failed: {}", e)))??
        };

        let mut registry = AccountRegistry::new();
        let mut tasks = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let (handle, task) =
                spawn_account_actor(account.id, Arc::clone(&storage), config.mailbox_capacity);
            registry.insert(handle);
            tasks.push(task);

            tracing::info!(
                account_id = %account.id,
                limit = account.limit,
                balance = account.balance,
                "Account actor started"
            );
        }

        Ok(Self {
            registry,
            tasks,
            storage,
            config,
        })
    }

    /// Configuration the ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Provisioned account IDs, ascending
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.registry.account_ids()
    }

    /// Resolve an externally supplied account identifier
    pub fn resolve(&self, raw_id: i64) -> Result<AccountId> {
        self.registry.resolve(raw_id)
    }

    /// Apply a transaction using the configured default deadline
    pub async fn apply(&self, raw_id: i64, request: TransactionRequest) -> Result<Receipt> {
        self.apply_with_deadline(raw_id, request, self.default_deadline())
            .await
    }

    /// Apply a transaction, aborting without side effects once `deadline` passes
    ///
    /// Input checks run before the account's actor is contacted.
    pub async fn apply_with_deadline(
        &self,
        raw_id: i64,
        request: TransactionRequest,
        deadline: Instant,
    ) -> Result<Receipt> {
        let result = self.try_apply(raw_id, request, deadline).await;

        if let Err(ref e) = result {
            if e.is_rejection() {
                tracing::debug!(account_id = raw_id, reason = e.kind(), "Transaction rejected");
            } else {
                tracing::warn!(account_id = raw_id, error = %e, "Transaction failed");
            }
        }

        result
    }

    async fn try_apply(
        &self,
        raw_id: i64,
        request: TransactionRequest,
        deadline: Instant,
    ) -> Result<Receipt> {
        let transaction = request.validate()?;
        let handle = self.registry.get(raw_id)?;
        let (kind, amount) = (transaction.kind, transaction.amount);

        let receipt = handle.apply(transaction, deadline).await?;
        tracing::debug!(
            account_id = raw_id,
            %kind,
            amount,
            balance = receipt.balance,
            "Transaction applied"
        );
        Ok(receipt)
    }

    /// Build a statement using the configured default deadline
    pub async fn statement(&self, raw_id: i64) -> Result<Statement> {
        self.statement_with_deadline(raw_id, self.default_deadline())
            .await
    }

    /// Build a consistent statement
    ///
    /// Balance and history are read together by the account's actor, so the
    /// history holds exactly the newest transactions reflected in the balance.
    pub async fn statement_with_deadline(
        &self,
        raw_id: i64,
        deadline: Instant,
    ) -> Result<Statement> {
        let handle = self.registry.get(raw_id)?;
        let result = handle.statement(deadline).await;

        if let Err(ref e) = result {
            tracing::warn!(account_id = raw_id, error = %e, "Statement failed");
        }

        result
    }

    /// Get storage statistics
    pub async fn stats(&self) -> Result<crate::storage::StorageStats> {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || storage.get_stats())
            .await
            .map_err(|e| crate::Error::Concurrency(format!("Stats task failed: {}", e)))?
    }

    /// Shutdown ledger once every actor has drained its mailbox
    ///
    /// Every actor is signalled and awaited even if one of them fails; the
    /// first failure is returned.
    pub async fn shutdown(self) -> Result<()> {
        let mut first_error = None;

        for handle in self.registry.handles() {
            if let Err(e) = handle.shutdown().await {
                tracing::warn!(account_id = %handle.account_id(), error = %e, "Actor shutdown failed");
                first_error.get_or_insert(e);
            }
        }

        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Actor task failed");
                first_error.get_or_insert(crate::Error::Concurrency(format!(
                    "Actor task failed: {}",
                    e
                )));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("Ledger shut down");
                Ok(())
            }
        }
    }

    fn default_deadline(&self) -> Instant {
        Instant::now() + Duration::from_millis(self.config.request_timeout_ms)
    }
}
