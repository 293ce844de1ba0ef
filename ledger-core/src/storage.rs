//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account store (key: account_id, big-endian u32)
//! - `transactions` - Append-only transaction log
//!   (key: account_id || sequence, both big-endian)
//!
//! Big-endian keys sort numerically, so the most recent transactions of an
//! account are found by iterating its prefix in reverse.

use crate::{
    config::AccountSeed,
    error::{Error, Result},
    types::{Account, AccountId, Statement, Transaction},
    Config,
};
use chrono::Utc;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB");

        Ok(Self {
            db,
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Point reads on a handful of hot keys
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::StorageUnavailable(format!("Column family {} not found", name)))
    }

    // Key helpers

    fn account_key(id: AccountId) -> [u8; 4] {
        id.to_be_bytes()
    }

    fn transaction_key(id: AccountId, sequence: u64) -> [u8; 12] {
        let mut key = [0u8; 12];
        key[..4].copy_from_slice(&id.to_be_bytes());
        key[4..].copy_from_slice(&sequence.to_be_bytes());
        key
    }

    // Account operations

    /// Create missing accounts; existing ones keep their persisted state
    pub fn provision(&self, seeds: &[AccountSeed]) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        let mut accounts = Vec::with_capacity(seeds.len());

        for seed in seeds {
            let id = seed.account_id();
            match self.get_account(id)? {
                Some(existing) => {
                    if existing.limit != seed.limit {
                        tracing::warn!(
                            account_id = %id,
                            stored_limit = existing.limit,
                            configured_limit = seed.limit,
                            "Configured limit differs from stored limit; keeping stored"
                        );
                    }
                    accounts.push(existing);
                }
                None => {
                    let account = Account::open(id, seed.limit);
                    batch.put_cf(cf, Self::account_key(id), bincode::serialize(&account)?);
                    tracing::info!(account_id = %id, limit = seed.limit, "Account provisioned");
                    accounts.push(account);
                }
            }
        }

        self.db.write_opt(batch, &self.write_options())?;
        Ok(accounts)
    }

    /// Get account by ID
    pub fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        match self.db.get_cf(cf, Self::account_key(id))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Batch operations (atomic)

    /// Update the account and append its transaction in one write
    ///
    /// Either both land or neither does. Callers must hold the account's
    /// serialization unit so `account` was derived from the latest state.
    pub fn commit(&self, account: &Account, transaction: &Transaction) -> Result<()> {
        debug_assert_eq!(account.id, transaction.account_id);
        debug_assert_eq!(account.transaction_count, transaction.sequence);

        let mut batch = WriteBatch::default();

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        batch.put_cf(
            cf_accounts,
            Self::account_key(account.id),
            bincode::serialize(account)?,
        );

        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        batch.put_cf(
            cf_transactions,
            Self::transaction_key(transaction.account_id, transaction.sequence),
            bincode::serialize(transaction)?,
        );

        self.db.write_opt(batch, &self.write_options())?;

        tracing::debug!(
            account_id = %account.id,
            sequence = transaction.sequence,
            balance = account.balance,
            "Transaction committed"
        );

        Ok(())
    }

    // Transaction log queries

    /// Most recent `k` transactions of an account, newest first
    pub fn recent_transactions(&self, id: AccountId, k: usize) -> Result<Vec<Transaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let upper = Self::transaction_key(id, u64::MAX);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&upper, Direction::Reverse));

        Self::collect_recent(iter, id, k)
    }

    /// Account and its recent history read from one snapshot
    pub fn read_statement(&self, id: AccountId, k: usize) -> Result<Option<Statement>> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let snapshot = self.db.snapshot();

        let account: Account = match snapshot.get_cf(cf_accounts, Self::account_key(id))? {
            Some(value) => bincode::deserialize(&value)?,
            None => return Ok(None),
        };

        let upper = Self::transaction_key(id, u64::MAX);
        let iter =
            snapshot.iterator_cf(cf_transactions, IteratorMode::From(&upper, Direction::Reverse));
        let last_transactions = Self::collect_recent(iter, id, k)?;

        Ok(Some(Statement {
            balance: account.balance,
            limit: account.limit,
            generated_at: Utc::now(),
            last_transactions,
        }))
    }

    fn collect_recent<I>(iter: I, id: AccountId, k: usize) -> Result<Vec<Transaction>>
    where
        I: Iterator<Item = std::result::Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>>,
    {
        let prefix = id.to_be_bytes();
        let mut transactions = Vec::with_capacity(k);

        for item in iter {
            if transactions.len() >= k {
                break;
            }
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            transactions.push(bincode::deserialize(&value)?);
        }

        Ok(transactions)
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    // Statistics

    /// Number of entries in an account's transaction log
    pub fn count_transactions(&self, id: AccountId) -> Result<u64> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let prefix = id.to_be_bytes();
        let start = Self::transaction_key(id, 0);

        let mut count = 0u64;
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let snapshot = self.db.snapshot();

        let mut total_accounts = 0u64;
        for item in snapshot.iterator_cf(cf_accounts, IteratorMode::Start) {
            item?;
            total_accounts += 1;
        }

        let mut total_transactions = 0u64;
        for item in snapshot.iterator_cf(cf_transactions, IteratorMode::Start) {
            item?;
            total_transactions += 1;
        }

        Ok(StorageStats {
            total_accounts,
            total_transactions,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Provisioned accounts
    pub total_accounts: u64,
    /// Logged transactions across all accounts
    pub total_transactions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionKind;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn test_transaction(account: &Account, amount: i64) -> Transaction {
        Transaction {
            account_id: account.id,
            sequence: account.transaction_count,
            kind: TransactionKind::Credit,
            amount,
            description: format!("tx{}", account.transaction_count),
            occurred_at: Utc::now(),
        }
    }

    fn credit(storage: &Storage, id: AccountId, amount: i64) -> Account {
        let mut account = storage.get_account(id).unwrap().unwrap();
        account.balance += amount;
        account.transaction_count += 1;
        storage
            .commit(&account, &test_transaction(&account, amount))
            .unwrap();
        account
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(storage.db.cf_handle(CF_TRANSACTIONS).is_some());
    }

    #[test]
    fn test_provision_is_idempotent() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let accounts = storage.provision(&config.accounts).unwrap();
        assert_eq!(accounts.len(), 5);
        assert!(accounts.iter().all(|a| a.balance == 0));

        credit(&storage, AccountId::new(1), 70);

        // A second provisioning pass must not reset the balance
        let accounts = storage.provision(&config.accounts).unwrap();
        assert_eq!(accounts[0].balance, 70);
    }

    #[test]
    fn test_provision_keeps_stored_limit() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        storage.provision(&[AccountSeed { id: 1, limit: 100 }]).unwrap();

        let accounts = storage.provision(&[AccountSeed { id: 1, limit: 999 }]).unwrap();
        assert_eq!(accounts[0].limit, 100);
    }

    #[test]
    fn test_commit_updates_balance_and_log() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        storage.provision(&config.accounts).unwrap();

        let id = AccountId::new(2);
        credit(&storage, id, 10);

        let account = storage.get_account(id).unwrap().unwrap();
        assert_eq!(account.balance, 10);
        assert_eq!(account.transaction_count, 1);

        let log = storage.recent_transactions(id, 10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].amount, 10);
        assert_eq!(log[0].sequence, 1);
    }

    #[test]
    fn test_recent_transactions_newest_first_and_bounded() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        storage.provision(&config.accounts).unwrap();

        let id = AccountId::new(3);
        for amount in 1..=15 {
            credit(&storage, id, amount);
        }
        // neighbouring accounts must not leak into the prefix scan
        credit(&storage, AccountId::new(2), 1000);
        credit(&storage, AccountId::new(4), 1000);

        let log = storage.recent_transactions(id, 10).unwrap();
        assert_eq!(log.len(), 10);
        let sequences: Vec<u64> = log.iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, (6..=15).rev().collect::<Vec<_>>());
        assert!(log.iter().all(|t| t.account_id == id));
    }

    #[test]
    fn test_read_statement() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        storage.provision(&config.accounts).unwrap();

        let id = AccountId::new(1);
        credit(&storage, id, 5);
        credit(&storage, id, 7);

        let statement = storage.read_statement(id, 10).unwrap().unwrap();
        assert_eq!(statement.balance, 12);
        assert_eq!(statement.limit, 100_000);
        assert_eq!(statement.last_transactions.len(), 2);
        assert_eq!(statement.last_transactions[0].amount, 7);

        assert!(storage.read_statement(AccountId::new(42), 10).unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        storage.provision(&config.accounts).unwrap();
        credit(&storage, AccountId::new(1), 5);
        credit(&storage, AccountId::new(5), 5);

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.total_accounts, 5);
        assert_eq!(stats.total_transactions, 2);
    }

    #[test]
    fn test_counts_come_from_the_log() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        storage.provision(&config.accounts).unwrap();

        let id = AccountId::new(3);
        for amount in 1..=3 {
            credit(&storage, id, amount);
        }
        credit(&storage, AccountId::new(4), 9);
        assert_eq!(storage.count_transactions(id).unwrap(), 3);
        assert_eq!(storage.count_transactions(AccountId::new(4)).unwrap(), 1);
        assert_eq!(storage.count_transactions(AccountId::new(2)).unwrap(), 0);

        // An account record claiming entries the log does not hold
        let mut account = storage.get_account(AccountId::new(2)).unwrap().unwrap();
        account.transaction_count = 7;
        let cf = storage.cf_handle(CF_ACCOUNTS).unwrap();
        storage
            .db
            .put_cf(cf, Storage::account_key(account.id), bincode::serialize(&account).unwrap())
            .unwrap();

        assert_eq!(storage.count_transactions(AccountId::new(2)).unwrap(), 0);
        assert_eq!(storage.get_stats().unwrap().total_transactions, 4);
    }
}
