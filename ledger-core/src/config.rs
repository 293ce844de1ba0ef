//! Configuration for the ledger

use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// HTTP listen address
    pub http_listen_addr: String,

    /// Serve over a Unix domain socket at this path instead of TCP
    pub unix_socket_path: Option<PathBuf>,

    /// Default per-request deadline (milliseconds)
    pub request_timeout_ms: u64,

    /// Bounded mailbox size of each account actor
    pub mailbox_capacity: usize,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Provisioned accounts
    pub accounts: Vec<AccountSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "credit-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            http_listen_addr: "0.0.0.0:8080".to_string(),
            unix_socket_path: None,
            request_timeout_ms: 5_000,
            mailbox_capacity: 1024,
            rocksdb: RocksDBConfig::default(),
            accounts: AccountSeed::defaults(),
        }
    }
}

/// An account to provision at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSeed {
    /// Account ID
    pub id: u32,

    /// Overdraft limit
    pub limit: i64,
}

impl AccountSeed {
    /// The standard five-account population
    pub fn defaults() -> Vec<Self> {
        vec![
            AccountSeed { id: 1, limit: 100_000 },
            AccountSeed { id: 2, limit: 80_000 },
            AccountSeed { id: 3, limit: 1_000_000 },
            AccountSeed { id: 4, limit: 10_000_000 },
            AccountSeed { id: 5, limit: 500_000 },
        ]
    }

    /// Typed account ID
    pub fn account_id(&self) -> AccountId {
        AccountId::new(self.id)
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// fsync the WAL on every commit
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            sync_writes: false,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    ///
    /// `LEDGER_CONFIG` selects a TOML file as the base; the remaining
    /// variables override individual fields.
    pub fn from_env() -> crate::Result<Self> {
        let mut config = match std::env::var("LEDGER_CONFIG") {
            Ok(path) => Config::from_file(path)?,
            Err(_) => Config::default(),
        };

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("LEDGER_HTTP_ADDR") {
            config.http_listen_addr = addr;
        }

        if let Ok(path) = std::env::var("LEDGER_SOCKET_ADDR") {
            config.unix_socket_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        if let Ok(ms) = std::env::var("LEDGER_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = ms.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LEDGER_REQUEST_TIMEOUT_MS {:?}: {}", ms, e))
            })?;
        }

        Ok(config)
    }

    /// Check the account population and limits
    pub fn validate(&self) -> crate::Result<()> {
        if self.accounts.is_empty() {
            return Err(crate::Error::Config("No accounts configured".to_string()));
        }

        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox_capacity must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for seed in &self.accounts {
            if seed.id == 0 {
                return Err(crate::Error::Config("Account id 0 is reserved".to_string()));
            }
            if seed.limit < 0 {
                return Err(crate::Error::Config(format!(
                    "Account {} has negative limit {}",
                    seed.id, seed.limit
                )));
            }
            if !seen.insert(seed.id) {
                return Err(crate::Error::Config(format!("Duplicate account id {}", seed.id)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "credit-ledger");
        assert_eq!(config.http_listen_addr, "0.0.0.0:8080");
        assert_eq!(config.accounts.len(), 5);
        assert!(config.unix_socket_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut config = Config::default();
        config.accounts.push(AccountSeed { id: 1, limit: 10 });
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_negative_limit() {
        let mut config = Config::default();
        config.accounts = vec![AccountSeed { id: 7, limit: -1 }];
        assert!(config.validate().is_err());

        config.accounts = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/tmp/ledger"
request_timeout_ms = 250
unix_socket_path = "/tmp/ledger.sock"

[[accounts]]
id = 1
limit = 1000
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.request_timeout_ms, 250);
        assert_eq!(config.unix_socket_path, Some(PathBuf::from("/tmp/ledger.sock")));
        assert_eq!(config.accounts, vec![AccountSeed { id: 1, limit: 1000 }]);
        // unspecified sections keep their defaults
        assert_eq!(config.mailbox_capacity, 1024);
    }
}
