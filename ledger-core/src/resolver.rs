//! Account resolution over the provisioned set

use crate::actor::AccountHandle;
use crate::types::AccountId;
use crate::{Error, Result};
use std::collections::HashMap;

/// Maps external identifiers to the actors of provisioned accounts.
///
/// Built once at startup and never mutated, so lookups need no locking.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    handles: HashMap<AccountId, AccountHandle>,
}

impl AccountRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account's handle
    pub fn insert(&mut self, handle: AccountHandle) {
        self.handles.insert(handle.account_id(), handle);
    }

    /// Resolve an externally supplied identifier
    pub fn resolve(&self, raw_id: i64) -> Result<AccountId> {
        self.get(raw_id).map(AccountHandle::account_id)
    }

    /// Handle for an externally supplied identifier
    pub fn get(&self, raw_id: i64) -> Result<&AccountHandle> {
        u32::try_from(raw_id)
            .ok()
            .and_then(|id| self.handles.get(&AccountId::new(id)))
            .ok_or(Error::UnknownAccount(raw_id))
    }

    /// All registered account IDs, ascending
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.handles.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Iterate handles
    pub fn handles(&self) -> impl Iterator<Item = &AccountHandle> {
        self.handles.values()
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if no account is registered
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
