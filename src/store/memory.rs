//! In-process balance store.
//!
//! Holds accounts in a mutex-guarded map. Reads and conditional writes take
//! the lock separately, so interleaving bets see real conflicts exactly as
//! they would against the SQLite store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{BalanceStore, CommitOutcome};
use crate::types::{Account, StoreError};

pub struct MemoryStore {
    starting_balance: i64,
    accounts: Mutex<HashMap<String, Account>>,
}

impl MemoryStore {
    pub fn new(starting_balance: i64) -> Self {
        Self {
            starting_balance,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or overwrite an account. Test and fixture setup only; bets
    /// never go through here.
    pub fn seed(&self, user_id: &str, balance: i64) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut accounts = self.lock()?;
        accounts.insert(
            user_id.to_string(),
            Account {
                user_id: user_id.to_string(),
                balance,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    /// Number of accounts created so far.
    pub fn len(&self) -> usize {
        self.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Account>>, StoreError> {
        self.accounts
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl BalanceStore for MemoryStore {
    async fn get_or_create(&self, user_id: &str) -> Result<i64, StoreError> {
        let mut accounts = self.lock()?;
        let account = accounts.entry(user_id.to_string()).or_insert_with(|| {
            debug!(user_id, balance = self.starting_balance, "Account created");
            let now = Utc::now();
            Account {
                user_id: user_id.to_string(),
                balance: self.starting_balance,
                created_at: now,
                updated_at: now,
            }
        });
        Ok(account.balance)
    }

    async fn commit_settlement(
        &self,
        user_id: &str,
        expected_prior: i64,
        delta: i64,
    ) -> Result<CommitOutcome, StoreError> {
        let mut accounts = self.lock()?;
        let Some(account) = accounts.get_mut(user_id) else {
            return Ok(CommitOutcome::Conflict);
        };

        if account.balance != expected_prior {
            return Ok(CommitOutcome::Conflict);
        }

        let Some(new_balance) = expected_prior.checked_add(delta) else {
            return Err(StoreError::Backend(format!(
                "settlement overflows balance ({expected_prior} + {delta})"
            )));
        };
        if new_balance < 0 {
            return Err(StoreError::Backend(format!(
                "settlement would make balance negative ({new_balance})"
            )));
        }

        account.balance = new_balance;
        account.updated_at = Utc::now();
        Ok(CommitOutcome::Applied(new_balance))
    }

    async fn fetch_account(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.get(user_id).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
