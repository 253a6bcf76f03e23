//! Persistence layer.
//!
//! Defines the `BalanceStore` trait, the only path through which account
//! balances are read or mutated, and provides two implementations:
//! - `SqliteStore`: durable storage via sqlx/SQLite
//! - `MemoryStore`: in-process map for tests and ephemeral runs
//!
//! Every mutation is a conditional write: a settlement only applies if the
//! balance still equals the value the caller read.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{Account, StoreError};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result of a conditional settlement write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The delta was applied; carries the new balance.
    Applied(i64),
    /// The balance no longer matched the expected prior value. Nothing changed.
    Conflict,
}

impl CommitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommitOutcome::Applied(_))
    }
}

/// Durable per-user balance storage with optimistic concurrency.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Return the user's balance, creating the account with the starting
    /// balance if it does not exist. A racing creation never overwrites an
    /// existing balance.
    async fn get_or_create(&self, user_id: &str) -> Result<i64, StoreError>;

    /// Apply `delta` iff the current balance equals `expected_prior`.
    async fn commit_settlement(
        &self,
        user_id: &str,
        expected_prior: i64,
        delta: i64,
    ) -> Result<CommitOutcome, StoreError>;

    /// Full account record, or `None` if the user has never been seen.
    async fn fetch_account(&self, user_id: &str) -> Result<Option<Account>, StoreError>;

    /// Release backend resources on shutdown. No-op by default.
    async fn close(&self) {}

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Open the store named by a configuration URL.
///
/// `"memory"` (or `"memory:"`) selects the in-process store; anything else
/// is handed to sqlx as a SQLite connection string.
pub async fn open(
    database_url: &str,
    starting_balance: i64,
    max_connections: u32,
    busy_timeout_ms: u64,
) -> Result<Arc<dyn BalanceStore>, StoreError> {
    match database_url.trim() {
        "memory" | "memory:" => Ok(Arc::new(MemoryStore::new(starting_balance))),
        url => {
            let store = SqliteStore::connect(url, starting_balance, max_connections, busy_timeout_ms)
                .await?;
            Ok(Arc::new(store))
        }
    }
}
