//! SQLite balance store via sqlx.
//!
//! One row per account. The settlement is a single conditional `UPDATE`,
//! so SQLite's statement atomicity is what makes each commit all-or-nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::{BalanceStore, CommitOutcome};
use crate::types::{Account, StoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        user_id    TEXT PRIMARY KEY NOT NULL,
        balance    INTEGER NOT NULL CHECK (balance >= 0),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )";

pub struct SqliteStore {
    pool: SqlitePool,
    starting_balance: i64,
}

impl SqliteStore {
    /// Connect to (and if needed create) the database, then apply the schema.
    pub async fn connect(
        url: &str,
        starting_balance: i64,
        max_connections: u32,
        busy_timeout_ms: u64,
    ) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(busy_timeout_ms));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` is a separate database, so pin to one
        // and never let it be recycled.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;

        info!(url, max_connections, in_memory, "SQLite balance store ready");
        Ok(Self { pool, starting_balance })
    }
}

#[async_trait]
impl BalanceStore for SqliteStore {
    async fn get_or_create(&self, user_id: &str) -> Result<i64, StoreError> {
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO accounts (user_id, balance, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(self.starting_balance)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            debug!(user_id, balance = self.starting_balance, "Account created");
        }

        let balance: i64 = sqlx::query_scalar("SELECT balance FROM accounts WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(balance)
    }

    async fn commit_settlement(
        &self,
        user_id: &str,
        expected_prior: i64,
        delta: i64,
    ) -> Result<CommitOutcome, StoreError> {
        let new_balance: Option<i64> = sqlx::query_scalar(
            "UPDATE accounts
             SET balance = balance + ?3, updated_at = ?4
             WHERE user_id = ?1 AND balance = ?2
             RETURNING balance",
        )
        .bind(user_id)
        .bind(expected_prior)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match new_balance {
            Some(balance) => CommitOutcome::Applied(balance),
            None => CommitOutcome::Conflict,
        })
    }

    async fn fetch_account(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        let row: Option<(String, i64, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT user_id, balance, created_at, updated_at FROM accounts WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id, balance, created_at, updated_at)| Account {
            user_id,
            balance,
            created_at,
            updated_at,
        }))
    }

    /// Close the pool, waiting for in-flight queries.
    async fn close(&self) {
        self.pool.close().await;
        debug!("SQLite pool closed");
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// SQLITE_BUSY and SQLITE_LOCKED primary result codes.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let transient = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            sqlx::Error::Database(db) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                // Extended codes carry the primary code in the low byte.
                .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                .unwrap_or(false),
            _ => false,
        };

        if transient {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
