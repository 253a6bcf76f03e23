//! Store wrappers that force specific interleavings.
//!
//! Both wrap a `MemoryStore` and delegate to it, adding just enough
//! coordination to make a race happen on every run instead of by luck.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

use roulette_ledger::engine::{EngineConfig, SpinSource, WagerEngine};
use roulette_ledger::store::{BalanceStore, CommitOutcome, MemoryStore};
use roulette_ledger::types::{Account, StoreError};

pub fn engine(store: Arc<dyn BalanceStore>, wheel: Arc<dyn SpinSource>) -> WagerEngine {
    WagerEngine::new(store, wheel, EngineConfig::default())
}

// ---------------------------------------------------------------------------
// RacingStore
// ---------------------------------------------------------------------------

/// Holds the first `racers` balance reads at a barrier, so every racer reads
/// the same pre-bet balance before any of them commits.
pub struct RacingStore {
    pub inner: MemoryStore,
    barrier: Barrier,
    racers: usize,
    reads: AtomicUsize,
}

impl RacingStore {
    pub fn new(inner: MemoryStore, racers: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(racers),
            racers,
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BalanceStore for RacingStore {
    async fn get_or_create(&self, user_id: &str) -> Result<i64, StoreError> {
        let balance = self.inner.get_or_create(user_id).await?;
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.racers {
            self.barrier.wait().await;
        }
        Ok(balance)
    }

    async fn commit_settlement(
        &self,
        user_id: &str,
        expected_prior: i64,
        delta: i64,
    ) -> Result<CommitOutcome, StoreError> {
        self.inner.commit_settlement(user_id, expected_prior, delta).await
    }

    async fn fetch_account(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        self.inner.fetch_account(user_id).await
    }

    fn name(&self) -> &'static str {
        "racing"
    }
}

// ---------------------------------------------------------------------------
// MeddlingStore
// ---------------------------------------------------------------------------

/// Simulates a relentless concurrent writer: right before every settlement
/// it lands a +1 adjustment of its own, so the caller's commit always
/// finds a moved balance.
pub struct MeddlingStore {
    pub inner: MemoryStore,
    pub meddles: AtomicUsize,
}

impl MeddlingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            meddles: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BalanceStore for MeddlingStore {
    async fn get_or_create(&self, user_id: &str) -> Result<i64, StoreError> {
        self.inner.get_or_create(user_id).await
    }

    async fn commit_settlement(
        &self,
        user_id: &str,
        expected_prior: i64,
        delta: i64,
    ) -> Result<CommitOutcome, StoreError> {
        let current = self.inner.get_or_create(user_id).await?;
        if self.inner.commit_settlement(user_id, current, 1).await?.is_applied() {
            self.meddles.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.commit_settlement(user_id, expected_prior, delta).await
    }

    async fn fetch_account(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        self.inner.fetch_account(user_id).await
    }

    fn name(&self) -> &'static str {
        "meddling"
    }
}
