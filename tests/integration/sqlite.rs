//! End-to-end ledger behaviour against a file-backed SQLite store.

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use roulette_ledger::engine::{EngineConfig, ScriptedWheel, SeededWheel, WagerEngine};
use roulette_ledger::store::{BalanceStore, SqliteStore};
use roulette_ledger::types::LedgerError;

/// A throwaway database file, removed (with its WAL sidecars) on drop.
struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("ledger_test_{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    async fn open(&self, max_connections: u32) -> SqliteStore {
        SqliteStore::connect(&self.url(), 1000, max_connections, 5_000)
            .await
            .unwrap()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}

#[tokio::test]
async fn test_scenario_red_wins_on_one() {
    let db = TempDb::new();
    let store = Arc::new(db.open(2).await);
    let engine = WagerEngine::new(
        store.clone(),
        Arc::new(ScriptedWheel::new([1]).unwrap()),
        EngineConfig::default(),
    );

    let r = engine.place_bet("alice", "red", 100).await.unwrap();
    assert!(r.won);
    assert_eq!(r.delta, 100);
    assert_eq!(r.new_balance, 1100);
    assert_eq!(engine.get_balance("alice").await.unwrap(), 1100);
    store.close().await;
}

#[tokio::test]
async fn test_scenario_insufficient_funds_unchanged() {
    let db = TempDb::new();
    let store = Arc::new(db.open(2).await);
    let engine = WagerEngine::new(
        store.clone(),
        Arc::new(ScriptedWheel::new([0]).unwrap()),
        EngineConfig::default(),
    );

    // Lose 950 to land on 50, then try to bet 100.
    let r = engine.place_bet("bob", "even", 950).await.unwrap();
    assert_eq!(r.new_balance, 50);

    let err = engine.place_bet("bob", "even", 100).await.unwrap_err();
    assert_eq!(err, LedgerError::InsufficientFunds { amount: 100, balance: 50 });
    assert_eq!(engine.get_balance("bob").await.unwrap(), 50);
    store.close().await;
}

#[tokio::test]
async fn test_balances_survive_reconnect() {
    let db = TempDb::new();

    let store = Arc::new(db.open(1).await);
    let engine = WagerEngine::new(
        store.clone(),
        Arc::new(ScriptedWheel::new([0]).unwrap()),
        EngineConfig::default(),
    );
    engine.place_bet("carol", "black", 1000).await.unwrap();
    store.close().await;
    drop(engine);

    let reopened = db.open(1).await;
    assert_eq!(reopened.get_or_create("carol").await.unwrap(), 0);
    let account = reopened.fetch_account("carol").await.unwrap().unwrap();
    assert_eq!(account.balance, 0);
    assert!(account.updated_at >= account.created_at);
    reopened.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bets_conserve_balance() {
    let db = TempDb::new();
    let store = Arc::new(db.open(5).await);
    let engine = Arc::new(WagerEngine::new(
        store.clone(),
        Arc::new(SeededWheel::new(11)),
        EngineConfig {
            max_attempts: 200,
            bet_timeout: Duration::from_secs(30),
        },
    ));

    // Create the account up front so every bet races on settlement only.
    assert_eq!(engine.get_balance("shared").await.unwrap(), 1000);

    let tasks = (0..30).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.place_bet("shared", "odd", 10).await })
    });

    let mut net = 0;
    let mut settled = 0;
    for joined in join_all(tasks).await {
        match joined.unwrap() {
            Ok(r) => {
                assert_eq!(r.new_balance, r.prior_balance() + r.delta);
                net += r.delta;
                settled += 1;
            }
            // Lock contention may surface as a transient error; it must not
            // have moved the balance.
            Err(e) => assert!(e.is_retryable(), "unexpected error: {e}"),
        }
    }

    assert!(settled > 0);
    assert_eq!(store.get_or_create("shared").await.unwrap(), 1000 + net);
    store.close().await;
}

#[tokio::test]
async fn test_concurrent_first_access_creates_once() {
    let db = TempDb::new();
    let store = Arc::new(db.open(4).await);

    let reads = (0..8).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { store.get_or_create("newcomer").await })
    });
    for joined in join_all(reads).await {
        assert_eq!(joined.unwrap().unwrap(), 1000);
    }

    assert_eq!(
        store.commit_settlement("newcomer", 1000, 1).await.unwrap(),
        roulette_ledger::store::CommitOutcome::Applied(1001)
    );
    assert_eq!(store.get_or_create("newcomer").await.unwrap(), 1001);
    store.close().await;
}
