//! Concurrency properties of the settlement loop: no lost updates, no
//! double-applied bets, and serializable (not FIFO) outcomes.

use futures::future::join_all;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use roulette_ledger::engine::{EngineConfig, ScriptedWheel, SeededWheel, WagerEngine};
use roulette_ledger::store::{BalanceStore, MemoryStore};
use roulette_ledger::types::{BetType, LedgerError};

use crate::support::{engine, MeddlingStore, RacingStore};

#[tokio::test]
async fn test_race_for_funds_settles_exactly_one_loss() {
    // 100 covers either 80 bet, not both. Zero makes both lose.
    let inner = MemoryStore::new(1000);
    inner.seed("u1", 100).unwrap();
    let store = Arc::new(RacingStore::new(inner, 2));
    let engine = engine(store.clone(), Arc::new(ScriptedWheel::new([0]).unwrap()));

    let (a, b) = tokio::join!(
        engine.place_bet("u1", "black", 80),
        engine.place_bet("u1", "red", 80)
    );

    let results = [a, b];
    let settled: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let rejected: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].new_balance, 20);
    assert_eq!(settled[0].attempts, 1);
    assert_eq!(
        rejected,
        vec![&LedgerError::InsufficientFunds { amount: 80, balance: 20 }]
    );
    assert_eq!(store.inner.get_or_create("u1").await.unwrap(), 20);
}

#[tokio::test]
async fn test_race_loser_retries_against_winner_balance() {
    // Both win on 1 (red, odd): the second commit must build on the first.
    let inner = MemoryStore::new(1000);
    inner.seed("u1", 100).unwrap();
    let store = Arc::new(RacingStore::new(inner, 2));
    let engine = engine(store.clone(), Arc::new(ScriptedWheel::new([1]).unwrap()));

    let (a, b) = tokio::join!(
        engine.place_bet("u1", "red", 80),
        engine.place_bet("u1", "odd", 80)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut attempts = [a.attempts, b.attempts];
    attempts.sort();
    assert_eq!(attempts, [1, 2]);

    let mut balances = [(a.prior_balance(), a.new_balance), (b.prior_balance(), b.new_balance)];
    balances.sort();
    assert_eq!(balances, [(100, 180), (180, 260)]);
    assert_eq!(store.inner.get_or_create("u1").await.unwrap(), 260);
}

#[tokio::test]
async fn test_constant_contention_exhausts_without_mutation() {
    let store = Arc::new(MeddlingStore::new(MemoryStore::new(1000)));
    let engine = engine(store.clone(), Arc::new(ScriptedWheel::new([1]).unwrap()));

    let err = engine.place_bet("u1", "red", 100).await.unwrap_err();
    assert_eq!(err, LedgerError::ConcurrencyExhausted { attempts: 5 });

    // Only the meddler's own +1s landed; the bet left no trace.
    let meddles = store.meddles.load(Ordering::SeqCst) as i64;
    assert_eq!(meddles, 5);
    assert_eq!(store.inner.get_or_create("u1").await.unwrap(), 1000 + meddles);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_bets_conserve_balance() {
    let store = Arc::new(MemoryStore::new(1000));
    let engine = Arc::new(WagerEngine::new(
        store.clone(),
        Arc::new(SeededWheel::new(7)),
        EngineConfig {
            max_attempts: 1_000,
            bet_timeout: Duration::from_secs(10),
        },
    ));

    // 60 bets of 10 can lose at most 600 of the 1000, so funds never run out.
    let tasks = (0..60).map(|i| {
        let engine = engine.clone();
        let bet = BetType::ALL[i % BetType::ALL.len()];
        tokio::spawn(async move { engine.place_bet("shared", bet.as_str(), 10).await })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let mut net = 0;
    for result in &results {
        let r = result.as_ref().unwrap();
        assert!(r.delta == 10 || r.delta == -10);
        assert_eq!(r.new_balance, r.prior_balance() + r.delta);
        net += r.delta;
    }

    assert_eq!(results.len(), 60);
    assert_eq!(store.get_or_create("shared").await.unwrap(), 1000 + net);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unrelated_users_do_not_contend() {
    let store = Arc::new(MemoryStore::new(1000));
    let engine = Arc::new(WagerEngine::new(
        store.clone(),
        Arc::new(SeededWheel::new(99)),
        EngineConfig::default(),
    ));

    let tasks = (0..20).map(|i| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.place_bet(&format!("user-{i}"), "even", 500).await })
    });

    for joined in join_all(tasks).await {
        let r = joined.unwrap().unwrap();
        assert_eq!(r.attempts, 1, "no other writer touched this account");
        assert!(r.new_balance == 1500 || r.new_balance == 500);
    }
    assert_eq!(store.len(), 20);
}

#[tokio::test]
async fn test_balance_round_trip_after_each_bet() {
    let store = Arc::new(MemoryStore::new(1000));
    let engine = engine(store, Arc::new(SeededWheel::new(2024)));

    for amount in [100, 50, 25, 200, 1] {
        match engine.place_bet("u1", "black", amount).await {
            Ok(r) => assert_eq!(engine.get_balance("u1").await.unwrap(), r.new_balance),
            Err(LedgerError::InsufficientFunds { balance, .. }) => {
                assert_eq!(engine.get_balance("u1").await.unwrap(), balance)
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
