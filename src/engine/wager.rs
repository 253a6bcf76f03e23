//! Wager engine: validate, spin, settle.
//!
//! Each `place_bet` call is a self-contained optimistic transaction:
//! read the balance, check funds, spin, and commit conditionally on the
//! balance just read. A conflicting commit redoes the whole attempt,
//! spin included, against a fresh balance.
//!
//! Concurrent bets from one user are serializable but not FIFO: whichever
//! commit lands first wins the race and the other re-reads. Callers must
//! not assume settlement order matches submission order.
//!
//! The bet timeout is a deadline checked before each attempt and enforced
//! on balance reads. A commit, once issued, is always awaited: dropping it
//! could leave a settlement applied that the caller was told to retry.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::engine::wheel::SpinSource;
use crate::store::{BalanceStore, CommitOutcome};
use crate::types::{Account, BetResult, BetSpec, LedgerError, StoreError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Commit attempts before giving up with `ConcurrencyExhausted`.
    pub max_attempts: u32,
    /// Deadline for one bet. Checked before each attempt and applied to
    /// balance reads; an in-flight commit is never abandoned.
    pub bet_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            bet_timeout: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct WagerEngine {
    store: Arc<dyn BalanceStore>,
    wheel: Arc<dyn SpinSource>,
    config: EngineConfig,
}

impl WagerEngine {
    pub fn new(
        store: Arc<dyn BalanceStore>,
        wheel: Arc<dyn SpinSource>,
        config: EngineConfig,
    ) -> Self {
        Self { store, wheel, config }
    }

    /// Current balance, creating the account on first sight.
    pub async fn get_balance(&self, user_id: &str) -> Result<i64, LedgerError> {
        check_user_id(user_id)?;
        Ok(self.store.get_or_create(user_id).await?)
    }

    /// Full account record without creating one.
    pub async fn account(&self, user_id: &str) -> Result<Option<Account>, LedgerError> {
        check_user_id(user_id)?;
        Ok(self.store.fetch_account(user_id).await?)
    }

    /// Validate raw input and settle the bet.
    pub async fn place_bet(
        &self,
        user_id: &str,
        bet_type: &str,
        amount: i64,
    ) -> Result<BetResult, LedgerError> {
        check_user_id(user_id)?;
        let spec = BetSpec::parse(bet_type, amount)?;
        self.place(user_id, spec).await
    }

    /// Settle an already-validated bet within the configured deadline.
    pub async fn place(&self, user_id: &str, spec: BetSpec) -> Result<BetResult, LedgerError> {
        check_user_id(user_id)?;
        if spec.amount <= 0 {
            return Err(LedgerError::InvalidAmount(spec.amount));
        }

        let span = info_span!(
            "bet",
            bet_id = %Uuid::new_v4(),
            user_id,
            bet_type = %spec.bet_type,
            amount = spec.amount
        );

        self.settle(user_id, spec, Instant::now())
            .instrument(span)
            .await
    }

    /// The optimistic retry loop.
    async fn settle(
        &self,
        user_id: &str,
        spec: BetSpec,
        started: Instant,
    ) -> Result<BetResult, LedgerError> {
        let max_attempts = self.config.max_attempts.max(1);
        let deadline = started + self.config.bet_timeout;

        for attempt in 1..=max_attempts {
            if Instant::now() >= deadline {
                return Err(timed_out(started, attempt));
            }

            let balance =
                match tokio::time::timeout_at(deadline, self.store.get_or_create(user_id)).await {
                    Ok(read) => read?,
                    Err(_) => return Err(timed_out(started, attempt)),
                };

            // Always against the balance just read; a retry may flip this.
            if spec.amount > balance {
                debug!(attempt, balance, "Rejected: insufficient funds");
                return Err(LedgerError::InsufficientFunds {
                    amount: spec.amount,
                    balance,
                });
            }

            let outcome = self.wheel.spin();
            let won = spec.bet_type.wins_on(&outcome);
            let delta = if won { spec.amount } else { -spec.amount };
            if balance.checked_add(delta).is_none() {
                return Err(StoreError::Backend(format!(
                    "settlement overflows balance ({balance} + {delta})"
                ))
                .into());
            }

            debug!(attempt, balance, number = outcome.number, won, "Attempting commit");

            match self.store.commit_settlement(user_id, balance, delta).await? {
                CommitOutcome::Applied(new_balance) => {
                    debug_assert_eq!(Some(new_balance), balance.checked_add(delta));
                    info!(
                        attempt,
                        number = outcome.number,
                        color = %outcome.color,
                        won,
                        delta,
                        new_balance,
                        "Bet settled"
                    );
                    return Ok(BetResult {
                        won,
                        delta,
                        new_balance,
                        outcome,
                        bet_type: spec.bet_type,
                        amount: spec.amount,
                        attempts: attempt,
                    });
                }
                CommitOutcome::Conflict => {
                    debug!(attempt, expected = balance, "Commit conflicted, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(attempts = max_attempts, "Retry budget exhausted");
        Err(LedgerError::ConcurrencyExhausted {
            attempts: max_attempts,
        })
    }
}

fn timed_out(started: Instant, attempt: u32) -> LedgerError {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    warn!(elapsed_ms, attempt, "Bet timed out before settling");
    LedgerError::TimedOut { elapsed_ms }
}

fn check_user_id(user_id: &str) -> Result<(), LedgerError> {
    if user_id.trim().is_empty() {
        return Err(LedgerError::EmptyUserId);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
