//! Shared types for the wagering ledger.
//!
//! These types form the data model used across the store, engine,
//! command and server modules. Nothing here performs I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Balance every account starts with on first access.
pub const DEFAULT_STARTING_BALANCE: i64 = 1000;

/// Highest number on the wheel. The wheel has `MAX_NUMBER + 1` pockets.
pub const MAX_NUMBER: u8 = 36;

/// Red pockets on a single-zero wheel.
pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

// ---------------------------------------------------------------------------
// Bet types
// ---------------------------------------------------------------------------

/// The even-money bets a user can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Red,
    Black,
    Odd,
    Even,
}

impl BetType {
    pub const ALL: [BetType; 4] = [BetType::Red, BetType::Black, BetType::Odd, BetType::Even];

    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Red => "red",
            BetType::Black => "black",
            BetType::Odd => "odd",
            BetType::Even => "even",
        }
    }

    /// Whether this bet wins against the given spin.
    pub fn wins_on(&self, outcome: &SpinOutcome) -> bool {
        match self {
            BetType::Red => outcome.color == Color::Red,
            BetType::Black => outcome.color == Color::Black,
            BetType::Odd => outcome.parity == Parity::Odd,
            BetType::Even => outcome.parity == Parity::Even,
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetType {
    type Err = LedgerError;

    /// Accepts the four bet names, ignoring case and surrounding whitespace.
    /// "green" and "none" name real outcomes but are not wagerable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(BetType::Red),
            "black" => Ok(BetType::Black),
            "odd" => Ok(BetType::Odd),
            "even" => Ok(BetType::Even),
            _ => Err(LedgerError::InvalidBetType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Spin outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Red,
    Black,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Green => write!(f, "green"),
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black"),
        }
    }
}

/// Parity of a pocket. Zero is neither odd nor even.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::None => write!(f, "none"),
            Parity::Odd => write!(f, "odd"),
            Parity::Even => write!(f, "even"),
        }
    }
}

/// The pocket the ball landed in, with its derived colour and parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinOutcome {
    pub number: u8,
    pub color: Color,
    pub parity: Parity,
}

impl SpinOutcome {
    /// Derive the outcome for a pocket. Returns `None` for numbers off the wheel.
    pub fn from_number(number: u8) -> Option<Self> {
        if number > MAX_NUMBER {
            return None;
        }

        let (color, parity) = if number == 0 {
            (Color::Green, Parity::None)
        } else {
            let color = if RED_NUMBERS.contains(&number) {
                Color::Red
            } else {
                Color::Black
            };
            let parity = if number % 2 == 0 { Parity::Even } else { Parity::Odd };
            (color, parity)
        };

        Some(Self { number, color, parity })
    }
}

impl fmt::Display for SpinOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number, self.color)
    }
}

// ---------------------------------------------------------------------------
// Bets and accounts
// ---------------------------------------------------------------------------

/// A validated intention to bet. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetSpec {
    pub bet_type: BetType,
    pub amount: i64,
}

impl BetSpec {
    /// Validate raw front-end input. The bet type is checked before the amount.
    pub fn parse(bet_type: &str, amount: i64) -> Result<Self, LedgerError> {
        let bet_type = bet_type.parse::<BetType>()?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Ok(Self { bet_type, amount })
    }
}

/// A settled bet, returned to the caller for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetResult {
    pub won: bool,
    /// `+amount` on a win, `-amount` on a loss.
    pub delta: i64,
    pub new_balance: i64,
    pub outcome: SpinOutcome,
    pub bet_type: BetType,
    pub amount: i64,
    /// Number of commit attempts it took to settle (1 when uncontended).
    pub attempts: u32,
}

impl BetResult {
    /// Balance the settlement was applied against.
    pub fn prior_balance(&self) -> i64 {
        self.new_balance - self.delta
    }
}

/// The persisted balance record for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures reported by a `BalanceStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Transient: network, timeout, pool exhaustion, lock contention.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Non-transient backend failure (schema, decode, constraint).
    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Every way `place_bet` or `get_balance` can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("User id must not be empty")]
    EmptyUserId,

    #[error("Invalid bet type: {0:?}")]
    InvalidBetType(String),

    #[error("Invalid bet amount: {0}")]
    InvalidAmount(i64),

    #[error("Insufficient funds: bet {amount}, balance {balance}")]
    InsufficientFunds { amount: i64, balance: i64 },

    #[error("Settlement conflicted on all {attempts} attempts")]
    ConcurrencyExhausted { attempts: u32 },

    #[error("Settlement timed out after {elapsed_ms}ms")]
    TimedOut { elapsed_ms: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Whether the caller may resubmit the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::ConcurrencyExhausted { .. } | LedgerError::TimedOut { .. } => true,
            LedgerError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Short machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::EmptyUserId => "empty_user_id",
            LedgerError::InvalidBetType(_) => "invalid_bet_type",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::ConcurrencyExhausted { .. } => "concurrency_exhausted",
            LedgerError::TimedOut { .. } => "timed_out",
            LedgerError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            LedgerError::Store(StoreError::Backend(_)) => "store_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
