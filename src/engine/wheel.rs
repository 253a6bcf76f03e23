//! Wheel sources.
//!
//! A `SpinSource` draws one pocket from a single-zero wheel: 37 equally
//! likely numbers, 0 through 36. Zero is the house pocket and loses every
//! even-money bet.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::types::{Color, Parity, SpinOutcome, MAX_NUMBER};

const ZERO: SpinOutcome = SpinOutcome {
    number: 0,
    color: Color::Green,
    parity: Parity::None,
};

/// Source of roulette numbers. Implementations must be uniform over
/// `0..=MAX_NUMBER` unless they are deliberately scripted.
pub trait SpinSource: Send + Sync {
    /// Draw a pocket number in `0..=MAX_NUMBER`.
    fn draw(&self) -> u8;

    /// Draw a pocket and derive its colour and parity.
    fn spin(&self) -> SpinOutcome {
        let number = self.draw();
        debug_assert!(number <= MAX_NUMBER, "wheel drew off-wheel number {number}");
        SpinOutcome::from_number(number % (MAX_NUMBER + 1)).unwrap_or(ZERO)
    }
}

// ---------------------------------------------------------------------------
// Random wheel
// ---------------------------------------------------------------------------

/// Production wheel backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomWheel;

impl SpinSource for RandomWheel {
    fn draw(&self) -> u8 {
        rand::thread_rng().gen_range(0..=MAX_NUMBER)
    }
}

// ---------------------------------------------------------------------------
// Seeded wheel
// ---------------------------------------------------------------------------

/// Reproducible wheel: the same seed yields the same sequence of pockets.
pub struct SeededWheel {
    rng: Mutex<StdRng>,
}

impl SeededWheel {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl SpinSource for SeededWheel {
    fn draw(&self) -> u8 {
        // A poisoned RNG is still a valid RNG.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..=MAX_NUMBER)
    }
}

// ---------------------------------------------------------------------------
// Scripted wheel
// ---------------------------------------------------------------------------

/// Replays a fixed list of pockets, cycling when exhausted.
/// Used to force exact outcomes in tests and demos.
#[derive(Debug)]
pub struct ScriptedWheel {
    numbers: Vec<u8>,
    draws: AtomicUsize,
}

impl ScriptedWheel {
    /// Returns `None` if the script is empty or contains an off-wheel number.
    pub fn new(numbers: impl IntoIterator<Item = u8>) -> Option<Self> {
        let numbers: Vec<u8> = numbers.into_iter().collect();
        if numbers.is_empty() || numbers.iter().any(|&n| n > MAX_NUMBER) {
            return None;
        }
        Some(Self {
            numbers,
            draws: AtomicUsize::new(0),
        })
    }

    /// How many pockets have been drawn so far.
    pub fn draws(&self) -> usize {
        self.draws.load(Ordering::SeqCst)
    }
}

impl SpinSource for ScriptedWheel {
    fn draw(&self) -> u8 {
        let i = self.draws.fetch_add(1, Ordering::SeqCst);
        self.numbers[i % self.numbers.len()]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
