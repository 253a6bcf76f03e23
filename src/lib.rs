//! Roulette ledger: per-user balances with race-free bet settlement.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod store;
pub mod engine;
pub mod commands;
pub mod server;
