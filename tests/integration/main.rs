//! Integration tests for the ledger, run against the public API.

mod concurrency;
mod sqlite;
mod support;
