//! Core engine: spin sources and the optimistic settlement loop.

pub mod wager;
pub mod wheel;

pub use wager::{EngineConfig, WagerEngine};
pub use wheel::{RandomWheel, ScriptedWheel, SeededWheel, SpinSource};
