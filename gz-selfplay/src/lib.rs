//! Self-play: per-game workers and the orchestrator that collects their
//! samples into the replay buffer.

pub mod hub;
pub mod orchestrator;
pub mod worker;

pub use hub::ModelHub;
pub use orchestrator::{run_orchestrator, OrchestratorError, OrchestratorReport};
pub use worker::{play_one_game, think_time_for_move, GameRecord, WorkerError, WorkerMsg};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod worker_tests;
