//! Replay buffer: one JSON object per line, append-only files, immutable
//! once closed.

pub mod sample;
pub mod writer;

pub use sample::{board_to_state, state_to_board, SampleMeta, TrainingSample};
pub use writer::{cleanup_tmp_files, ReplayError, ReplayWriter};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod writer_tests;
