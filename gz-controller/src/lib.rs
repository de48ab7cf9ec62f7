//! The pipeline cycle controller.
//!
//! Each cycle runs self-play, the external distillation driver, the arena
//! gate, and (after a promotion) the publish stages, in fixed order. Stage
//! failures are recorded in the status document and never exit the
//! process.

pub mod cycle;
pub mod tuning;

pub use cycle::{run_cycle, run_pipeline, CycleOutcome};
pub use tuning::{apply_tuning, arena_feedback, load_tuning, save_tuning, Tuning};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
