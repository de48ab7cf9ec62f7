//! Arena gating: symmetric head-to-head matches with early stopping, and
//! the promotion that follows a pass.

pub mod arena;
pub mod promote;

pub use arena::{
    gate_decision, run_arena, write_arena_result, ArenaError, ArenaReport, GateDecision,
};
pub use promote::promote_candidate;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
