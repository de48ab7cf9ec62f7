//! Tactical layer: deterministic threat scans and the forced-win solvers
//! that short-circuit the main search.

pub mod solver;
pub mod threats;

pub use solver::{find_defense, find_forced_win, find_threat_win, SolverBudget};
pub use threats::{detect, Threats};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod threats_tests;
