//! Board kernel for 15x15 five-in-a-row: representation, rules, symmetries.
//!
//! Everything that touches stones on a grid lives here. The crate is
//! dependency-light on purpose so that search, tactics and the server can all
//! share it without pulling in I/O concerns.

pub mod board;
pub mod config;
pub mod rules;
pub mod symmetry;

pub use board::{Board, Move, Stone};
pub use config::{Config, ConfigError};
pub use rules::{
    candidate_radius, check_win, four_dirs, is_forbidden, legal_moves, open_three_dirs,
};
pub use symmetry::{canonical_key, CanonicalKey, Transform};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default board side length.
pub const DEFAULT_BOARD_SIZE: usize = 15;
