//! PUCT MCTS with a tactical augmentation layer.
//!
//! The search engine layers four short-circuits in front of the main loop
//! (threat-space win, forced win, one-ply mate/block, defensive refutation)
//! and then runs batched, progressively-widened PUCT guided by the network,
//! the threat detector and the transposition table.

pub mod arena;
pub mod node;
pub mod search;
pub mod swap2;
pub mod tt;

pub use arena::Arena;
pub use node::{Node, NodeId};
pub use search::{Mcts, MoveVisits, SearchError, SearchResult, SearchSource, SearchStats};
pub use swap2::{propose_opening, second_player_choice, Swap2Choice, Swap2Outcome};
pub use tt::{TranspositionTable, TtView};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tt_tests;
