//! The training sample schema.

use gz_core::{Board, Move, Stone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sample provenance and bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleMeta {
    pub source: String,
    #[serde(rename = "gameId")]
    pub game_id: String,
    #[serde(rename = "moveIndex")]
    pub move_index: u32,
    #[serde(rename = "totalMoves")]
    pub total_moves: u32,
    /// Game result from black's perspective.
    pub result: i8,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

/// One replay record: the position, the search-derived policy target, the
/// raw network outputs captured before the search, and the final game value
/// from the sample's side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingSample {
    pub state: Vec<Vec<Option<Stone>>>,
    pub player: Stone,
    pub mcts_policy: Vec<f32>,
    pub teacher_policy: Vec<f32>,
    pub teacher_value: f32,
    pub final_value: i8,
    pub meta: SampleMeta,
}

/// Board to nested row arrays (the wire format).
pub fn board_to_state(board: &Board) -> Vec<Vec<Option<Stone>>> {
    let n = board.size();
    (0..n)
        .map(|r| (0..n).map(|c| board.get(r as i16, c as i16)).collect())
        .collect()
}

/// Nested row arrays back to a board. Ragged input is rejected.
pub fn state_to_board(state: &[Vec<Option<Stone>>]) -> Option<Board> {
    let n = state.len();
    if state.iter().any(|row| row.len() != n) {
        return None;
    }
    let mut b = Board::new(n);
    for (r, row) in state.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if let Some(stone) = cell {
                b.place(Move::new(r as i16, c as i16), *stone);
            }
        }
    }
    Some(b)
}
