//! Search tree nodes.

use gz_core::{Move, Stone};

pub type NodeId = u32;

/// One prospective child edge. `child` stays `None` until the first descent
/// through this edge materializes a node.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub mv: Move,
    pub prior: f32,
    pub child: Option<NodeId>,
}

/// A search node. Candidates are sorted by descending prior (stable with
/// respect to the row-major move order), and progressive widening exposes a
/// growing prefix of them to selection.
#[derive(Debug, Clone)]
pub struct Node {
    pub to_move: Stone,
    /// Move that led here; `Move::NONE` at the root.
    pub mv: Move,
    pub depth: u16,
    pub visits: u32,
    pub value_sum: f32,
    pub expanded: bool,
    /// Set when the move into this node ended the game: the value from this
    /// node's side-to-move perspective (-1 for a loss, 0 for a full board).
    pub terminal: Option<f32>,
    pub candidates: Vec<Candidate>,
}

impl Node {
    pub fn new(to_move: Stone, mv: Move, depth: u16) -> Node {
        Node {
            to_move,
            mv,
            depth,
            visits: 0,
            value_sum: 0.0,
            expanded: false,
            terminal: None,
            candidates: Vec::new(),
        }
    }

    /// Mean value from this node's side-to-move perspective.
    pub fn value(&self) -> f32 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / self.visits as f32
        }
    }

    pub fn candidate_for(&self, mv: Move) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.mv == mv)
    }
}
