//! The eight square symmetries and the canonical (minimum-lex) board key.

use crate::board::{Board, Move};

/// The dihedral group of the square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Identity,
    Rot90,
    Rot180,
    Rot270,
    FlipH,
    FlipV,
    Transpose,
    AntiTranspose,
}

impl Transform {
    pub const ALL: [Transform; 8] = [
        Transform::Identity,
        Transform::Rot90,
        Transform::Rot180,
        Transform::Rot270,
        Transform::FlipH,
        Transform::FlipV,
        Transform::Transpose,
        Transform::AntiTranspose,
    ];

    /// The transform that undoes `self`. Only the quarter rotations are not
    /// their own inverse.
    pub fn inverse(self) -> Transform {
        match self {
            Transform::Rot90 => Transform::Rot270,
            Transform::Rot270 => Transform::Rot90,
            other => other,
        }
    }

    /// Map a coordinate on an `n`-sized board. `Move::NONE` maps to itself.
    pub fn apply_move(self, mv: Move, n: usize) -> Move {
        if mv.is_none() {
            return mv;
        }
        let m = (n - 1) as i16;
        let (r, c) = (mv.row, mv.col);
        let (nr, nc) = match self {
            Transform::Identity => (r, c),
            Transform::Rot90 => (c, m - r),
            Transform::Rot180 => (m - r, m - c),
            Transform::Rot270 => (m - c, r),
            Transform::FlipH => (r, m - c),
            Transform::FlipV => (m - r, c),
            Transform::Transpose => (c, r),
            Transform::AntiTranspose => (m - c, m - r),
        };
        Move::new(nr, nc)
    }

    pub fn apply_board(self, board: &Board) -> Board {
        let n = board.size();
        let mut cells = vec![None; n * n];
        for (i, cell) in board.cells().iter().enumerate() {
            if cell.is_some() {
                let mv = self.apply_move(Move::from_flat(i, n), n);
                cells[mv.flat(n)] = *cell;
            }
        }
        Board::from_cells(n, cells).expect("transform preserves cell count")
    }

    /// Map a flat policy vector: `out[t(m)] = input[m]`.
    pub fn apply_policy(self, policy: &[f32], n: usize) -> Vec<f32> {
        let mut out = vec![0.0; policy.len()];
        for (i, &p) in policy.iter().enumerate() {
            let mv = self.apply_move(Move::from_flat(i, n), n);
            out[mv.flat(n)] = p;
        }
        out
    }
}

/// The canonical key of a board orbit plus the transform that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalKey {
    /// Lexicographic minimum of the eight symmetric `Board::key()` strings.
    pub key: String,
    /// Transform mapping the *original* orientation to the canonical one.
    pub transform: Transform,
}

/// Canonicalize a board: the minimum-lex key over all eight symmetries.
///
/// Consumers that store orientation-dependent data under the key (TT priors,
/// book moves) must map through `transform` on insert and through
/// `transform.inverse()` on lookup.
pub fn canonical_key(board: &Board) -> CanonicalKey {
    let mut best: Option<(String, Transform)> = None;
    for t in Transform::ALL {
        let key = t.apply_board(board).key();
        match &best {
            Some((k, _)) if *k <= key => {}
            _ => best = Some((key, t)),
        }
    }
    let (key, transform) = best.expect("eight candidates");
    CanonicalKey { key, transform }
}
