//! Transposition table keyed by the canonical symmetry-normalized board
//! hash plus side-to-move.

use gz_core::{canonical_key, Board, Stone};
use gz_infer::LruMap;

#[derive(Debug, Clone)]
struct TtEntry {
    value_mean: f32,
    visits: u32,
    /// NN prior vector captured on first evaluation, stored in the
    /// canonical orientation.
    priors: Option<Vec<f32>>,
    board_size: usize,
}

/// Lookup result with the priors already mapped into the orientation of
/// the queried board.
#[derive(Debug, Clone)]
pub struct TtView {
    pub value_mean: f32,
    pub visits: u32,
    pub priors: Option<Vec<f32>>,
}

/// Bounded LRU transposition table. Values are running means over every
/// observed leaf evaluation of the position.
pub struct TranspositionTable {
    inner: LruMap<(String, Stone), TtEntry>,
}

impl TranspositionTable {
    pub fn new(capacity: usize) -> TranspositionTable {
        TranspositionTable {
            inner: LruMap::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Record one observed value for the position. `priors` (given in the
    /// orientation of `board`) are kept only from the first observation, so
    /// the stored vector always matches one specific orientation.
    pub fn observe(&mut self, board: &Board, to_move: Stone, value: f32, priors: Option<&[f32]>) {
        let canon = canonical_key(board);
        let key = (canon.key, to_move);
        if let Some(entry) = self.inner.get(&key) {
            let mut updated = entry.clone();
            updated.visits += 1;
            updated.value_mean += (value - updated.value_mean) / updated.visits as f32;
            self.inner.insert(key, updated);
            return;
        }
        self.inner.insert(
            key,
            TtEntry {
                value_mean: value,
                visits: 1,
                priors: priors.map(|p| canon.transform.apply_policy(p, board.size())),
                board_size: board.size(),
            },
        );
    }

    pub fn lookup(&mut self, board: &Board, to_move: Stone) -> Option<TtView> {
        let canon = canonical_key(board);
        let entry = self.inner.get(&(canon.key, to_move))?;
        if entry.board_size != board.size() {
            return None;
        }
        let priors = entry
            .priors
            .as_ref()
            .map(|p| canon.transform.inverse().apply_policy(p, entry.board_size));
        Some(TtView {
            value_mean: entry.value_mean,
            visits: entry.visits,
            priors,
        })
    }
}
