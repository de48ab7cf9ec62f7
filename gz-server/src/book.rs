//! The preloaded opening book.
//!
//! Entries arrive keyed by a plain board hash; they are canonicalized at
//! load time so a single entry answers the whole symmetry orbit. Lookups
//! map the stored move back into the orientation of the queried board.

use std::collections::HashMap;
use std::path::Path;

use gz_core::{canonical_key, Board, Move};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BookEntryRaw {
    /// Rows joined by '|' using 'b'/'w'/'-'.
    board_hash: String,
    best_move: [i16; 2],
    #[serde(default)]
    #[allow(dead_code)]
    move_count: Option<u32>,
}

pub struct OpeningBook {
    /// Canonical key -> best move in the canonical orientation.
    entries: HashMap<String, Move>,
    pub skipped: usize,
}

impl OpeningBook {
    pub fn empty() -> OpeningBook {
        OpeningBook {
            entries: HashMap::new(),
            skipped: 0,
        }
    }

    /// Load and canonicalize a book file (a JSON array of entries).
    /// Unparsable boards and out-of-board moves are counted and skipped.
    pub fn load(path: &Path) -> std::io::Result<OpeningBook> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: Vec<BookEntryRaw> = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut book = OpeningBook::empty();
        for entry in parsed {
            let Some(board) = Board::from_key(&entry.board_hash) else {
                book.skipped += 1;
                continue;
            };
            let mv = Move::new(entry.best_move[0], entry.best_move[1]);
            if !board.is_empty_cell(mv.row, mv.col) {
                book.skipped += 1;
                continue;
            }
            let canon = canonical_key(&board);
            let canon_mv = canon.transform.apply_move(mv, board.size());
            book.entries.entry(canon.key).or_insert(canon_mv);
        }
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look the board up under its canonical key; the returned move is in
    /// the orientation of `board` and verified to land on an empty cell.
    pub fn lookup(&self, board: &Board) -> Option<Move> {
        let canon = canonical_key(board);
        let stored = *self.entries.get(&canon.key)?;
        let mv = canon.transform.inverse().apply_move(stored, board.size());
        if board.is_empty_cell(mv.row, mv.col) {
            Some(mv)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gz_core::{Stone, Transform};

    fn book_file(dir: &Path, entries: &str) -> std::path::PathBuf {
        let path = dir.join("book.json");
        std::fs::write(&path, entries).unwrap();
        path
    }

    fn one_stone_board() -> Board {
        let mut b = Board::new(5);
        b.place(Move::new(1, 2), Stone::Black);
        b
    }

    #[test]
    fn lookup_follows_the_query_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let b = one_stone_board();
        let json = format!(
            r#"[{{"board_hash": "{}", "best_move": [2, 2], "move_count": 1}}]"#,
            b.key()
        );
        let book = OpeningBook::load(&book_file(dir.path(), &json)).unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.skipped, 0);

        assert_eq!(book.lookup(&b), Some(Move::new(2, 2)));
        for t in Transform::ALL {
            let tb = t.apply_board(&b);
            let hit = book.lookup(&tb).expect("orbit hit");
            assert_eq!(hit, t.apply_move(Move::new(2, 2), 5), "{t:?}");
        }
    }

    #[test]
    fn occupied_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let b = one_stone_board();
        // Book move points at the occupied cell.
        let json = format!(
            r#"[{{"board_hash": "{}", "best_move": [1, 2]}}]"#,
            b.key()
        );
        let book = OpeningBook::load(&book_file(dir.path(), &json)).unwrap();
        assert_eq!(book.len(), 0);
        assert_eq!(book.skipped, 1);
    }

    #[test]
    fn garbage_entries_are_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"[
            {"board_hash": "zzz|zzz", "best_move": [0, 0]},
            {"board_hash": "---|---|---", "best_move": [1, 1]}
        ]"#;
        let book = OpeningBook::load(&book_file(dir.path(), json)).unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.skipped, 1);
    }

    #[test]
    fn unknown_position_misses() {
        let book = OpeningBook::empty();
        assert!(book.lookup(&one_stone_board()).is_none());
    }
}
