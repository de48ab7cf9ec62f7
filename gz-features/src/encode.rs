//! Feature encoding implementation for schema v1.

use gz_core::{Board, Stone};

use crate::schema::{feature_len, Features, PLANES};

/// Encode a board from the point of view of `to_move`.
pub fn encode_board_v1(board: &Board, to_move: Stone) -> Features {
    let n = board.size();
    let mut data = vec![0.0f32; feature_len(n)];
    let black_to_move = if to_move == Stone::Black { 1.0 } else { 0.0 };

    for (i, cell) in board.cells().iter().enumerate() {
        let base = i * PLANES;
        match cell {
            Some(s) if *s == to_move => data[base] = 1.0,
            Some(_) => data[base + 1] = 1.0,
            None => {}
        }
        data[base + 2] = black_to_move;
    }

    Features { n, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gz_core::Move;

    #[test]
    fn planes_follow_the_side_to_move() {
        let mut b = Board::new(15);
        b.place(Move::new(7, 7), Stone::Black);
        b.place(Move::new(8, 8), Stone::White);

        let f = encode_board_v1(&b, Stone::Black);
        assert_eq!(f.at(7, 7, 0), 1.0);
        assert_eq!(f.at(7, 7, 1), 0.0);
        assert_eq!(f.at(8, 8, 1), 1.0);
        assert_eq!(f.at(0, 0, 2), 1.0);

        let f = encode_board_v1(&b, Stone::White);
        assert_eq!(f.at(7, 7, 1), 1.0);
        assert_eq!(f.at(8, 8, 0), 1.0);
        assert_eq!(f.at(0, 0, 2), 0.0);
    }

    #[test]
    fn length_matches_schema() {
        let b = Board::new(9);
        let f = encode_board_v1(&b, Stone::Black);
        assert_eq!(f.data.len(), feature_len(9));
        assert_eq!(f.n, 9);
    }
}
