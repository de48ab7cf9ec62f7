//! Legal move generation, win detection and the black forbidden-move rule.

use crate::board::{Board, Move, Stone};

/// The four line directions (the opposite senses are scanned implicitly).
pub const DIRECTIONS: [(i16, i16); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// True iff the stone at `last_move` completes a run of five or more for
/// `player`. The stone must already be on the board.
pub fn check_win(board: &Board, player: Stone, last_move: Move) -> bool {
    if board.get(last_move.row, last_move.col) != Some(player) {
        return false;
    }
    for &(dr, dc) in &DIRECTIONS {
        let run = 1 + run_length(board, player, last_move, dr, dc)
            + run_length(board, player, last_move, -dr, -dc);
        if run >= 5 {
            return true;
        }
    }
    false
}

fn run_length(board: &Board, player: Stone, from: Move, dr: i16, dc: i16) -> usize {
    let mut len = 0;
    let (mut r, mut c) = (from.row + dr, from.col + dc);
    while board.get(r, c) == Some(player) {
        len += 1;
        r += dr;
        c += dc;
    }
    len
}

/// Candidate generation radius: 2 while the board is sparse, 1 afterwards.
pub fn candidate_radius(board: &Board) -> i16 {
    let early_limit = 6usize.max(board.size() / 3);
    if board.stone_count() <= early_limit {
        2
    } else {
        1
    }
}

/// Empty cells within Chebyshev distance `radius` of any stone, in stable
/// row-major order. An empty board yields the single center cell.
pub fn legal_moves(board: &Board, radius: i16) -> Vec<Move> {
    let n = board.size();
    if board.stone_count() == 0 {
        return vec![board.center()];
    }
    let mut near = vec![false; n * n];
    for (mv, _) in board.occupied() {
        for dr in -radius..=radius {
            for dc in -radius..=radius {
                let (r, c) = (mv.row + dr, mv.col + dc);
                if board.is_empty_cell(r, c) {
                    near[r as usize * n + c as usize] = true;
                }
            }
        }
    }
    near.iter()
        .enumerate()
        .filter(|(_, &m)| m)
        .map(|(i, _)| Move::from_flat(i, n))
        .collect()
}

/// Black forbidden-move test (3-3 and 4-4).
///
/// A move that completes a five is always legal and overrides the check.
/// Otherwise the move is forbidden iff placing it creates two or more open
/// threes in distinct directions, or two or more fours in distinct
/// directions. White moves are never forbidden.
pub fn is_forbidden(board: &Board, mv: Move) -> bool {
    if mv.is_none() || !board.is_empty_cell(mv.row, mv.col) {
        return false;
    }
    let mut b = board.clone();
    b.place(mv, Stone::Black);
    if check_win(&b, Stone::Black, mv) {
        return false;
    }

    let mut open_threes = 0;
    let mut fours = 0;
    for &(dr, dc) in &DIRECTIONS {
        if open_three_in_dir(&b, mv, Stone::Black, dr, dc) {
            open_threes += 1;
        }
        if four_in_dir(&b, mv, Stone::Black, dr, dc) {
            fours += 1;
        }
    }
    open_threes >= 2 || fours >= 2
}

/// Count directions in which the stone at `mv` (already placed) forms an
/// open three for `player`.
pub fn open_three_dirs(board: &Board, mv: Move, player: Stone) -> u8 {
    DIRECTIONS
        .iter()
        .filter(|&&(dr, dc)| open_three_in_dir(board, mv, player, dr, dc))
        .count() as u8
}

/// Count directions in which the stone at `mv` (already placed) forms a
/// four for `player`.
pub fn four_dirs(board: &Board, mv: Move, player: Stone) -> u8 {
    DIRECTIONS
        .iter()
        .filter(|&&(dr, dc)| four_in_dir(board, mv, player, dr, dc))
        .count() as u8
}

/// Open three along one direction: some 6-cell window through `mv` whose two
/// frame cells are empty and whose four inner cells hold exactly three
/// friendly stones and one empty, with no opponent anywhere in the window.
fn open_three_in_dir(board: &Board, mv: Move, player: Stone, dr: i16, dc: i16) -> bool {
    let opp = player.opponent();
    // The placed stone must sit on one of the four inner cells.
    'window: for s in -4i16..=-1 {
        let mut friendly = 0;
        let mut empties_inner = 0;
        for i in 0..6i16 {
            let (r, c) = (mv.row + (s + i) * dr, mv.col + (s + i) * dc);
            if !board.in_bounds(r, c) {
                continue 'window;
            }
            match board.get(r, c) {
                Some(st) if st == opp => continue 'window,
                Some(_) => {
                    if i == 0 || i == 5 {
                        continue 'window;
                    }
                    friendly += 1;
                }
                None => {
                    if i != 0 && i != 5 {
                        empties_inner += 1;
                    }
                }
            }
        }
        if friendly == 3 && empties_inner == 1 {
            return true;
        }
    }
    false
}

/// Four along one direction: some 5-cell window through `mv` holding exactly
/// four friendly stones and one empty, with no opponent.
fn four_in_dir(board: &Board, mv: Move, player: Stone, dr: i16, dc: i16) -> bool {
    let opp = player.opponent();
    'window: for s in -4i16..=0 {
        let mut friendly = 0;
        for i in 0..5i16 {
            let (r, c) = (mv.row + (s + i) * dr, mv.col + (s + i) * dc);
            if !board.in_bounds(r, c) {
                continue 'window;
            }
            match board.get(r, c) {
                Some(st) if st == opp => continue 'window,
                Some(_) => friendly += 1,
                None => {}
            }
        }
        if friendly == 4 {
            return true;
        }
    }
    false
}
