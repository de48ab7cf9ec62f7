use gz_core::{Board, Move, Stone};

use crate::threats::detect;

fn board_with(stones: &[(i16, i16, Stone)]) -> Board {
    let mut b = Board::new(15);
    for &(r, c, s) in stones {
        assert!(b.place(Move::new(r, c), s));
    }
    b
}

#[test]
fn finds_immediate_win_cells() {
    let b = board_with(&[
        (7, 4, Stone::Black),
        (7, 5, Stone::Black),
        (7, 6, Stone::Black),
        (7, 7, Stone::Black),
    ]);
    let t = detect(&b, Stone::Black);
    assert!(t.wins.contains(&Move::new(7, 3)));
    assert!(t.wins.contains(&Move::new(7, 8)));
    // The win cells are not double-reported as fours.
    assert!(!t.fours.contains(&Move::new(7, 8)));
}

#[test]
fn gap_completion_is_a_win_not_a_four() {
    // b b _ b b: the gap completes a five outright.
    let b = board_with(&[
        (7, 4, Stone::Black),
        (7, 5, Stone::Black),
        (7, 7, Stone::Black),
        (7, 8, Stone::Black),
    ]);
    let t = detect(&b, Stone::Black);
    assert!(t.wins.contains(&Move::new(7, 6)));
}

#[test]
fn open_four_requires_both_extensions_empty() {
    let open = board_with(&[
        (7, 5, Stone::White),
        (7, 6, Stone::White),
        (7, 7, Stone::White),
    ]);
    let t = detect(&open, Stone::White);
    assert!(t.open_fours.contains(&Move::new(7, 4)));
    assert!(t.open_fours.contains(&Move::new(7, 8)));

    let capped = board_with(&[
        (7, 5, Stone::White),
        (7, 6, Stone::White),
        (7, 7, Stone::White),
        (7, 3, Stone::Black),
    ]);
    let t = detect(&capped, Stone::White);
    // Completing at (7,4) still makes a four, but not an open one.
    assert!(t.fours.contains(&Move::new(7, 4)));
    assert!(!t.open_fours.contains(&Move::new(7, 4)));
}

#[test]
fn open_three_makers_threaten_an_open_four() {
    let b = board_with(&[(7, 5, Stone::White), (7, 6, Stone::White)]);
    let t = detect(&b, Stone::White);
    assert!(t.open_three_makers.contains(&Move::new(7, 7)));
    assert!(t.open_three_makers.contains(&Move::new(7, 4)));
    // A cell far from the pair makes nothing.
    assert!(!t.open_three_makers.contains(&Move::new(7, 10)));
}

#[test]
fn connected_three_needs_one_open_end() {
    let b = board_with(&[
        (0, 1, Stone::Black),
        (0, 2, Stone::Black),
        (1, 0, Stone::White),
    ]);
    let t = detect(&b, Stone::Black);
    // (0,0) completes a three against the edge, open only at (0,3).
    assert!(t.connected_three_makers.contains(&Move::new(0, 0)));
    assert!(t.connected_three_makers.contains(&Move::new(0, 3)));
}

#[test]
fn long_link_bridges_within_three_gaps() {
    let b = board_with(&[(7, 4, Stone::Black), (7, 8, Stone::Black)]);
    let t = detect(&b, Stone::Black);
    assert!(t.long_link_makers.contains(&Move::new(7, 6)));
    assert!(t.long_link_makers.contains(&Move::new(7, 5)));
    assert!(t.long_link_makers.contains(&Move::new(7, 7)));
    // One-sided proximity is not a link.
    assert!(!t.long_link_makers.contains(&Move::new(7, 2)));
}

#[test]
fn opponent_stones_break_patterns() {
    let b = board_with(&[
        (7, 5, Stone::White),
        (7, 6, Stone::White),
        (7, 7, Stone::Black),
    ]);
    let t = detect(&b, Stone::White);
    assert!(!t.open_three_makers.contains(&Move::new(7, 4)));
}

#[test]
fn lists_are_deduplicated() {
    let b = board_with(&[
        (7, 4, Stone::Black),
        (7, 5, Stone::Black),
        (7, 6, Stone::Black),
        (7, 7, Stone::Black),
    ]);
    let t = detect(&b, Stone::Black);
    for list in [&t.wins, &t.fours, &t.open_fours, &t.open_three_makers] {
        let mut seen = std::collections::HashSet::new();
        for mv in list {
            assert!(seen.insert((mv.row, mv.col)), "duplicate {mv:?}");
        }
    }
}
