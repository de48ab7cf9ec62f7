use gz_core::{Board, Move, Stone, Transform};

use crate::tt::TranspositionTable;

fn board_with(stones: &[(i16, i16, Stone)]) -> Board {
    let mut b = Board::new(15);
    for &(r, c, s) in stones {
        assert!(b.place(Move::new(r, c), s));
    }
    b
}

#[test]
fn observe_accumulates_a_running_mean() {
    let mut tt = TranspositionTable::new(64);
    let b = board_with(&[(7, 7, Stone::Black)]);

    tt.observe(&b, Stone::White, 1.0, None);
    tt.observe(&b, Stone::White, 0.0, None);
    tt.observe(&b, Stone::White, 0.5, None);

    let view = tt.lookup(&b, Stone::White).unwrap();
    assert_eq!(view.visits, 3);
    assert!((view.value_mean - 0.5).abs() < 1e-6);
}

#[test]
fn entries_are_shared_across_the_symmetry_orbit() {
    let mut tt = TranspositionTable::new(64);
    let b = board_with(&[(2, 5, Stone::Black), (3, 9, Stone::White)]);
    tt.observe(&b, Stone::White, 0.25, None);

    for t in Transform::ALL {
        let view = tt.lookup(&t.apply_board(&b), Stone::White).expect("orbit hit");
        assert!((view.value_mean - 0.25).abs() < 1e-6, "{t:?}");
    }
    assert_eq!(tt.len(), 1);
}

#[test]
fn priors_keep_their_orientation() {
    let mut tt = TranspositionTable::new(64);
    let b = board_with(&[(2, 5, Stone::Black)]);

    let mut priors = vec![0.0f32; 225];
    priors[Move::new(4, 6).flat(15)] = 1.0;
    tt.observe(&b, Stone::White, 0.0, Some(&priors));

    for t in Transform::ALL {
        let view = tt.lookup(&t.apply_board(&b), Stone::White).unwrap();
        let p = view.priors.expect("stored on first observe");
        let spike = t.apply_move(Move::new(4, 6), 15).flat(15);
        assert!((p[spike] - 1.0).abs() < 1e-5, "{t:?}");
    }
}

#[test]
fn priors_survive_later_observations_without_priors() {
    let mut tt = TranspositionTable::new(64);
    let b = board_with(&[(7, 7, Stone::Black)]);

    let priors = vec![1.0 / 225.0; 225];
    tt.observe(&b, Stone::White, 0.1, Some(&priors));
    tt.observe(&b, Stone::White, 0.3, None);

    let view = tt.lookup(&b, Stone::White).unwrap();
    assert_eq!(view.visits, 2);
    assert!(view.priors.is_some());
}

#[test]
fn side_to_move_distinguishes_entries() {
    let mut tt = TranspositionTable::new(64);
    let b = board_with(&[(7, 7, Stone::Black)]);
    tt.observe(&b, Stone::White, 0.9, None);
    assert!(tt.lookup(&b, Stone::Black).is_none());
}

#[test]
fn capacity_evicts_oldest() {
    let mut tt = TranspositionTable::new(2);
    let b1 = board_with(&[(1, 1, Stone::Black)]);
    let b2 = board_with(&[(1, 2, Stone::Black)]);
    let b3 = board_with(&[(1, 3, Stone::Black)]);
    tt.observe(&b1, Stone::White, 0.0, None);
    tt.observe(&b2, Stone::White, 0.0, None);
    tt.observe(&b3, Stone::White, 0.0, None);
    assert_eq!(tt.len(), 2);
    assert!(tt.lookup(&b1, Stone::White).is_none());
}
