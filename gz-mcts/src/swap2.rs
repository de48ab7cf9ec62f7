//! Swap2 opening negotiation.
//!
//! The first player proposes a B-W-B triple near the center; the second
//! player compares three continuations with shallow network-guided rollouts
//! and takes the one maximizing its own expected value.

use std::time::{Duration, Instant};

use gz_core::{candidate_radius, check_win, is_forbidden, legal_moves, Board, Move, Stone};
use gz_features::encode_board_v1;
use gz_infer::{Evaluator, InferError};

/// Which Swap2 option the second player took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swap2Choice {
    /// Option 1: swap colors and play black.
    TakeBlack,
    /// Option 2: stay white and add one white stone.
    StayWhite,
    /// Option 3: add one white and one black stone; the first player then
    /// picks a color.
    PlaceTwo,
}

#[derive(Debug, Clone)]
pub struct Swap2Outcome {
    pub board: Board,
    pub to_move: Stone,
    /// Whether color roles must be swapped relative to the seats that
    /// opened the game.
    pub swap_colors: bool,
    pub choice: Swap2Choice,
}

/// The first player's proposal: a B-W-B triple near the center.
pub fn propose_opening(n: usize) -> Board {
    let mut b = Board::new(n);
    let h = (n / 2) as i16;
    b.place(Move::new(h, h), Stone::Black);
    b.place(Move::new(h, h + 1), Stone::White);
    b.place(Move::new(h - 1, h - 1), Stone::Black);
    b
}

/// Run the second player's Swap2 decision over a proposed triple.
pub fn second_player_choice(
    board: &Board,
    evaluator: &dyn Evaluator,
    plies: u32,
    budget_ms: u64,
) -> Result<Swap2Outcome, InferError> {
    let deadline = Instant::now() + Duration::from_millis(budget_ms.max(1));

    // Option 1: take black. White (the first player) moves next; the second
    // player's value is the negation of white's.
    let v_take_black = -rollout_value(board, Stone::White, plies, evaluator)?;

    // Option 2: stay white, pick the white placement that reads best for
    // white after the first player's reply.
    let mut v_stay_white = f32::NEG_INFINITY;
    let mut stay_white_board = None;
    for w in placement_candidates(board, Stone::White, 4, evaluator)? {
        let mut b = board.clone();
        b.place(w, Stone::White);
        let v = if check_win(&b, Stone::White, w) {
            1.0
        } else {
            -rollout_value(&b, Stone::Black, plies, evaluator)?
        };
        if v > v_stay_white {
            v_stay_white = v;
            stay_white_board = Some(b);
        }
        if Instant::now() >= deadline {
            break;
        }
    }

    // Option 3: place one more white and one more black stone, then hand
    // the first player the color choice.
    let mut b3 = board.clone();
    if let Some(w) = placement_candidates(&b3, Stone::White, 1, evaluator)?.first().copied() {
        b3.place(w, Stone::White);
    }
    if let Some(bk) = placement_candidates(&b3, Stone::Black, 1, evaluator)?.first().copied() {
        b3.place(bk, Stone::Black);
    }
    let v3_white = rollout_value(&b3, Stone::White, plies, evaluator)?;
    let v3_black = rollout_value(&b3, Stone::Black, plies, evaluator)?;
    let v_place_two = -v3_white.max(v3_black);

    let mut best = (v_take_black, Swap2Choice::TakeBlack);
    if v_stay_white > best.0 && stay_white_board.is_some() {
        best = (v_stay_white, Swap2Choice::StayWhite);
    }
    if v_place_two > best.0 {
        best = (v_place_two, Swap2Choice::PlaceTwo);
    }

    Ok(match best.1 {
        Swap2Choice::TakeBlack => Swap2Outcome {
            board: board.clone(),
            to_move: Stone::White,
            swap_colors: true,
            choice: Swap2Choice::TakeBlack,
        },
        Swap2Choice::StayWhite => Swap2Outcome {
            board: stay_white_board.expect("candidate recorded"),
            to_move: Stone::Black,
            swap_colors: false,
            choice: Swap2Choice::StayWhite,
        },
        Swap2Choice::PlaceTwo => Swap2Outcome {
            board: b3,
            to_move: Stone::White,
            // The first player takes whichever color reads stronger.
            swap_colors: v3_white >= v3_black,
            choice: Swap2Choice::PlaceTwo,
        },
    })
}

/// Top-`k` legal placements for `side` ranked by raw network policy.
fn placement_candidates(
    board: &Board,
    side: Stone,
    k: usize,
    evaluator: &dyn Evaluator,
) -> Result<Vec<Move>, InferError> {
    let n = board.size();
    let legal: Vec<Move> = legal_moves(board, candidate_radius(board))
        .into_iter()
        .filter(|&mv| !(side == Stone::Black && is_forbidden(board, mv)))
        .collect();
    if legal.is_empty() {
        return Ok(Vec::new());
    }
    let pred = evaluator.predict_one(&encode_board_v1(board, side))?;
    let mut ranked = legal;
    ranked.sort_by(|a, b| {
        pred.policy[b.flat(n)]
            .partial_cmp(&pred.policy[a.flat(n)])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(k);
    Ok(ranked)
}

/// Greedy shallow rollout: `plies` policy-argmax moves, then the network
/// value, expressed from `to_move`'s perspective.
fn rollout_value(
    board: &Board,
    to_move: Stone,
    plies: u32,
    evaluator: &dyn Evaluator,
) -> Result<f32, InferError> {
    let mut b = board.clone();
    let mut side = to_move;
    let mut flip = 1.0f32;
    for _ in 0..plies {
        let mv = match placement_candidates(&b, side, 1, evaluator)?.first().copied() {
            Some(mv) => mv,
            None => return Ok(0.0),
        };
        b.place(mv, side);
        if check_win(&b, side, mv) {
            return Ok(flip);
        }
        side = side.opponent();
        flip = -flip;
    }
    let pred = evaluator.predict_one(&encode_board_v1(&b, side))?;
    Ok(flip * pred.value)
}
