//! The gating match.

use std::path::Path;

use gz_core::{check_win, Board, Config, Stone};
use gz_infer::Evaluator;
use gz_mcts::{propose_opening, second_player_choice, Mcts, SearchError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("search: {0}")]
    Search(#[from] SearchError),
    #[error("inference: {0}")]
    Infer(#[from] gz_infer::InferError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Early-stop verdict after a completed game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    /// The guaranteed winrate already clears the threshold.
    Success,
    /// Even winning every remaining game cannot reach the threshold.
    Failure,
}

/// Early-stop rule over the *scheduled* game count: success once the
/// threshold is guaranteed, failure once it is unreachable.
pub fn gate_decision(
    cand_wins: u32,
    games_played: u32,
    total_games: u32,
    threshold: f64,
) -> GateDecision {
    if total_games == 0 {
        return GateDecision::Failure;
    }
    let total = total_games as f64;
    let guaranteed = cand_wins as f64 / total;
    if guaranteed >= threshold {
        return GateDecision::Success;
    }
    let remaining = total_games.saturating_sub(games_played) as f64;
    let best_case = (cand_wins as f64 + remaining) / total;
    if best_case < threshold {
        return GateDecision::Failure;
    }
    GateDecision::Continue
}

/// The arena result record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaReport {
    #[serde(rename = "ts")]
    pub ts_ms: u64,
    pub games: u32,
    pub candidate_wins: u32,
    pub prod_wins: u32,
    pub draws: u32,
    /// Candidate wins over games actually played.
    pub winrate: f64,
    pub candidate_fingerprint: String,
    pub prod_fingerprint: String,
    pub threshold: f64,
    pub promoted: bool,
    pub early_stopped: bool,
}

impl ArenaReport {
    pub fn passed(&self) -> bool {
        self.games > 0 && self.winrate >= self.threshold
    }
}

enum Outcome {
    CandidateWin,
    ProdWin,
    Draw,
}

/// Play the gating match. Colors alternate per game; root noise is always
/// disabled. The `promoted` flag is left false; promotion is the caller's
/// decision.
pub fn run_arena(
    cfg: &Config,
    candidate: &dyn Evaluator,
    prod: &dyn Evaluator,
    candidate_fingerprint: &str,
    prod_fingerprint: &str,
    seed: u64,
) -> Result<ArenaReport, ArenaError> {
    // Competitive search: no root exploration noise.
    let mut mcts_cfg = cfg.mcts.clone();
    mcts_cfg.dirichlet_epsilon = 0.0;
    let mut cand_mcts = Mcts::new(
        mcts_cfg.clone(),
        cfg.tactics.clone(),
        cfg.mcts.prediction_cache_capacity,
        seed ^ 0x0C0FFEE,
    );
    let mut prod_mcts = Mcts::new(
        mcts_cfg,
        cfg.tactics.clone(),
        cfg.mcts.prediction_cache_capacity,
        seed ^ 0xBADC0DE,
    );

    let total = cfg.arena.games;
    let mut cand_wins = 0u32;
    let mut prod_wins = 0u32;
    let mut draws = 0u32;
    let mut played = 0u32;
    let mut early_stopped = false;

    for game_idx in 0..total {
        let cand_is_black = game_idx % 2 == 0;
        let outcome = play_one_game(
            cfg,
            candidate,
            prod,
            &mut cand_mcts,
            &mut prod_mcts,
            cand_is_black,
        )?;
        played += 1;
        match outcome {
            Outcome::CandidateWin => cand_wins += 1,
            Outcome::ProdWin => prod_wins += 1,
            Outcome::Draw => draws += 1,
        }
        match gate_decision(cand_wins, played, total, cfg.arena.threshold) {
            GateDecision::Continue => {}
            GateDecision::Success | GateDecision::Failure => {
                early_stopped = played < total;
                break;
            }
        }
    }

    let winrate = if played == 0 {
        0.0
    } else {
        cand_wins as f64 / played as f64
    };
    Ok(ArenaReport {
        ts_ms: gz_logging::now_ms(),
        games: played,
        candidate_wins: cand_wins,
        prod_wins,
        draws,
        winrate,
        candidate_fingerprint: candidate_fingerprint.to_string(),
        prod_fingerprint: prod_fingerprint.to_string(),
        threshold: cfg.arena.threshold,
        promoted: false,
        early_stopped,
    })
}

fn play_one_game(
    cfg: &Config,
    candidate: &dyn Evaluator,
    prod: &dyn Evaluator,
    cand_mcts: &mut Mcts,
    prod_mcts: &mut Mcts,
    mut cand_is_black: bool,
) -> Result<Outcome, ArenaError> {
    let n = cfg.board.size;
    let mut board;
    let mut to_move;

    if cfg.selfplay.swap2_opening {
        board = propose_opening(n);
        // The white-seat player runs the Swap2 decision.
        let second = if cand_is_black { prod } else { candidate };
        let out = second_player_choice(
            &board,
            second,
            cfg.selfplay.swap2_rollout_plies,
            cfg.selfplay.swap2_budget_ms,
        )?;
        board = out.board;
        to_move = out.to_move;
        if out.swap_colors {
            cand_is_black = !cand_is_black;
        }
    } else {
        board = Board::new(n);
        to_move = Stone::Black;
    }

    let move_cap = n * n;
    for _ in 0..move_cap {
        if !board.has_empty() {
            return Ok(Outcome::Draw);
        }
        let cand_turn = (to_move == Stone::Black) == cand_is_black;
        let res = if cand_turn {
            cand_mcts.find_best_move(&board, to_move, cfg.arena.think_ms, candidate)?
        } else {
            prod_mcts.find_best_move(&board, to_move, cfg.arena.think_ms, prod)?
        };
        if res.best.is_none() || !board.place(res.best, to_move) {
            // No legal reply: score it against the side that failed.
            return Ok(if cand_turn {
                Outcome::ProdWin
            } else {
                Outcome::CandidateWin
            });
        }
        if check_win(&board, to_move, res.best) {
            return Ok(if cand_turn {
                Outcome::CandidateWin
            } else {
                Outcome::ProdWin
            });
        }
        to_move = to_move.opponent();
    }
    Ok(Outcome::Draw)
}

/// Persist the arena result record (atomic write).
pub fn write_arena_result(path: &Path, report: &ArenaReport) -> Result<(), ArenaError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(report)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
