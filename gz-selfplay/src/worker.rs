//! One self-play game, end to end.

use gz_core::{check_win, Board, Config, Move, Stone};
use gz_features::encode_board_v1;
use gz_infer::Evaluator;
use gz_logging::{now_ms, NdjsonWriter, SearchRootEventV1};
use gz_mcts::{propose_opening, second_player_choice, Mcts, SearchError, SearchResult};
use gz_replay::{board_to_state, SampleMeta, TrainingSample};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("search: {0}")]
    Search(#[from] SearchError),
    #[error("inference: {0}")]
    Infer(#[from] gz_infer::InferError),
}

/// Messages workers send the orchestrator.
#[derive(Debug)]
pub enum WorkerMsg {
    GameFinished {
        worker_id: usize,
        game_id: String,
        samples: Vec<TrainingSample>,
        moves: u32,
        winner: Option<Stone>,
    },
    Crashed {
        worker_id: usize,
        error: String,
    },
    Stopped {
        worker_id: usize,
    },
}

#[derive(Debug)]
pub struct GameRecord {
    pub samples: Vec<TrainingSample>,
    pub moves: u32,
    pub winner: Option<Stone>,
}

/// Phase-dependent think time: shorter in the trivial opening, longer in
/// the tactical middlegame, base afterwards. Clamped to at least 200 ms and
/// optionally jittered.
pub fn think_time_for_move(
    base_ms: u64,
    move_index: u32,
    jitter_frac: f64,
    rng: &mut ChaCha8Rng,
) -> u64 {
    let scaled = match move_index {
        0..=6 => base_ms as f64 * 0.8,
        7..=30 => base_ms as f64 * 1.2,
        _ => base_ms as f64,
    };
    let jittered = if jitter_frac > 0.0 {
        let j = rng.gen_range(-jitter_frac..=jitter_frac);
        scaled * (1.0 + j)
    } else {
        scaled
    };
    (jittered as u64).max(200)
}

/// Normalize a visit list into a full-board distribution.
fn visit_policy(n: usize, result: &SearchResult) -> Vec<f32> {
    let mut policy = vec![0.0f32; n * n];
    let total: u32 = result.policy.iter().map(|p| p.visits).sum();
    if total == 0 {
        if !result.best.is_none() {
            policy[result.best.flat(n)] = 1.0;
        }
        return policy;
    }
    for p in &result.policy {
        policy[p.mv.flat(n)] = p.visits as f32 / total as f32;
    }
    policy
}

/// Sample a move from the visit distribution (exploration phase).
fn sample_move(result: &SearchResult, rng: &mut ChaCha8Rng) -> Move {
    let total: u32 = result.policy.iter().map(|p| p.visits).sum();
    if total == 0 {
        return result.best;
    }
    let mut pick = rng.gen_range(0..total);
    for p in &result.policy {
        if pick < p.visits {
            return p.mv;
        }
        pick -= p.visits;
    }
    result.best
}

/// Drive a single game and record one training sample per position.
///
/// `own` plays the worker's reference side; `opp` (usually the same model,
/// sometimes a past checkpoint) plays the other. The opening rule decides
/// who ends up with black. `roots` receives one telemetry event per
/// executed move when set; telemetry failures never fail the game.
pub fn play_one_game(
    cfg: &Config,
    mcts: &mut Mcts,
    own: &dyn Evaluator,
    opp: &dyn Evaluator,
    rng: &mut ChaCha8Rng,
    game_id: &str,
    worker_id: usize,
    mut roots: Option<&mut NdjsonWriter>,
) -> Result<GameRecord, WorkerError> {
    let n = cfg.board.size;
    let mut board;
    let mut to_move;
    let mut own_is_black = true;
    let mut tags: Vec<String> = Vec::new();

    if cfg.selfplay.swap2_opening {
        board = propose_opening(n);
        let out = second_player_choice(
            &board,
            opp,
            cfg.selfplay.swap2_rollout_plies,
            cfg.selfplay.swap2_budget_ms,
        )?;
        board = out.board;
        to_move = out.to_move;
        if out.swap_colors {
            own_is_black = false;
        }
        tags.push("swap2".to_string());
    } else {
        board = Board::new(n);
        to_move = Stone::Black;
    }

    let mut pending: Vec<TrainingSample> = Vec::new();
    let mut move_index: u32 = 0;
    let mut winner: Option<Stone> = None;

    let move_cap = (n * n) as u32;
    while move_index < move_cap && board.has_empty() {
        let side_eval: &dyn Evaluator = if (to_move == Stone::Black) == own_is_black {
            own
        } else {
            opp
        };

        // Teacher targets are captured before the search touches the node.
        let teacher = side_eval.predict_one(&encode_board_v1(&board, to_move))?;

        let think_ms = think_time_for_move(
            cfg.selfplay.base_think_ms,
            move_index,
            cfg.selfplay.think_jitter_frac,
            rng,
        );
        let result = mcts.find_best_move(&board, to_move, think_ms, side_eval)?;
        if result.best.is_none() {
            break;
        }

        let chosen = if move_index < cfg.selfplay.exploration_moves {
            sample_move(&result, rng)
        } else {
            result.best
        };

        if let Some(writer) = roots.as_deref_mut() {
            let _ = writer.write_event(&SearchRootEventV1 {
                event: "search_root_v1",
                ts_ms: now_ms(),
                worker_id,
                game_id: game_id.to_string(),
                move_index,
                player: match to_move {
                    Stone::Black => "black",
                    Stone::White => "white",
                },
                chosen_row: chosen.row,
                chosen_col: chosen.col,
                source: format!("{:?}", result.source),
                root_value: result.root_value,
                simulations: result.stats.simulations,
                cache_hits: result.stats.cache_hits,
                early_stopped: result.stats.early_stopped,
                think_ms,
            });
        }

        pending.push(TrainingSample {
            state: board_to_state(&board),
            player: to_move,
            mcts_policy: visit_policy(n, &result),
            teacher_policy: teacher.policy,
            teacher_value: teacher.value,
            final_value: 0,
            meta: SampleMeta {
                source: "self_play".into(),
                game_id: game_id.to_string(),
                move_index,
                total_moves: 0,
                result: 0,
                tags: tags.clone(),
                extra: serde_json::Map::new(),
            },
        });

        board.place(chosen, to_move);
        move_index += 1;
        if check_win(&board, to_move, chosen) {
            winner = Some(to_move);
            break;
        }
        to_move = to_move.opponent();
    }

    let result_black = match winner {
        Some(Stone::Black) => 1,
        Some(Stone::White) => -1,
        None => 0,
    };
    let samples = pending
        .into_iter()
        .map(|mut s| {
            s.final_value = match winner {
                None => 0,
                Some(w) if w == s.player => 1,
                Some(_) => -1,
            };
            s.meta.total_moves = move_index;
            s.meta.result = result_black;
            s
        })
        .collect();

    Ok(GameRecord {
        samples,
        moves: move_index,
        winner,
    })
}
