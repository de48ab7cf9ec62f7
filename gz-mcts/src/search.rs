//! The search engine: tactical short-circuits in front of batched PUCT.

use std::time::{Duration, Instant};

use gz_core::config::{BoostFactors, MctsConfig, TacticsConfig};
use gz_core::{
    candidate_radius, check_win, is_forbidden, legal_moves, Board, Move, Stone,
};
use gz_features::encode_board_v1;
use gz_infer::{
    evaluate_symmetry_averaged, symmetry_count_for_budget, Evaluator, InferError,
    PredictionCache,
};
use gz_tactics::{detect, find_defense, find_forced_win, find_threat_win, SolverBudget};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use rand_distr::{Distribution, Gamma};
use thiserror::Error;

use crate::arena::Arena;
use crate::node::{Candidate, Node, NodeId};
use crate::tt::TranspositionTable;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("inference: {0}")]
    Infer(#[from] InferError),
}

/// Which layer produced the returned move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    /// Threat-space (VCT) forced win.
    ThreatWin,
    /// Continuous-four (VCF) forced win.
    ForcedWin,
    /// One-ply five.
    Mate,
    /// One-ply block of the opponent's five.
    Block,
    /// Defensive refutation of an opponent forced win.
    Defense,
    /// Full PUCT search.
    Search,
}

#[derive(Debug, Clone, Copy)]
pub struct MoveVisits {
    pub mv: Move,
    pub visits: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub simulations: u32,
    pub batches: u32,
    pub cache_hits: u64,
    pub tt_prior_blends: u64,
    pub tt_bootstraps: u64,
    pub early_stopped: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best: Move,
    /// Visit counts for every materialized root child, insertion order.
    pub policy: Vec<MoveVisits>,
    /// Root mean value from the side-to-move perspective.
    pub root_value: f32,
    pub source: SearchSource,
    pub stats: SearchStats,
}

impl SearchResult {
    fn shortcut(mv: Move, value: f32, source: SearchSource, t0: Instant) -> SearchResult {
        SearchResult {
            best: mv,
            policy: vec![MoveVisits { mv, visits: 1 }],
            root_value: value,
            source,
            stats: SearchStats {
                simulations: 1,
                elapsed_ms: t0.elapsed().as_millis() as u64,
                ..SearchStats::default()
            },
        }
    }
}

enum Selection {
    Terminal { path: Vec<NodeId>, value: f32 },
    Leaf { path: Vec<NodeId>, board: Board },
}

#[derive(Clone, Copy)]
enum Tier {
    Root,
    Child,
}

/// The search engine. The transposition table and prediction cache persist
/// across calls; the node arena lives for one `find_best_move` only.
pub struct Mcts {
    cfg: MctsConfig,
    tactics: TacticsConfig,
    tt: TranspositionTable,
    cache: PredictionCache,
    rng: ChaCha8Rng,
}

impl Mcts {
    pub fn new(cfg: MctsConfig, tactics: TacticsConfig, cache_capacity: usize, seed: u64) -> Mcts {
        let tt_capacity = cfg.tt_capacity;
        Mcts {
            cfg,
            tactics,
            tt: TranspositionTable::new(tt_capacity),
            cache: PredictionCache::new(cache_capacity),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &MctsConfig {
        &self.cfg
    }

    /// Replace the tunable configuration (used by the controller's tuning
    /// feedback). Table capacities are not resized.
    pub fn set_config(&mut self, cfg: MctsConfig) {
        self.cfg = cfg;
    }

    /// Search the position and return the chosen move plus the visit
    /// distribution. Guaranteed to return within the budget plus one
    /// batch's worth of grace.
    pub fn find_best_move(
        &mut self,
        board: &Board,
        to_move: Stone,
        budget_ms: u64,
        evaluator: &dyn Evaluator,
    ) -> Result<SearchResult, SearchError> {
        let t0 = Instant::now();
        if !board.has_empty() {
            return Ok(SearchResult {
                best: Move::NONE,
                policy: Vec::new(),
                root_value: 0.0,
                source: SearchSource::Search,
                stats: SearchStats::default(),
            });
        }

        let fast = self.cfg.fast_mode || budget_ms <= 900;

        // Tactical short-circuits run under their own sub-budget.
        let solver_ms = self
            .tactics
            .time_cap_ms
            .min((budget_ms as f64 * self.tactics.time_frac) as u64)
            .max(1);
        let sbudget = SolverBudget::new(t0 + Duration::from_millis(solver_ms), self.tactics.node_cap);
        let vct_depth = if fast {
            self.tactics.vct_depth_fast
        } else {
            self.tactics.vct_depth
        };

        if let Some(mv) = find_threat_win(board, to_move, vct_depth, sbudget) {
            return Ok(SearchResult::shortcut(mv, 1.0, SearchSource::ThreatWin, t0));
        }
        if let Some(mv) = find_forced_win(board, to_move, self.tactics.vcf_depth, sbudget) {
            return Ok(SearchResult::shortcut(mv, 1.0, SearchSource::ForcedWin, t0));
        }

        // One-ply mate, then one-ply block.
        let own_threats = detect(board, to_move);
        for &mv in &own_threats.wins {
            if self.allowed(board, to_move, mv) {
                return Ok(SearchResult::shortcut(mv, 1.0, SearchSource::Mate, t0));
            }
        }
        let opp_threats = detect(board, to_move.opponent());
        for &mv in &opp_threats.wins {
            if self.allowed(board, to_move, mv) {
                return Ok(SearchResult::shortcut(mv, 0.0, SearchSource::Block, t0));
            }
        }

        if let Some(mv) = find_defense(board, to_move, self.tactics.vcf_depth, sbudget) {
            return Ok(SearchResult::shortcut(mv, 0.0, SearchSource::Defense, t0));
        }

        self.puct(board, to_move, budget_ms, fast, evaluator, t0)
    }

    fn allowed(&self, board: &Board, to_move: Stone, mv: Move) -> bool {
        board.is_empty_cell(mv.row, mv.col)
            && !(to_move == Stone::Black && is_forbidden(board, mv))
    }

    fn puct(
        &mut self,
        root_board: &Board,
        to_move: Stone,
        budget_ms: u64,
        fast: bool,
        evaluator: &dyn Evaluator,
        t0: Instant,
    ) -> Result<SearchResult, SearchError> {
        let n = root_board.size();
        let deadline = t0 + Duration::from_millis(budget_ms);
        let mut stats = SearchStats::default();

        let batch_size = if fast {
            self.cfg.batch_size_fast.max(1)
        } else {
            self.cfg.batch_size.max(1)
        };
        let (es_min, es_ratio) = if fast {
            (self.cfg.early_stop_min_visits_fast, self.cfg.early_stop_ratio_fast)
        } else {
            (self.cfg.early_stop_min_visits, self.cfg.early_stop_ratio)
        };

        let legal = legal_moves(root_board, candidate_radius(root_board));
        if legal.is_empty() {
            return Ok(SearchResult {
                best: Move::NONE,
                policy: Vec::new(),
                root_value: 0.0,
                source: SearchSource::Search,
                stats,
            });
        }
        if legal.len() == 1 && self.allowed(root_board, to_move, legal[0]) {
            return Ok(SearchResult::shortcut(legal[0], 0.0, SearchSource::Search, t0));
        }

        // Root evaluation: prediction cache, then symmetry-averaged network.
        let root_pred = match self.cache.get(root_board, to_move) {
            Some(p) => {
                stats.cache_hits += 1;
                p
            }
            None => {
                let sym = symmetry_count_for_budget(budget_ms, fast);
                let p = evaluate_symmetry_averaged(evaluator, root_board, to_move, sym)?;
                self.cache.insert(root_board, to_move, &p.policy, p.value);
                p
            }
        };

        let mut arena = Arena::new();
        let root_id = arena.push(Node::new(to_move, Move::NONE, 0));

        let mut priors = self.expansion_priors(
            root_board,
            to_move,
            &root_pred.policy,
            &legal,
            Tier::Root,
            &mut stats,
        );
        // Root Dirichlet noise during the early opening only.
        let opening_limit = 8usize.max(n / 2);
        if self.cfg.dirichlet_epsilon > 0.0 && root_board.stone_count() <= opening_limit {
            self.mix_dirichlet(&mut priors);
        }
        priors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        if priors.is_empty() {
            // Every legal cell is forbidden for black: nothing playable.
            stats.elapsed_ms = t0.elapsed().as_millis() as u64;
            return Ok(SearchResult {
                best: Move::NONE,
                policy: Vec::new(),
                root_value: -1.0,
                source: SearchSource::Search,
                stats,
            });
        }
        let root_cap = scale_fast(self.cfg.root_widen_cap, fast).min(priors.len());
        {
            let root = arena.get_mut(root_id);
            root.candidates = priors[..root_cap]
                .iter()
                .map(|&(mv, prior)| Candidate { mv, prior, child: None })
                .collect();
            root.expanded = true;
            root.visits = 1;
            root.value_sum = root_pred.value;
        }
        self.tt
            .observe(root_board, to_move, root_pred.value, Some(&root_pred.policy));

        while Instant::now() < deadline {
            let mut pending: Vec<(Vec<NodeId>, Board)> = Vec::new();
            for _ in 0..batch_size {
                match self.select(&mut arena, root_id, root_board.clone(), fast, &mut stats) {
                    Selection::Terminal { path, value } => {
                        backprop(&mut arena, &path, value);
                        stats.simulations += 1;
                    }
                    Selection::Leaf { path, board } => pending.push((path, board)),
                }
            }

            // One network call for every cache-missing leaf in the batch.
            let mut misses: Vec<usize> = Vec::new();
            let mut preds: Vec<Option<gz_infer::Prediction>> = Vec::with_capacity(pending.len());
            for (path, board) in &pending {
                let leaf_to_move = arena.get(*path.last().expect("path")).to_move;
                match self.cache.get(board, leaf_to_move) {
                    Some(p) => {
                        stats.cache_hits += 1;
                        preds.push(Some(p));
                    }
                    None => {
                        misses.push(preds.len());
                        preds.push(None);
                    }
                }
            }
            if !misses.is_empty() {
                let inputs: Vec<_> = misses
                    .iter()
                    .map(|&i| {
                        let (path, board) = &pending[i];
                        let leaf_to_move = arena.get(*path.last().expect("path")).to_move;
                        encode_board_v1(board, leaf_to_move)
                    })
                    .collect();
                let outputs = evaluator.predict_batch(&inputs)?;
                for (&i, pred) in misses.iter().zip(outputs) {
                    let (path, board) = &pending[i];
                    let leaf_to_move = arena.get(*path.last().expect("path")).to_move;
                    self.cache.insert(board, leaf_to_move, &pred.policy, pred.value);
                    preds[i] = Some(pred);
                }
            }

            for ((path, board), pred) in pending.iter().zip(preds) {
                let pred = pred.expect("filled above");
                let leaf_id = *path.last().expect("path");
                let (leaf_to_move, already_expanded) = {
                    let leaf = arena.get(leaf_id);
                    (leaf.to_move, leaf.expanded)
                };
                if !already_expanded {
                    let leaf_legal = legal_moves(board, candidate_radius(board));
                    let mut child_priors = self.expansion_priors(
                        board,
                        leaf_to_move,
                        &pred.policy,
                        &leaf_legal,
                        Tier::Child,
                        &mut stats,
                    );
                    child_priors.sort_by(|a, b| {
                        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                    });
                    let cap = scale_fast(self.cfg.k_child_max, fast).min(child_priors.len());
                    let leaf = arena.get_mut(leaf_id);
                    leaf.candidates = child_priors[..cap]
                        .iter()
                        .map(|&(mv, prior)| Candidate { mv, prior, child: None })
                        .collect();
                    leaf.expanded = true;
                    self.tt
                        .observe(board, leaf_to_move, pred.value, Some(&pred.policy));
                } else {
                    self.tt.observe(board, leaf_to_move, pred.value, None);
                }
                backprop(&mut arena, path, pred.value);
                stats.simulations += 1;
            }
            stats.batches += 1;

            if early_stop(&arena, root_id, es_min, es_ratio) {
                stats.early_stopped = true;
                break;
            }
        }

        let root = arena.get(root_id);
        let mut policy = Vec::new();
        let mut best: Option<(Move, u32)> = None;
        for cand in &root.candidates {
            if let Some(cid) = cand.child {
                let visits = arena.get(cid).visits;
                policy.push(MoveVisits { mv: cand.mv, visits });
                match best {
                    Some((_, bv)) if bv >= visits => {}
                    _ => best = Some((cand.mv, visits)),
                }
            }
        }
        // A fully starved search still answers with the best prior.
        let best = best
            .map(|(mv, _)| mv)
            .or_else(|| root.candidates.first().map(|c| c.mv))
            .unwrap_or(Move::NONE);

        stats.elapsed_ms = t0.elapsed().as_millis() as u64;
        Ok(SearchResult {
            best,
            policy,
            root_value: root.value(),
            source: SearchSource::Search,
            stats,
        })
    }

    fn select(
        &mut self,
        arena: &mut Arena,
        root_id: NodeId,
        mut board: Board,
        fast: bool,
        stats: &mut SearchStats,
    ) -> Selection {
        let mut path = vec![root_id];
        let mut node_id = root_id;
        loop {
            if let Some(v) = arena.get(node_id).terminal {
                return Selection::Terminal { path, value: v };
            }
            if !arena.get(node_id).expanded {
                return Selection::Leaf { path, board };
            }

            if arena.get(node_id).candidates.is_empty() {
                // Expanded but moveless (should not happen past the
                // terminal checks); score it as drawn.
                return Selection::Terminal { path, value: 0.0 };
            }
            let (chosen_idx, mv, parent_to_move, parent_depth) = {
                let node = arena.get(node_id);
                let admitted = if node_id == root_id {
                    node.candidates.len()
                } else {
                    widen_count(&self.cfg, node.visits, fast).min(node.candidates.len())
                };
                let c_puct = if node.depth < self.cfg.c_puct_depth_cutoff {
                    self.cfg.c_puct_shallow
                } else {
                    self.cfg.c_puct_deep
                };
                let sqrt_pv = (node.visits as f32).sqrt();
                let mut best_idx = 0usize;
                let mut best_score = f32::NEG_INFINITY;
                for (i, cand) in node.candidates[..admitted].iter().enumerate() {
                    let (q, child_visits) = match cand.child {
                        Some(cid) => {
                            let ch = arena.get(cid);
                            (-ch.value(), ch.visits)
                        }
                        None => (0.0, 0),
                    };
                    let u = c_puct * cand.prior * sqrt_pv / (1.0 + child_visits as f32);
                    let score = q + u;
                    if score > best_score {
                        best_score = score;
                        best_idx = i;
                    }
                }
                let cand = &node.candidates[best_idx];
                (best_idx, cand.mv, node.to_move, node.depth)
            };

            let forbidden_play = parent_to_move == Stone::Black
                && self.cfg.forbidden_prior_penalty > 0.0
                && is_forbidden(&board, mv);
            board.place(mv, parent_to_move);
            let existing = arena.get(node_id).candidates[chosen_idx].child;
            let child_id = match existing {
                Some(cid) => cid,
                None => {
                    let mut child = Node::new(parent_to_move.opponent(), mv, parent_depth + 1);
                    if forbidden_play {
                        // Black played into a forbidden cell: an immediate
                        // loss, won from the child's perspective. (A move
                        // completing a five is never flagged forbidden.)
                        child.terminal = Some(1.0);
                    } else if check_win(&board, parent_to_move, mv) {
                        child.terminal = Some(-1.0);
                    } else if !board.has_empty() {
                        child.terminal = Some(0.0);
                    } else if self.cfg.tt_bootstrap_visits > 0 {
                        // Seed fresh nodes from the transposition table so
                        // common positions are not relitigated from zero.
                        if let Some(view) = self.tt.lookup(&board, child.to_move) {
                            let boot = self.cfg.tt_bootstrap_visits.min(view.visits);
                            if boot > 0 {
                                child.visits = boot;
                                child.value_sum = view.value_mean * boot as f32;
                                stats.tt_bootstraps += 1;
                            }
                        }
                    }
                    let cid = arena.push(child);
                    arena.get_mut(node_id).candidates[chosen_idx].child = Some(cid);
                    cid
                }
            };
            path.push(child_id);
            node_id = child_id;
        }
    }

    /// Masked, TT-blended, boosted and renormalized expansion priors.
    fn expansion_priors(
        &mut self,
        board: &Board,
        to_move: Stone,
        nn_policy: &[f32],
        legal: &[Move],
        tier: Tier,
        stats: &mut SearchStats,
    ) -> Vec<(Move, f32)> {
        let n = board.size();
        let mix = match tier {
            Tier::Root => self.cfg.root_tt_prior_mix,
            Tier::Child => self.cfg.child_tt_prior_mix,
        };
        let factors = match tier {
            Tier::Root => self.cfg.root_boost,
            Tier::Child => self.cfg.child_boost,
        };

        let tt_priors = if mix > 0.0 {
            self.tt.lookup(board, to_move).and_then(|v| v.priors)
        } else {
            None
        };
        if tt_priors.is_some() {
            stats.tt_prior_blends += 1;
        }

        let tags = BoostTags::collect(board, to_move, n);

        let penalty = self.cfg.forbidden_prior_penalty.clamp(0.0, 1.0);
        let mut out: Vec<(Move, f32)> = Vec::with_capacity(legal.len());
        let mut sum = 0.0f32;
        for &mv in legal {
            let flat = mv.flat(n);
            let mut p = match &tt_priors {
                Some(tp) => (1.0 - mix) * nn_policy[flat] + mix * tp[flat],
                None => nn_policy[flat],
            };
            p = p.max(0.0) * tags.factor(flat, &factors);
            if to_move == Stone::Black && is_forbidden(board, mv) {
                // The root must never surface an illegal move (Dirichlet
                // noise would otherwise revive a zeroed prior); in-tree,
                // a zero penalty removes the cell and a positive one keeps
                // it as a discouraged, losing continuation.
                if matches!(tier, Tier::Root) || penalty <= 0.0 {
                    continue;
                }
                p *= penalty;
            }
            sum += p;
            out.push((mv, p));
        }
        if sum > 0.0 && sum.is_finite() {
            for (_, p) in &mut out {
                *p /= sum;
            }
        } else {
            // Degenerate priors (all masked or non-finite): uniform.
            let u = 1.0 / out.len() as f32;
            for (_, p) in &mut out {
                *p = u;
            }
        }
        out
    }

    fn mix_dirichlet(&mut self, priors: &mut [(Move, f32)]) {
        let alpha = self.cfg.dirichlet_alpha;
        let eps = self.cfg.dirichlet_epsilon;
        if !(alpha > 0.0 && alpha.is_finite() && (0.0..=1.0).contains(&eps)) {
            return;
        }
        let gamma = match Gamma::new(alpha as f64, 1.0) {
            Ok(g) => g,
            Err(_) => return,
        };
        let mut eta: Vec<f64> = priors.iter().map(|_| gamma.sample(&mut self.rng)).collect();
        let sum: f64 = eta.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return;
        }
        for e in &mut eta {
            *e /= sum;
        }
        for ((_, p), e) in priors.iter_mut().zip(&eta) {
            *p = (1.0 - eps) * *p + eps * (*e as f32);
        }
    }
}

/// Per-cell threat membership bitmask used by the boost pipeline.
struct BoostTags {
    tags: Vec<u16>,
}

const TAG_WIN: u16 = 1 << 0;
const TAG_BLOCK_WIN: u16 = 1 << 1;
const TAG_OPEN_FOUR: u16 = 1 << 2;
const TAG_BLOCK_OPEN_FOUR: u16 = 1 << 3;
const TAG_FOUR: u16 = 1 << 4;
const TAG_BLOCK_FOUR: u16 = 1 << 5;
const TAG_OPEN_THREE: u16 = 1 << 6;
const TAG_BLOCK_OPEN_THREE: u16 = 1 << 7;
const TAG_CONNECTED_THREE: u16 = 1 << 8;
const TAG_BLOCK_CONNECTED_THREE: u16 = 1 << 9;
const TAG_LONG_LINK: u16 = 1 << 10;

impl BoostTags {
    fn collect(board: &Board, to_move: Stone, n: usize) -> BoostTags {
        let own = detect(board, to_move);
        let opp = detect(board, to_move.opponent());
        let mut tags = vec![0u16; n * n];
        let mut mark = |list: &[Move], tag: u16| {
            for mv in list {
                tags[mv.flat(n)] |= tag;
            }
        };
        mark(&own.wins, TAG_WIN);
        mark(&opp.wins, TAG_BLOCK_WIN);
        mark(&own.open_fours, TAG_OPEN_FOUR);
        mark(&opp.open_fours, TAG_BLOCK_OPEN_FOUR);
        mark(&own.fours, TAG_FOUR);
        mark(&opp.fours, TAG_BLOCK_FOUR);
        mark(&own.open_three_makers, TAG_OPEN_THREE);
        mark(&opp.open_three_makers, TAG_BLOCK_OPEN_THREE);
        mark(&own.connected_three_makers, TAG_CONNECTED_THREE);
        mark(&opp.connected_three_makers, TAG_BLOCK_CONNECTED_THREE);
        mark(&own.long_link_makers, TAG_LONG_LINK);
        BoostTags { tags }
    }

    fn factor(&self, flat: usize, f: &BoostFactors) -> f32 {
        let t = self.tags[flat];
        if t == 0 {
            return 1.0;
        }
        let mut out = 1.0f32;
        if t & TAG_WIN != 0 {
            out *= f.win;
        }
        if t & TAG_BLOCK_WIN != 0 {
            out *= f.block_win;
        }
        if t & TAG_OPEN_FOUR != 0 {
            out *= f.open_four;
        }
        if t & TAG_BLOCK_OPEN_FOUR != 0 {
            out *= f.block_open_four;
        }
        if t & TAG_FOUR != 0 {
            out *= f.four;
        }
        if t & TAG_BLOCK_FOUR != 0 {
            out *= f.block_four;
        }
        if t & TAG_OPEN_THREE != 0 {
            out *= f.open_three;
        }
        if t & TAG_BLOCK_OPEN_THREE != 0 {
            out *= f.block_open_three;
        }
        if t & TAG_CONNECTED_THREE != 0 {
            out *= f.connected_three;
        }
        if t & TAG_BLOCK_CONNECTED_THREE != 0 {
            out *= f.block_connected_three;
        }
        if t & TAG_LONG_LINK != 0 {
            out *= f.long_link;
        }
        out
    }
}

/// Progressive widening schedule for child nodes.
fn widen_count(cfg: &MctsConfig, visits: u32, fast: bool) -> usize {
    let base = scale_fast(cfg.k_child_base, fast);
    let step = scale_fast(cfg.k_child_step, fast);
    let cap = scale_fast(cfg.k_child_max, fast);
    (base + step * (visits as f64).sqrt() as usize).min(cap)
}

/// Fast mode shrinks the widening caps to roughly 40%.
fn scale_fast(v: usize, fast: bool) -> usize {
    if fast {
        (v * 2 / 5).max(1)
    } else {
        v
    }
}

fn backprop(arena: &mut Arena, path: &[NodeId], leaf_value: f32) {
    // `leaf_value` is from the leaf's side-to-move perspective; flip the
    // sign once per ply on the way up.
    let mut v = leaf_value;
    for &id in path.iter().rev() {
        let node = arena.get_mut(id);
        node.visits += 1;
        node.value_sum += v;
        v = -v;
    }
}

fn early_stop(arena: &Arena, root_id: NodeId, min_visits: u32, ratio: f32) -> bool {
    let root = arena.get(root_id);
    let mut best = 0u32;
    let mut second = 0u32;
    for cand in &root.candidates {
        if let Some(cid) = cand.child {
            let v = arena.get(cid).visits;
            if v > best {
                second = best;
                best = v;
            } else if v > second {
                second = v;
            }
        }
    }
    best >= min_visits && best as f32 >= ratio * second as f32
}
