//! Unified configuration for the pipeline.
//!
//! The tree is serde-derived so the same YAML file drives every binary.
//! Every operational tunable can additionally be overridden through a
//! `GZ_*` environment variable; `Config::load_with_env` applies overrides
//! after parsing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {key}: {value}")]
    BadEnvValue { key: String, value: String },
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub mcts: MctsConfig,
    #[serde(default)]
    pub tactics: TacticsConfig,
    #[serde(default)]
    pub selfplay: SelfplayConfig,
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardConfig {
    /// Board side length.
    #[serde(default = "d_board_size")]
    pub size: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig { size: d_board_size() }
    }
}

/// Multiplicative tactical prior boosts, one tier.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct BoostFactors {
    pub win: f32,
    pub block_win: f32,
    pub open_four: f32,
    pub block_open_four: f32,
    pub four: f32,
    pub block_four: f32,
    pub open_three: f32,
    pub block_open_three: f32,
    pub connected_three: f32,
    pub block_connected_three: f32,
    pub long_link: f32,
}

impl BoostFactors {
    pub fn root_defaults() -> BoostFactors {
        BoostFactors {
            win: 1.0,
            block_win: 1.0,
            open_four: 1.5,
            block_open_four: 1.3,
            four: 1.15,
            block_four: 1.10,
            open_three: 1.08,
            block_open_three: 1.05,
            connected_three: 1.05,
            block_connected_three: 1.03,
            long_link: 1.03,
        }
    }

    pub fn child_defaults() -> BoostFactors {
        BoostFactors {
            win: 5.0,
            block_win: 2.0,
            open_four: 1.3,
            block_open_four: 1.2,
            four: 1.12,
            block_four: 1.08,
            open_three: 1.1,
            block_open_three: 1.05,
            connected_three: 1.04,
            block_connected_three: 1.02,
            long_link: 1.02,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MctsConfig {
    /// PUCT exploration constant at depth < `c_puct_depth_cutoff`.
    #[serde(default = "d_c_puct_shallow")]
    pub c_puct_shallow: f32,
    /// PUCT exploration constant at or below the cutoff depth.
    #[serde(default = "d_c_puct_deep")]
    pub c_puct_deep: f32,
    #[serde(default = "d_c_puct_depth_cutoff")]
    pub c_puct_depth_cutoff: u16,

    /// Root Dirichlet alpha (self-play opening phase only).
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f32,
    /// Root Dirichlet mix-in fraction.
    #[serde(default = "d_dirichlet_epsilon")]
    pub dirichlet_epsilon: f32,

    /// Leaves evaluated per network call.
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    #[serde(default = "d_batch_size_fast")]
    pub batch_size_fast: usize,

    /// Progressive widening: admitted children grow as
    /// `base + step * floor(sqrt(visits))`, capped at `max`.
    #[serde(default = "d_k_child_base")]
    pub k_child_base: usize,
    #[serde(default = "d_k_child_step")]
    pub k_child_step: usize,
    #[serde(default = "d_k_child_max")]
    pub k_child_max: usize,
    /// Root widening cap (further capped by the number of legal moves).
    #[serde(default = "d_root_widen_cap")]
    pub root_widen_cap: usize,

    #[serde(default = "d_early_stop_min_visits")]
    pub early_stop_min_visits: u32,
    #[serde(default = "d_early_stop_min_visits_fast")]
    pub early_stop_min_visits_fast: u32,
    #[serde(default = "d_early_stop_ratio")]
    pub early_stop_ratio: f32,
    #[serde(default = "d_early_stop_ratio_fast")]
    pub early_stop_ratio_fast: f32,

    #[serde(default = "d_tt_capacity")]
    pub tt_capacity: usize,
    #[serde(default = "d_prediction_cache_capacity")]
    pub prediction_cache_capacity: usize,
    /// Synthetic visits granted to children of a TT-known node.
    #[serde(default = "d_tt_bootstrap_visits")]
    pub tt_bootstrap_visits: u32,
    /// TT/NN prior blend weight at child nodes.
    #[serde(default = "d_child_tt_prior_mix")]
    pub child_tt_prior_mix: f32,
    /// TT/NN prior blend weight at the root.
    #[serde(default = "d_root_tt_prior_mix")]
    pub root_tt_prior_mix: f32,

    /// Prior multiplier for black's forbidden cells, in [0, 1].
    #[serde(default = "d_forbidden_prior_penalty")]
    pub forbidden_prior_penalty: f32,

    /// Force the reduced-budget parameter set regardless of think time.
    #[serde(default)]
    pub fast_mode: bool,

    #[serde(default = "BoostFactors::root_defaults")]
    pub root_boost: BoostFactors,
    #[serde(default = "BoostFactors::child_defaults")]
    pub child_boost: BoostFactors,
}

impl Default for MctsConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("all fields defaulted")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TacticsConfig {
    #[serde(default = "d_vcf_depth")]
    pub vcf_depth: u8,
    #[serde(default = "d_vct_depth")]
    pub vct_depth: u8,
    /// VCT depth in fast mode or when the total budget is <= 900 ms.
    #[serde(default = "d_vct_depth_fast")]
    pub vct_depth_fast: u8,
    #[serde(default = "d_solver_node_cap")]
    pub node_cap: u64,
    /// Solver deadline = min(`time_cap_ms`, `time_frac` * total budget).
    #[serde(default = "d_solver_time_frac")]
    pub time_frac: f64,
    #[serde(default = "d_solver_time_cap_ms")]
    pub time_cap_ms: u64,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("all fields defaulted")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelfplayConfig {
    #[serde(default = "d_num_workers")]
    pub num_workers: usize,
    /// Moves sampled from the visit distribution before play turns greedy.
    #[serde(default = "d_exploration_moves")]
    pub exploration_moves: u32,
    /// Probability that a worker faces a past-model opponent.
    #[serde(default = "d_past_model_probability")]
    pub past_model_probability: f64,
    #[serde(default = "d_save_interval_ms")]
    pub save_interval_ms: u64,
    #[serde(default = "d_self_play_duration_ms")]
    pub duration_ms: u64,
    /// Base per-move think time; the schedule scales it by game phase.
    #[serde(default = "d_base_think_ms")]
    pub base_think_ms: u64,
    /// Uniform jitter fraction applied to each move's think time (0 = off).
    #[serde(default = "d_think_jitter_frac")]
    pub think_jitter_frac: f64,
    /// Run the Swap2 opening protocol at the start of each game.
    #[serde(default = "d_true")]
    pub swap2_opening: bool,
    /// Shallow rollout plies for the Swap2 option estimate.
    #[serde(default = "d_swap2_rollout_plies")]
    pub swap2_rollout_plies: u32,
    #[serde(default = "d_swap2_budget_ms")]
    pub swap2_budget_ms: u64,
}

impl Default for SelfplayConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("all fields defaulted")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArenaConfig {
    #[serde(default = "d_arena_games")]
    pub games: u32,
    #[serde(default = "d_arena_think_ms")]
    pub think_ms: u64,
    /// Candidate winrate required for promotion.
    #[serde(default = "d_arena_threshold")]
    pub threshold: f64,
    #[serde(default = "d_true")]
    pub promote: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("all fields defaulted")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// 0 = loop indefinitely (same as `forever`).
    #[serde(default)]
    pub cycles: u32,
    #[serde(default)]
    pub forever: bool,
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default = "d_on_error_delay_ms")]
    pub on_error_delay_ms: u64,
    /// Command run for the external distillation stage (empty = skip).
    #[serde(default)]
    pub distill_command: Vec<String>,
    /// Command run for the upload stage after a promotion (empty = skip).
    #[serde(default)]
    pub upload_command: Vec<String>,
    /// Command run for the opening-book build/import stage (empty = skip).
    #[serde(default)]
    pub book_command: Vec<String>,
    /// Post-arena feedback step applied to boost factors and TT mixes.
    #[serde(default = "d_tuning_step")]
    pub tuning_step: f64,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("all fields defaulted")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "d_bind")]
    pub bind: String,
    #[serde(default = "d_model_check_interval_ms")]
    pub model_check_interval_ms: u64,
    /// Opening book is consulted only while the game has at most this many
    /// moves.
    #[serde(default = "d_book_max_moves")]
    pub book_max_moves: usize,
    #[serde(default)]
    pub opening_book_path: Option<String>,
    /// Fallback time control "base+increment" in minutes+seconds.
    #[serde(default = "d_time_control")]
    pub time_control: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("all fields defaulted")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "d_model_dir")]
    pub model_dir: String,
    #[serde(default = "d_candidate_dir")]
    pub candidate_dir: String,
    #[serde(default = "d_past_models_dir")]
    pub past_models_dir: String,
    #[serde(default = "d_replay_dir")]
    pub replay_dir: String,
    #[serde(default = "d_status_path")]
    pub status_path: String,
    #[serde(default = "d_arena_result_path")]
    pub arena_result_path: String,
    /// Persisted tuning overrides written by the controller.
    #[serde(default = "d_tuning_path")]
    pub tuning_path: String,
    #[serde(default)]
    pub model_url: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        serde_yaml::from_str("{}").expect("all fields defaulted")
    }
}

fn d_board_size() -> usize { 15 }
fn d_c_puct_shallow() -> f32 { 2.0 }
fn d_c_puct_deep() -> f32 { 1.5 }
fn d_c_puct_depth_cutoff() -> u16 { 20 }
fn d_dirichlet_alpha() -> f32 { 0.12 }
fn d_dirichlet_epsilon() -> f32 { 0.25 }
fn d_batch_size() -> usize { 8 }
fn d_batch_size_fast() -> usize { 4 }
fn d_early_stop_min_visits_fast() -> u32 { 120 }
fn d_early_stop_ratio_fast() -> f32 { 1.8 }
fn d_k_child_base() -> usize { 24 }
fn d_k_child_step() -> usize { 12 }
fn d_k_child_max() -> usize { 128 }
fn d_root_widen_cap() -> usize { 256 }
fn d_early_stop_min_visits() -> u32 { 220 }
fn d_early_stop_ratio() -> f32 { 2.2 }
fn d_tt_capacity() -> usize { 20_000 }
fn d_prediction_cache_capacity() -> usize { 5_000 }
fn d_tt_bootstrap_visits() -> u32 { 3 }
fn d_child_tt_prior_mix() -> f32 { 0.35 }
fn d_root_tt_prior_mix() -> f32 { 0.20 }
fn d_forbidden_prior_penalty() -> f32 { 0.0 }
fn d_vcf_depth() -> u8 { 3 }
fn d_vct_depth() -> u8 { 4 }
fn d_vct_depth_fast() -> u8 { 2 }
fn d_solver_node_cap() -> u64 { 20_000 }
fn d_solver_time_frac() -> f64 { 0.30 }
fn d_solver_time_cap_ms() -> u64 { 1_500 }
fn d_num_workers() -> usize { 4 }
fn d_exploration_moves() -> u32 { 15 }
fn d_past_model_probability() -> f64 { 0.5 }
fn d_save_interval_ms() -> u64 { 30_000 }
fn d_self_play_duration_ms() -> u64 { 30 * 60 * 1000 }
fn d_base_think_ms() -> u64 { 1_000 }
fn d_think_jitter_frac() -> f64 { 0.1 }
fn d_swap2_rollout_plies() -> u32 { 3 }
fn d_swap2_budget_ms() -> u64 { 500 }
fn d_arena_games() -> u32 { 200 }
fn d_arena_think_ms() -> u64 { 3_000 }
fn d_arena_threshold() -> f64 { 0.60 }
fn d_on_error_delay_ms() -> u64 { 60_000 }
fn d_tuning_step() -> f64 { 0.05 }
fn d_bind() -> String { "127.0.0.1:8646".to_string() }
fn d_model_check_interval_ms() -> u64 { 5 * 60 * 1000 }
fn d_book_max_moves() -> usize { 12 }
fn d_time_control() -> String { "5+1".to_string() }
fn d_model_dir() -> String { "models/prod".to_string() }
fn d_candidate_dir() -> String { "models/candidate".to_string() }
fn d_past_models_dir() -> String { "models/past".to_string() }
fn d_replay_dir() -> String { "replay".to_string() }
fn d_status_path() -> String { "status.json".to_string() }
fn d_arena_result_path() -> String { "arena_result.json".to_string() }
fn d_tuning_path() -> String { "tuning.json".to_string() }
fn d_true() -> bool { true }

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from YAML (if a path is given) and apply `GZ_*` env overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Config::load(p)?,
            None => Config::default(),
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Apply environment overrides. Unset variables leave the field alone;
    /// set-but-unparsable values are an error.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        env_set(&mut self.board.size, "GZ_BOARD_SIZE")?;

        env_set(&mut self.mcts.c_puct_shallow, "GZ_CPUCT")?;
        env_set(&mut self.mcts.c_puct_deep, "GZ_CPUCT_DEEP")?;
        env_set(&mut self.mcts.dirichlet_alpha, "GZ_DIRICHLET_ALPHA")?;
        env_set(&mut self.mcts.dirichlet_epsilon, "GZ_DIRICHLET_EPSILON")?;
        env_set(&mut self.mcts.batch_size, "GZ_MCTS_BATCH_SIZE")?;
        env_set(&mut self.mcts.k_child_base, "GZ_K_CHILD_BASE")?;
        env_set(&mut self.mcts.k_child_step, "GZ_K_CHILD_STEP")?;
        env_set(&mut self.mcts.k_child_max, "GZ_K_CHILD_MAX")?;
        env_set(&mut self.mcts.root_widen_cap, "GZ_ROOT_WIDEN_CAP")?;
        env_set(&mut self.mcts.early_stop_min_visits, "GZ_EARLY_STOP_MIN_VISITS")?;
        env_set(&mut self.mcts.early_stop_ratio, "GZ_EARLY_STOP_RATIO")?;
        env_set(&mut self.mcts.tt_capacity, "GZ_TT_CAPACITY")?;
        env_set(
            &mut self.mcts.prediction_cache_capacity,
            "GZ_PREDICTION_CACHE_CAPACITY",
        )?;
        env_set(&mut self.mcts.child_tt_prior_mix, "GZ_CHILD_TT_PRIOR_MIX")?;
        env_set(&mut self.mcts.root_tt_prior_mix, "GZ_ROOT_TT_PRIOR_MIX")?;
        env_set(&mut self.mcts.fast_mode, "GZ_FAST_MODE")?;

        for (factors, tier) in [
            (&mut self.mcts.root_boost, "ROOT"),
            (&mut self.mcts.child_boost, "CHILD"),
        ] {
            env_set(&mut factors.win, &format!("GZ_BOOST_{tier}_WIN"))?;
            env_set(&mut factors.block_win, &format!("GZ_BOOST_{tier}_BLOCK_WIN"))?;
            env_set(&mut factors.open_four, &format!("GZ_BOOST_{tier}_OPEN_FOUR"))?;
            env_set(
                &mut factors.block_open_four,
                &format!("GZ_BOOST_{tier}_BLOCK_OPEN_FOUR"),
            )?;
            env_set(&mut factors.four, &format!("GZ_BOOST_{tier}_FOUR"))?;
            env_set(&mut factors.block_four, &format!("GZ_BOOST_{tier}_BLOCK_FOUR"))?;
            env_set(&mut factors.open_three, &format!("GZ_BOOST_{tier}_OPEN_THREE"))?;
            env_set(
                &mut factors.block_open_three,
                &format!("GZ_BOOST_{tier}_BLOCK_OPEN_THREE"),
            )?;
            env_set(
                &mut factors.connected_three,
                &format!("GZ_BOOST_{tier}_CONNECTED_THREE"),
            )?;
            env_set(
                &mut factors.block_connected_three,
                &format!("GZ_BOOST_{tier}_BLOCK_CONNECTED_THREE"),
            )?;
            env_set(&mut factors.long_link, &format!("GZ_BOOST_{tier}_LONG_LINK"))?;
        }

        env_set(&mut self.tactics.vcf_depth, "GZ_VCF_DEPTH")?;
        env_set(&mut self.tactics.vct_depth, "GZ_VCT_DEPTH")?;
        env_set(&mut self.tactics.node_cap, "GZ_SOLVER_NODE_CAP")?;

        env_set(&mut self.selfplay.num_workers, "GZ_NUM_WORKERS")?;
        env_set(&mut self.selfplay.exploration_moves, "GZ_EXPLORATION_MOVES")?;
        env_set(
            &mut self.selfplay.past_model_probability,
            "GZ_PAST_MODEL_PROBABILITY",
        )?;
        env_set(&mut self.selfplay.save_interval_ms, "GZ_SAVE_INTERVAL_MS")?;
        env_set(&mut self.selfplay.duration_ms, "GZ_SELF_PLAY_DURATION_MS")?;
        env_set(&mut self.selfplay.base_think_ms, "GZ_BASE_THINK_MS")?;

        env_set(&mut self.arena.games, "GZ_ARENA_GAMES")?;
        env_set(&mut self.arena.think_ms, "GZ_ARENA_THINK_TIME_MS")?;
        env_set(&mut self.arena.threshold, "GZ_ARENA_THRESHOLD")?;
        env_set(&mut self.arena.promote, "GZ_ARENA_PROMOTE")?;

        env_set(&mut self.pipeline.cycles, "GZ_PIPELINE_CYCLES")?;
        env_set(&mut self.pipeline.forever, "GZ_FOREVER")?;
        env_set(&mut self.pipeline.interval_ms, "GZ_PIPELINE_INTERVAL_MS")?;
        env_set(&mut self.pipeline.on_error_delay_ms, "GZ_ON_ERROR_DELAY_MS")?;

        env_set(&mut self.server.bind, "GZ_BIND")?;
        env_set(
            &mut self.server.model_check_interval_ms,
            "GZ_MODEL_CHECK_INTERVAL_MS",
        )?;

        env_set(&mut self.paths.model_dir, "GZ_MODEL_DIR")?;
        env_set(&mut self.paths.candidate_dir, "GZ_CANDIDATE_DIR")?;
        env_set(&mut self.paths.past_models_dir, "GZ_PAST_MODELS_DIR")?;
        env_set(&mut self.paths.replay_dir, "GZ_REPLAY_DIR")?;
        env_set(&mut self.paths.status_path, "GZ_STATUS_PATH")?;
        if let Ok(url) = std::env::var("GZ_MODEL_URL") {
            self.paths.model_url = if url.is_empty() { None } else { Some(url) };
        }
        Ok(())
    }
}

fn env_set<T: std::str::FromStr>(slot: &mut T, key: &str) -> Result<(), ConfigError> {
    match std::env::var(key) {
        Ok(raw) => {
            let parsed = raw.parse::<T>().map_err(|_| ConfigError::BadEnvValue {
                key: key.to_string(),
                value: raw,
            })?;
            *slot = parsed;
            Ok(())
        }
        Err(_) => Ok(()),
    }
}
