//! Versioned NDJSON event structs.

use serde::Serialize;

/// One search root summary, logged per executed self-play move.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRootEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub worker_id: usize,
    pub game_id: String,
    pub move_index: u32,
    pub player: &'static str,
    pub chosen_row: i16,
    pub chosen_col: i16,
    pub source: String,
    pub root_value: f32,
    pub simulations: u32,
    pub cache_hits: u64,
    pub early_stopped: bool,
    pub think_ms: u64,
}

/// One orchestrator flush.
#[derive(Debug, Clone, Serialize)]
pub struct SelfplayFlushEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub file: String,
    pub samples: usize,
    pub games_completed: u64,
    pub buffered_before: usize,
}

/// Stage transition in the cycle controller.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStageEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub cycle: u32,
    pub stage: String,
    pub outcome: String,
    pub detail: Option<String>,
}
