//! Post-arena tuning feedback.
//!
//! After each arena result the boost multipliers and the TT/NN prior mixes
//! are nudged by a step proportional to (winrate - threshold). The scale is
//! clamped to +/-10% around the configured baseline, the mixes to [0, 0.6].
//! Adjusted values persist to disk so later cycles pick them up.

use std::fs;
use std::path::Path;

use gz_core::Config;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tuning {
    /// Multiplier applied to every tactical boost factor.
    pub boost_scale: f64,
    pub child_tt_prior_mix: f32,
    pub root_tt_prior_mix: f32,
}

impl Default for Tuning {
    fn default() -> Tuning {
        Tuning {
            boost_scale: 1.0,
            child_tt_prior_mix: 0.35,
            root_tt_prior_mix: 0.20,
        }
    }
}

/// Nudge the tuning values toward (or away from) stronger tactical
/// reliance depending on how the candidate fared.
pub fn arena_feedback(tuning: &mut Tuning, winrate: f64, threshold: f64, step: f64) {
    let delta = step * (winrate - threshold);
    tuning.boost_scale = (tuning.boost_scale * (1.0 + delta)).clamp(0.9, 1.1);
    tuning.child_tt_prior_mix =
        (tuning.child_tt_prior_mix as f64 + delta).clamp(0.0, 0.6) as f32;
    tuning.root_tt_prior_mix =
        (tuning.root_tt_prior_mix as f64 + delta).clamp(0.0, 0.6) as f32;
}

/// Scale a configuration's boost factors and prior mixes by the persisted
/// tuning. The boost scale multiplies every factor except the neutral 1.0
/// entries, staying within the clamp by construction.
pub fn apply_tuning(cfg: &mut Config, tuning: &Tuning) {
    let s = tuning.boost_scale as f32;
    for factors in [&mut cfg.mcts.root_boost, &mut cfg.mcts.child_boost] {
        for f in [
            &mut factors.win,
            &mut factors.block_win,
            &mut factors.open_four,
            &mut factors.block_open_four,
            &mut factors.four,
            &mut factors.block_four,
            &mut factors.open_three,
            &mut factors.block_open_three,
            &mut factors.connected_three,
            &mut factors.block_connected_three,
            &mut factors.long_link,
        ] {
            if (*f - 1.0).abs() > f32::EPSILON {
                *f *= s;
            }
        }
    }
    cfg.mcts.child_tt_prior_mix = tuning.child_tt_prior_mix;
    cfg.mcts.root_tt_prior_mix = tuning.root_tt_prior_mix;
}

pub fn load_tuning(path: &Path) -> Tuning {
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub fn save_tuning(path: &Path, tuning: &Tuning) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(tuning)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_moves_with_the_winrate() {
        let mut t = Tuning::default();
        arena_feedback(&mut t, 1.0, 0.6, 0.05);
        assert!(t.boost_scale > 1.0);
        assert!(t.child_tt_prior_mix > 0.35);

        let mut t = Tuning::default();
        arena_feedback(&mut t, 0.0, 0.6, 0.05);
        assert!(t.boost_scale < 1.0);
        assert!(t.child_tt_prior_mix < 0.35);
    }

    #[test]
    fn repeated_feedback_respects_the_clamps() {
        let mut t = Tuning::default();
        for _ in 0..1000 {
            arena_feedback(&mut t, 1.0, 0.0, 0.5);
        }
        assert!(t.boost_scale <= 1.1);
        assert!(t.child_tt_prior_mix <= 0.6);
        assert!(t.root_tt_prior_mix <= 0.6);

        for _ in 0..1000 {
            arena_feedback(&mut t, 0.0, 1.0, 0.5);
        }
        assert!(t.boost_scale >= 0.9);
        assert!(t.child_tt_prior_mix >= 0.0);
    }

    #[test]
    fn tuning_applies_to_the_config() {
        let mut cfg = Config::default();
        let base_open_four = cfg.mcts.root_boost.open_four;
        let tuning = Tuning {
            boost_scale: 1.05,
            child_tt_prior_mix: 0.4,
            root_tt_prior_mix: 0.25,
        };
        apply_tuning(&mut cfg, &tuning);
        assert!((cfg.mcts.root_boost.open_four - base_open_four * 1.05).abs() < 1e-6);
        // Neutral factors stay neutral.
        assert_eq!(cfg.mcts.root_boost.win, 1.0);
        assert_eq!(cfg.mcts.child_tt_prior_mix, 0.4);
    }

    #[test]
    fn tuning_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuning.json");
        let mut t = Tuning::default();
        arena_feedback(&mut t, 0.8, 0.6, 0.05);
        save_tuning(&path, &t).unwrap();
        assert_eq!(load_tuning(&path), t);
        // Missing file falls back to defaults.
        assert_eq!(load_tuning(&dir.path().join("nope.json")), Tuning::default());
    }
}
