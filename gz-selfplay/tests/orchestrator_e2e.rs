//! End-to-end: bootstrap a model, run a short self-play window, verify the
//! replay files.

use std::fs;

use gz_core::Config;
use gz_replay::TrainingSample;
use gz_selfplay::run_orchestrator;

fn e2e_config(root: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.board.size = 9;
    cfg.selfplay.num_workers = 2;
    cfg.selfplay.duration_ms = 1_200;
    cfg.selfplay.save_interval_ms = 400;
    cfg.selfplay.base_think_ms = 200;
    cfg.selfplay.think_jitter_frac = 0.0;
    cfg.selfplay.exploration_moves = 4;
    cfg.selfplay.swap2_opening = false;
    cfg.mcts.fast_mode = true;
    cfg.tactics.node_cap = 2_000;
    cfg.paths.model_dir = root.join("models/prod").display().to_string();
    cfg.paths.past_models_dir = root.join("models/past").display().to_string();
    cfg.paths.replay_dir = root.join("replay").display().to_string();
    cfg
}

#[test]
fn short_selfplay_window_writes_valid_samples() {
    let root = tempfile::tempdir().unwrap();
    let cfg = e2e_config(root.path());

    let report = run_orchestrator(&cfg, 0xFEED).unwrap();

    // The production model was bootstrapped on first use.
    assert!(root.path().join("models/prod/model.json").exists());

    // Workers finish their running game after the deadline, so at least
    // one game lands.
    assert!(report.games_completed >= 1, "report: {report:?}");
    assert!(report.samples_written >= 1);
    assert!(report.files_written >= 1);
    assert_eq!(report.worker_crashes, 0);

    let mut parsed = 0usize;
    for entry in fs::read_dir(root.path().join("replay")).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        for line in fs::read_to_string(&path).unwrap().lines() {
            let s: TrainingSample = serde_json::from_str(line).expect("valid sample line");
            assert_eq!(s.state.len(), 9);
            parsed += 1;
        }
    }
    assert_eq!(parsed as u64, report.samples_written);
}
