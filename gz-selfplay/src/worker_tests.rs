use gz_core::config::{MctsConfig, TacticsConfig};
use gz_core::{Config, Stone};
use gz_infer::UniformEvaluator;
use gz_mcts::Mcts;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

use crate::worker::{play_one_game, think_time_for_move};

#[test]
fn think_time_follows_the_phase_schedule() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    assert_eq!(think_time_for_move(1000, 0, 0.0, &mut rng), 800);
    assert_eq!(think_time_for_move(1000, 6, 0.0, &mut rng), 800);
    assert_eq!(think_time_for_move(1000, 7, 0.0, &mut rng), 1200);
    assert_eq!(think_time_for_move(1000, 30, 0.0, &mut rng), 1200);
    assert_eq!(think_time_for_move(1000, 31, 0.0, &mut rng), 1000);
}

#[test]
fn think_time_is_clamped_to_200ms() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    assert_eq!(think_time_for_move(100, 0, 0.0, &mut rng), 200);
}

#[test]
fn jitter_stays_within_the_band() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    for idx in 0..50 {
        let t = think_time_for_move(1000, 40, 0.1, &mut rng);
        assert!((900..=1100).contains(&t), "move {idx}: {t}");
    }
}

fn quick_config() -> Config {
    let mut cfg = Config::default();
    cfg.board.size = 9;
    cfg.selfplay.base_think_ms = 200;
    cfg.selfplay.think_jitter_frac = 0.0;
    cfg.selfplay.exploration_moves = 4;
    cfg.selfplay.swap2_opening = false;
    cfg.mcts = MctsConfig {
        fast_mode: true,
        ..MctsConfig::default()
    };
    cfg.tactics = TacticsConfig {
        node_cap: 2_000,
        ..TacticsConfig::default()
    };
    cfg
}

#[test]
fn one_game_produces_consistent_samples() {
    let cfg = quick_config();
    let mut mcts = Mcts::new(cfg.mcts.clone(), cfg.tactics.clone(), 256, 11);
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    let record = play_one_game(
        &cfg,
        &mut mcts,
        &UniformEvaluator,
        &UniformEvaluator,
        &mut rng,
        "g-test",
        0,
        None,
    )
    .unwrap();

    assert!(record.moves > 0);
    assert_eq!(record.samples.len(), record.moves as usize);

    let result_black = match record.winner {
        Some(Stone::Black) => 1,
        Some(Stone::White) => -1,
        None => 0,
    };
    for (i, s) in record.samples.iter().enumerate() {
        assert_eq!(s.meta.move_index, i as u32);
        assert_eq!(s.meta.total_moves, record.moves);
        assert_eq!(s.meta.game_id, "g-test");
        assert_eq!(s.meta.result, result_black);
        assert_eq!(s.meta.source, "self_play");
        // Final values are from the sample's own side.
        let expected = match record.winner {
            None => 0,
            Some(w) if w == s.player => 1,
            Some(_) => -1,
        };
        assert_eq!(s.final_value, expected);
        // The search target is a distribution over the board.
        let sum: f32 = s.mcts_policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4, "move {i}: sum {sum}");
        assert_eq!(s.teacher_policy.len(), 81);
        assert!((-1.0..=1.0).contains(&s.teacher_value));
    }

    // Sides alternate from black.
    assert_eq!(record.samples[0].player, Stone::Black);
    if record.samples.len() > 1 {
        assert_eq!(record.samples[1].player, Stone::White);
    }
}

#[test]
fn swap2_games_tag_their_samples() {
    let mut cfg = quick_config();
    cfg.selfplay.swap2_opening = true;
    cfg.selfplay.swap2_budget_ms = 100;
    let mut mcts = Mcts::new(cfg.mcts.clone(), cfg.tactics.clone(), 256, 3);
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let record = play_one_game(
        &cfg,
        &mut mcts,
        &UniformEvaluator,
        &UniformEvaluator,
        &mut rng,
        "g-swap",
        0,
        None,
    )
    .unwrap();
    assert!(!record.samples.is_empty());
    for s in &record.samples {
        assert!(s.meta.tags.iter().any(|t| t == "swap2"));
        // The opening stones are part of the recorded states.
        let stones: usize = s
            .state
            .iter()
            .flatten()
            .filter(|c| c.is_some())
            .count();
        assert!(stones >= 3);
    }
}
