use gz_core::{Board, Move, Stone};
use gz_features::encode_board_v1;

use crate::evaluator::Evaluator;
use crate::model::{model_fingerprint, LinearModel, ModelWatcher};

#[test]
fn create_load_predict_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    LinearModel::create_random(dir.path(), 9, 7).unwrap();
    let model = LinearModel::load(dir.path()).unwrap();
    assert_eq!(model.board_size(), 9);

    let mut b = Board::new(9);
    b.place(Move::new(4, 4), Stone::Black);
    let pred = model.predict_one(&encode_board_v1(&b, Stone::White)).unwrap();

    assert_eq!(pred.policy.len(), 81);
    let sum: f32 = pred.policy.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4);
    assert!(pred.policy.iter().all(|&p| p >= 0.0));
    assert!((-1.0..=1.0).contains(&pred.value));
}

#[test]
fn prediction_is_deterministic_and_batchable() {
    let dir = tempfile::tempdir().unwrap();
    LinearModel::create_random(dir.path(), 9, 11).unwrap();
    let model = LinearModel::load(dir.path()).unwrap();

    let mut b1 = Board::new(9);
    b1.place(Move::new(0, 0), Stone::Black);
    let mut b2 = Board::new(9);
    b2.place(Move::new(8, 8), Stone::White);

    let f1 = encode_board_v1(&b1, Stone::White);
    let f2 = encode_board_v1(&b2, Stone::Black);

    let batch = model.predict_batch(&[f1.clone(), f2.clone()]).unwrap();
    let single1 = model.predict_one(&f1).unwrap();
    let single2 = model.predict_one(&f2).unwrap();
    assert_eq!(batch[0].policy, single1.policy);
    assert_eq!(batch[1].policy, single2.policy);
    assert_eq!(batch[0].value, single1.value);
    assert_eq!(batch[1].value, single2.value);
}

#[test]
fn wrong_board_size_is_a_shape_error() {
    let dir = tempfile::tempdir().unwrap();
    LinearModel::create_random(dir.path(), 9, 3).unwrap();
    let model = LinearModel::load(dir.path()).unwrap();

    let b = Board::new(15);
    let err = model
        .predict_one(&encode_board_v1(&b, Stone::Black))
        .unwrap_err();
    assert!(err.to_string().contains("board size"));
}

#[test]
fn fingerprint_changes_with_weights() {
    let dir1 = tempfile::tempdir().unwrap();
    let dir2 = tempfile::tempdir().unwrap();
    LinearModel::create_random(dir1.path(), 9, 1).unwrap();
    LinearModel::create_random(dir2.path(), 9, 2).unwrap();

    let fp1 = model_fingerprint(dir1.path()).unwrap();
    let fp2 = model_fingerprint(dir2.path()).unwrap();
    assert_ne!(fp1, fp2);
    // Stable for unchanged content.
    assert_eq!(fp1, model_fingerprint(dir1.path()).unwrap());
}

#[test]
fn same_seed_same_fingerprint() {
    let dir1 = tempfile::tempdir().unwrap();
    let dir2 = tempfile::tempdir().unwrap();
    LinearModel::create_random(dir1.path(), 9, 5).unwrap();
    LinearModel::create_random(dir2.path(), 9, 5).unwrap();
    assert_eq!(
        model_fingerprint(dir1.path()).unwrap(),
        model_fingerprint(dir2.path()).unwrap()
    );
}

#[test]
fn watcher_reloads_on_mtime_change() {
    let dir = tempfile::tempdir().unwrap();
    LinearModel::create_random(dir.path(), 9, 1).unwrap();

    let mut watcher = ModelWatcher::new(dir.path(), None);
    // First check always loads.
    assert!(watcher.check_reload().unwrap().is_some());
    // Unchanged directory: no reload.
    assert!(watcher.check_reload().unwrap().is_none());

    // Rewrite the manifest with a fresh mtime.
    std::thread::sleep(std::time::Duration::from_millis(20));
    LinearModel::create_random(dir.path(), 9, 2).unwrap();
    assert!(watcher.check_reload().unwrap().is_some());
}
