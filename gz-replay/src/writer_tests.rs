use std::fs;

use gz_core::{Board, Stone};

use crate::sample::{board_to_state, SampleMeta, TrainingSample};
use crate::writer::{cleanup_tmp_files, ReplayWriter};

fn tiny_sample(idx: u32) -> TrainingSample {
    TrainingSample {
        state: board_to_state(&Board::new(5)),
        player: Stone::Black,
        mcts_policy: vec![1.0 / 25.0; 25],
        teacher_policy: vec![1.0 / 25.0; 25],
        teacher_value: 0.0,
        final_value: 0,
        meta: SampleMeta {
            source: "self_play".into(),
            game_id: format!("g-{idx}"),
            move_index: idx,
            total_moves: 1,
            result: 0,
            tags: Vec::new(),
            extra: serde_json::Map::new(),
        },
    }
}

#[test]
fn flush_writes_one_object_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let mut w = ReplayWriter::new(dir.path(), 1).unwrap();
    w.push(tiny_sample(0));
    w.push(tiny_sample(1));

    let (path, count) = w.flush(1_000).unwrap().unwrap();
    assert_eq!(count, 2);
    assert_eq!(w.pending(), 0);

    let raw = fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = raw.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let _: TrainingSample = serde_json::from_str(line).unwrap();
    }
}

#[test]
fn empty_flush_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let mut w = ReplayWriter::new(dir.path(), 1).unwrap();
    assert!(w.flush(1_000).unwrap().is_none());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn file_names_increase_lexicographically() {
    let dir = tempfile::tempdir().unwrap();
    let mut w = ReplayWriter::new(dir.path(), 2).unwrap();

    w.push(tiny_sample(0));
    let (p1, _) = w.flush(5_000).unwrap().unwrap();
    w.push(tiny_sample(1));
    let (p2, _) = w.flush(5_000).unwrap().unwrap();
    w.push(tiny_sample(2));
    let (p3, _) = w.flush(6_000).unwrap().unwrap();

    let n1 = p1.file_name().unwrap().to_str().unwrap().to_string();
    let n2 = p2.file_name().unwrap().to_str().unwrap().to_string();
    let n3 = p3.file_name().unwrap().to_str().unwrap().to_string();
    assert!(n1 < n2, "{n1} vs {n2}");
    assert!(n2 < n3, "{n2} vs {n3}");
}

#[test]
fn writers_with_different_seeds_use_distinct_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = ReplayWriter::new(dir.path(), 10).unwrap();
    let mut b = ReplayWriter::new(dir.path(), 20).unwrap();
    a.push(tiny_sample(0));
    b.push(tiny_sample(1));
    let (pa, _) = a.flush(7_000).unwrap().unwrap();
    let (pb, _) = b.flush(7_000).unwrap().unwrap();
    assert_ne!(pa, pb);
}

#[test]
fn stale_tmp_files_are_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("samples_crashed.jsonl.tmp"), b"{").unwrap();
    cleanup_tmp_files(dir.path()).unwrap();
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
