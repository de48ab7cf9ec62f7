use gz_core::{Board, Move, Stone, Transform};

use crate::cache::{LruMap, PredictionCache};

#[test]
fn lru_evicts_oldest_past_capacity() {
    let mut lru: LruMap<u32, u32> = LruMap::new(3);
    lru.insert(1, 10);
    lru.insert(2, 20);
    lru.insert(3, 30);
    lru.insert(4, 40);
    assert_eq!(lru.len(), 3);
    assert!(lru.peek(&1).is_none());
    assert_eq!(lru.peek(&4), Some(&40));
}

#[test]
fn lru_get_refreshes_recency() {
    let mut lru: LruMap<u32, u32> = LruMap::new(3);
    lru.insert(1, 10);
    lru.insert(2, 20);
    lru.insert(3, 30);
    assert_eq!(lru.get(&1), Some(&10));
    lru.insert(4, 40);
    // 2 was the coldest entry once 1 was touched.
    assert!(lru.peek(&2).is_none());
    assert_eq!(lru.peek(&1), Some(&10));
}

#[test]
fn lru_insert_overwrites_in_place() {
    let mut lru: LruMap<u32, u32> = LruMap::new(2);
    lru.insert(1, 10);
    lru.insert(1, 11);
    assert_eq!(lru.len(), 1);
    assert_eq!(lru.peek(&1), Some(&11));
}

#[test]
fn lru_reuses_freed_slots() {
    let mut lru: LruMap<u32, u32> = LruMap::new(2);
    for i in 0..100u32 {
        lru.insert(i, i);
    }
    assert_eq!(lru.len(), 2);
    assert_eq!(lru.peek(&99), Some(&99));
    assert_eq!(lru.peek(&98), Some(&98));
}

fn spike_policy(n: usize, mv: Move) -> Vec<f32> {
    let mut p = vec![0.0; n * n];
    p[mv.flat(n)] = 1.0;
    p
}

#[test]
fn prediction_cache_shares_entries_across_symmetries() {
    let cache = PredictionCache::new(16);
    let mut b = Board::new(15);
    b.place(Move::new(2, 5), Stone::Black);

    cache.insert(&b, Stone::White, &spike_policy(15, Move::new(3, 3)), 0.5);

    for t in Transform::ALL {
        let tb = t.apply_board(&b);
        let hit = cache.get(&tb, Stone::White).expect("symmetric hit");
        assert!((hit.value - 0.5).abs() < 1e-6);
        // The spike follows the board orientation.
        let spike = t.apply_move(Move::new(3, 3), 15).flat(15);
        assert!((hit.policy[spike] - 1.0).abs() < 1e-5, "{t:?}");
    }
    // One entry serves the whole orbit.
    assert_eq!(cache.len(), 1);
}

#[test]
fn prediction_cache_keys_on_side_to_move() {
    let cache = PredictionCache::new(16);
    let mut b = Board::new(15);
    b.place(Move::new(7, 7), Stone::Black);

    cache.insert(&b, Stone::Black, &spike_policy(15, Move::new(7, 8)), 0.1);
    assert!(cache.get(&b, Stone::Black).is_some());
    assert!(cache.get(&b, Stone::White).is_none());
}
