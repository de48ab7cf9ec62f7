//! Bounded LRU storage: the generic map plus the prediction cache built on
//! it.

use std::hash::Hash;
use std::sync::Mutex;

use gz_core::{canonical_key, Board, Stone};
use rustc_hash::FxHashMap;

const NIL: usize = usize::MAX;

struct Slot<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// A bounded map evicting the least recently used entry past capacity.
/// Lookups refresh recency.
pub struct LruMap<K, V> {
    map: FxHashMap<K, usize>,
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> LruMap<K, V> {
    pub fn new(capacity: usize) -> LruMap<K, V> {
        LruMap {
            map: FxHashMap::default(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        Some(&self.slots[idx].value)
    }

    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|&idx| &self.slots[idx].value)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if let Some(&idx) = self.map.get(&key) {
            self.slots[idx].value = value;
            self.touch(idx);
            return;
        }
        if self.map.len() >= self.capacity {
            self.evict_tail();
        }
        let idx = match self.free.pop() {
            Some(i) => {
                self.slots[i] = Slot { key: key.clone(), value, prev: NIL, next: NIL };
                i
            }
            None => {
                self.slots.push(Slot { key: key.clone(), value, prev: NIL, next: NIL });
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev != NIL {
            self.slots[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn evict_tail(&mut self) {
        let idx = self.tail;
        if idx == NIL {
            return;
        }
        self.unlink(idx);
        self.map.remove(&self.slots[idx].key);
        self.free.push(idx);
    }
}

#[derive(Debug, Clone)]
struct CachedPrediction {
    /// Policy stored in the canonical orientation of the position.
    policy: Vec<f32>,
    value: f32,
    board_size: usize,
}

/// Bounded cache of raw network outputs keyed by the canonical board hash
/// plus side-to-move, so symmetric positions share one entry.
///
/// A plain mutex guards the map; hit rate matters more than write
/// throughput here.
pub struct PredictionCache {
    inner: Mutex<LruMap<(String, Stone), CachedPrediction>>,
}

impl PredictionCache {
    pub fn new(capacity: usize) -> PredictionCache {
        PredictionCache {
            inner: Mutex::new(LruMap::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a prediction, returning the policy mapped back into the
    /// orientation of `board`.
    pub fn get(&self, board: &Board, to_move: Stone) -> Option<crate::Prediction> {
        let canon = canonical_key(board);
        let mut inner = self.inner.lock().expect("cache poisoned");
        let hit = inner.get(&(canon.key, to_move))?;
        if hit.board_size != board.size() {
            return None;
        }
        let policy = canon
            .transform
            .inverse()
            .apply_policy(&hit.policy, hit.board_size);
        Some(crate::Prediction {
            policy,
            value: hit.value,
        })
    }

    /// Store a prediction given in the orientation of `board`.
    pub fn insert(&self, board: &Board, to_move: Stone, policy: &[f32], value: f32) {
        let canon = canonical_key(board);
        let stored = canon.transform.apply_policy(policy, board.size());
        let mut inner = self.inner.lock().expect("cache poisoned");
        inner.insert(
            (canon.key, to_move),
            CachedPrediction {
                policy: stored,
                value,
                board_size: board.size(),
            },
        );
    }
}
