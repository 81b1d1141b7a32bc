//! Point Index: a chained hash table over string keys.
//!
//! Buckets are vectors of (key, value) pairs. After an insert of a new key
//! pushes `len / bucket_count` above the configured load factor, the table is
//! rebuilt with `2n + 1` buckets.
//!
//! The hash is a fixed FxHash-style mix over the key bytes, so bucket
//! placement is identical across process runs and the side-file can restore a
//! table without rehashing.

/// Default number of buckets.
pub const DEFAULT_BUCKETS: usize = 101;

/// Default rehash threshold.
pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.7;

const HASH_SEED: u64 = 0xcbf2_9ce4_8422_2325;
const HASH_MULTIPLIER: u64 = 0x517c_c1b7_2722_0a95;

/// Deterministic 64-bit hash of a string key.
#[inline]
pub fn hash_key(key: &str) -> u64 {
    let bytes = key.as_bytes();
    let mut h = HASH_SEED ^ bytes.len() as u64;
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        h = (h.rotate_left(5) ^ u64::from_le_bytes(word)).wrapping_mul(HASH_MULTIPLIER);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut word = [0u8; 8];
        word[..rest.len()].copy_from_slice(rest);
        h = (h.rotate_left(5) ^ u64::from_le_bytes(word)).wrapping_mul(HASH_MULTIPLIER);
    }
    // Final avalanche so short keys differing in one byte spread across buckets.
    h ^= h >> 33;
    h = h.wrapping_mul(HASH_MULTIPLIER);
    h ^ (h >> 29)
}

/// Chained hash table mapping string keys to values.
#[derive(Debug, Clone)]
pub struct PointIndex<V> {
    buckets: Vec<Vec<(String, V)>>,
    len: usize,
    max_load_factor: f64,
}

impl<V: Clone> Default for PointIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> PointIndex<V> {
    /// Creates an empty table with the default bucket count.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUCKETS)
    }

    /// Creates an empty table with `buckets` buckets (at least one).
    pub fn with_capacity(buckets: usize) -> Self {
        Self::with_load_factor(buckets, DEFAULT_MAX_LOAD_FACTOR)
    }

    /// Creates an empty table with an explicit rehash threshold.
    pub fn with_load_factor(buckets: usize, max_load_factor: f64) -> Self {
        let buckets = buckets.max(1);
        Self {
            buckets: vec![Vec::new(); buckets],
            len: 0,
            max_load_factor,
        }
    }

    #[inline]
    fn bucket_of(&self, key: &str) -> usize {
        (hash_key(key) % self.buckets.len() as u64) as usize
    }

    /// Number of keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current number of buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Current `len / bucket_count`.
    #[inline]
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.buckets.len() as f64
    }

    /// Inserts or overwrites `key`.
    pub fn insert(&mut self, key: &str, value: V) {
        let b = self.bucket_of(key);
        let bucket = &mut self.buckets[b];
        if let Some(slot) = bucket.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
            return;
        }
        bucket.push((key.to_string(), value));
        self.len += 1;

        if self.load_factor() > self.max_load_factor {
            self.rehash(self.buckets.len() * 2 + 1);
        }
    }

    /// Looks up `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.buckets[self.bucket_of(key)]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`. Returns true if it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let b = self.bucket_of(key);
        let bucket = &mut self.buckets[b];
        match bucket.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                bucket.swap_remove(pos);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    /// All pairs, in bucket order.
    pub fn pairs(&self) -> Vec<(String, V)> {
        self.buckets.iter().flatten().cloned().collect()
    }

    /// Removes every key while keeping the bucket count.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }

    fn rehash(&mut self, new_buckets: usize) {
        let old = std::mem::replace(&mut self.buckets, vec![Vec::new(); new_buckets]);
        for (key, value) in old.into_iter().flatten() {
            let b = self.bucket_of(&key);
            self.buckets[b].push((key, value));
        }
    }
}
