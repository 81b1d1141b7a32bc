//! Ordered Index: an in-memory B-tree of order 5 over string keys.
//!
//! Each node holds at most 4 sorted (key, value) pairs and, when internal,
//! one more child than keys. Structure:
//!
//! ```text
//!                 [ m ]
//!               /       \
//!        [ c  f ]       [ q  t  w ]
//!       /   |    \     /   |   |   \
//!     [a] [d e] [g]  [n] [r] [u] [x y]
//! ```
//!
//! Insertion splits any full node top-down before descending into it, so a
//! root split is the only way the tree grows in height. Removal refills an
//! underfull child (borrow from a sibling, else merge) before descending.

mod constants;
mod node;

pub use constants::{MAX_KEYS, MIN_KEYS, ORDER};

use node::Node;
use quadra_common::{QuadraError, Result};

/// Balanced multi-way search tree mapping string keys to values.
#[derive(Debug, Clone)]
pub struct OrderedIndex<V> {
    root: Node<V>,
    len: usize,
}

impl<V: Clone> Default for OrderedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> OrderedIndex<V> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            root: Node::leaf(),
            len: 0,
        }
    }

    /// Number of keys in the index.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, counting the root. An empty tree has height 1.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = &self.root;
        while let Some(first) = node.children.first() {
            height += 1;
            node = first;
        }
        height
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.root = Node::leaf();
        self.len = 0;
    }

    /// Looks up the value for `key`.
    pub fn search(&self, key: &str) -> Option<&V> {
        let mut node = &self.root;
        loop {
            match node.find(key) {
                Ok(i) => return node.values.get(i),
                Err(_) if node.is_leaf() => return None,
                Err(i) => node = &node.children[i],
            }
        }
    }

    /// Returns true if `key` is present.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.search(key).is_some()
    }

    /// Inserts `key`. An existing key has its value replaced instead.
    pub fn insert(&mut self, key: &str, value: V) {
        if self.update(key, value.clone()) {
            return;
        }

        if self.root.is_full() {
            let old_root = std::mem::replace(&mut self.root, Node::leaf());
            self.root.children.push(old_root);
            self.root.split_child(0);
        }
        Self::insert_non_full(&mut self.root, key, value);
        self.len += 1;
    }

    fn insert_non_full(mut node: &mut Node<V>, key: &str, value: V) {
        loop {
            let mut i = match node.find(key) {
                Ok(i) | Err(i) => i,
            };
            if node.is_leaf() {
                node.keys.insert(i, key.to_string());
                node.values.insert(i, value);
                return;
            }
            if node.children[i].is_full() {
                node.split_child(i);
                if key > node.keys[i].as_str() {
                    i += 1;
                }
            }
            node = &mut node.children[i];
        }
    }

    /// Replaces the value for an existing key. Returns false if absent.
    pub fn update(&mut self, key: &str, value: V) -> bool {
        let mut node = &mut self.root;
        loop {
            match node.find(key) {
                Ok(i) => {
                    node.values[i] = value;
                    return true;
                }
                Err(_) if node.is_leaf() => return false,
                Err(i) => node = &mut node.children[i],
            }
        }
    }

    /// Removes `key`. Returns false, leaving the tree untouched, if absent.
    pub fn remove(&mut self, key: &str) -> bool {
        if !self.contains(key) {
            return false;
        }
        let removed = self.root.remove(key);
        if self.root.keys.is_empty() && !self.root.is_leaf() {
            self.root = self.root.children.remove(0);
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// All pairs in strictly ascending key order.
    pub fn pairs(&self) -> Vec<(String, V)> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect_in_order(&mut out);
        out
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.pairs().into_iter().map(|(k, _)| k).collect()
    }

    /// Pairs with `start <= key < end`, ascending.
    pub fn range(&self, start: &str, end: &str) -> Vec<(String, V)> {
        let mut out = Vec::new();
        if start < end {
            self.root.collect_range(start, end, &mut out);
        }
        out
    }

    /// Verifies the structural invariants: sorted keys, per-node occupancy
    /// bounds, child counts, subtree key bounds, uniform leaf depth and the
    /// cached length.
    pub fn check_invariants(&self) -> Result<()> {
        let mut leaf_depth = None;
        let count = Self::check_node(&self.root, None, None, 0, true, &mut leaf_depth)?;
        if count != self.len {
            return Err(QuadraError::IndexInconsistent(format!(
                "ordered index counts {} keys but caches length {}",
                count, self.len
            )));
        }
        Ok(())
    }

    fn check_node(
        node: &Node<V>,
        lower: Option<&str>,
        upper: Option<&str>,
        depth: usize,
        is_root: bool,
        leaf_depth: &mut Option<usize>,
    ) -> Result<usize> {
        let fault = |msg: String| Err(QuadraError::IndexInconsistent(msg));

        if node.keys.len() != node.values.len() {
            return fault(format!("node at depth {} has mismatched keys and values", depth));
        }
        if node.keys.len() > MAX_KEYS {
            return fault(format!("node at depth {} holds {} keys", depth, node.keys.len()));
        }
        if !is_root && node.keys.len() < MIN_KEYS {
            return fault(format!(
                "non-root node at depth {} holds {} keys, minimum is {}",
                depth,
                node.keys.len(),
                MIN_KEYS
            ));
        }
        if node.keys.windows(2).any(|w| w[0] >= w[1]) {
            return fault(format!("node at depth {} has unsorted keys", depth));
        }
        if let (Some(lo), Some(first)) = (lower, node.keys.first()) {
            if first.as_str() <= lo {
                return fault(format!("key {:?} not above separator {:?}", first, lo));
            }
        }
        if let (Some(hi), Some(last)) = (upper, node.keys.last()) {
            if last.as_str() >= hi {
                return fault(format!("key {:?} not below separator {:?}", last, hi));
            }
        }

        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return fault(format!("leaves at depths {} and {}", d, depth));
                }
                Some(_) => {}
            }
            return Ok(node.keys.len());
        }

        if node.children.len() != node.keys.len() + 1 {
            return fault(format!(
                "internal node at depth {} has {} keys and {} children",
                depth,
                node.keys.len(),
                node.children.len()
            ));
        }

        let mut count = node.keys.len();
        for (i, child) in node.children.iter().enumerate() {
            let lo = if i == 0 {
                lower
            } else {
                Some(node.keys[i - 1].as_str())
            };
            let hi = node.keys.get(i).map(String::as_str).or(upper);
            count += Self::check_node(child, lo, hi, depth + 1, false, leaf_depth)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    fn key(i: u32) -> String {
        format!("K{:05}", i)
    }

    #[test]
    fn test_empty_index() {
        let index: OrderedIndex<u64> = OrderedIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.height(), 1);
        assert!(index.search("missing").is_none());
        assert!(index.pairs().is_empty());
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_and_search() {
        let mut index = OrderedIndex::new();
        for (i, k) in ["delta", "alpha", "echo", "charlie", "bravo"].iter().enumerate() {
            index.insert(k, i as u64);
        }

        assert_eq!(index.len(), 5);
        assert_eq!(index.search("alpha"), Some(&1));
        assert_eq!(index.search("echo"), Some(&2));
        assert_eq!(index.search("foxtrot"), None);
        // Five keys overflow a single node.
        assert_eq!(index.height(), 2);
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_existing_key_updates() {
        let mut index = OrderedIndex::new();
        index.insert("CS201", 1u64);
        index.insert("CS201", 2u64);

        assert_eq!(index.len(), 1);
        assert_eq!(index.search("CS201"), Some(&2));
    }

    #[test]
    fn test_update() {
        let mut index = OrderedIndex::new();
        index.insert("a", 1u64);
        assert!(index.update("a", 10));
        assert!(!index.update("b", 20));
        assert_eq!(index.search("a"), Some(&10));
        assert!(!index.contains("b"));
    }

    #[test]
    fn test_pairs_sorted() {
        let mut index = OrderedIndex::new();
        for i in (0..200).rev() {
            index.insert(&key(i), i as u64);
        }
        let pairs = index.pairs();
        assert_eq!(pairs.len(), 200);
        for (i, (k, v)) in pairs.iter().enumerate() {
            assert_eq!(k, &key(i as u32));
            assert_eq!(*v, i as u64);
        }
        assert!(index.height() > 2);
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut index = OrderedIndex::new();
        for i in 0..20 {
            index.insert(&key(i), i as u64);
        }
        let before = index.pairs();
        assert!(!index.remove("nope"));
        assert_eq!(index.pairs(), before);
        assert_eq!(index.len(), 20);
    }

    #[test]
    fn test_remove_from_leaf_and_internal() {
        let mut index = OrderedIndex::new();
        for i in 0..50 {
            index.insert(&key(i), i as u64);
        }

        // Root separators are internal keys; remove every key in turn.
        for i in 0..50 {
            assert!(index.remove(&key(i)), "remove {}", i);
            assert!(!index.contains(&key(i)));
            index.check_invariants().unwrap();
            assert_eq!(index.len(), 49 - i as usize);
        }
        assert!(index.is_empty());
        assert_eq!(index.height(), 1);
    }

    #[test]
    fn test_remove_reverse_order_shrinks_height() {
        let mut index = OrderedIndex::new();
        for i in 0..100 {
            index.insert(&key(i), i as u64);
        }
        let tall = index.height();
        for i in (10..100).rev() {
            assert!(index.remove(&key(i)));
        }
        index.check_invariants().unwrap();
        assert!(index.height() < tall);
        assert_eq!(index.keys(), (0..10).map(key).collect::<Vec<_>>());
    }

    #[test]
    fn test_remove_then_readd() {
        let mut index = OrderedIndex::new();
        index.insert("S1", 1u64);
        index.insert("S2", 2u64);
        assert!(index.remove("S1"));
        index.insert("S1", 3u64);
        assert_eq!(index.search("S1"), Some(&3));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_range() {
        let mut index = OrderedIndex::new();
        for i in 0..100 {
            index.insert(&key(i), i as u64);
        }
        let range = index.range(&key(10), &key(20));
        let keys: Vec<_> = range.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, (10..20).map(key).collect::<Vec<_>>());

        assert!(index.range(&key(20), &key(10)).is_empty());
        assert_eq!(index.range("", "zzz").len(), 100);
    }

    #[test]
    fn test_clear() {
        let mut index = OrderedIndex::new();
        for i in 0..30 {
            index.insert(&key(i), i as u64);
        }
        index.clear();
        assert!(index.is_empty());
        assert!(index.search(&key(3)).is_none());
    }

    #[test]
    fn test_randomized_against_btreemap() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut index = OrderedIndex::new();
        let mut model = BTreeMap::new();

        for step in 0..5000u64 {
            let k = key(rng.random_range(0..400));
            if rng.random_bool(0.6) {
                index.insert(&k, step);
                model.insert(k, step);
            } else {
                let removed = index.remove(&k);
                assert_eq!(removed, model.remove(&k).is_some());
            }
            if step % 250 == 0 {
                index.check_invariants().unwrap();
            }
        }

        index.check_invariants().unwrap();
        let expected: Vec<(String, u64)> = model.into_iter().collect();
        assert_eq!(index.pairs(), expected);
    }
}
