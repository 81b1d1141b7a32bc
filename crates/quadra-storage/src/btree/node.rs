//! B-tree node and its structural operations.
//!
//! Nodes own their children directly. A node is a leaf iff it has no children.
//! Internal nodes always hold `keys.len() + 1` children.

use super::constants::{MAX_KEYS, MIN_DEGREE, SPLIT_MEDIAN};

#[derive(Debug, Clone)]
pub(crate) struct Node<V> {
    pub(crate) keys: Vec<String>,
    pub(crate) values: Vec<V>,
    pub(crate) children: Vec<Node<V>>,
}

impl<V: Clone> Node<V> {
    pub(crate) fn leaf() -> Self {
        Self {
            keys: Vec::with_capacity(MAX_KEYS),
            values: Vec::with_capacity(MAX_KEYS),
            children: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.keys.len() >= MAX_KEYS
    }

    /// Returns `Ok(i)` if `key` is at position `i`, else `Err(i)` with the
    /// child index to descend into.
    #[inline]
    pub(crate) fn find(&self, key: &str) -> Result<usize, usize> {
        self.keys.binary_search_by(|k| k.as_str().cmp(key))
    }

    /// Splits the full child at `i`, promoting its median into this node.
    ///
    /// The left half keeps the keys before the median and stays at `i`.
    /// The right half is inserted at `i + 1`.
    pub(crate) fn split_child(&mut self, i: usize) {
        let child = &mut self.children[i];
        let right_keys = child.keys.split_off(SPLIT_MEDIAN + 1);
        let right_values = child.values.split_off(SPLIT_MEDIAN + 1);
        let right_children = if child.is_leaf() {
            Vec::new()
        } else {
            child.children.split_off(SPLIT_MEDIAN + 1)
        };
        let (Some(median_key), Some(median_value)) = (child.keys.pop(), child.values.pop()) else {
            return;
        };

        self.keys.insert(i, median_key);
        self.values.insert(i, median_value);
        self.children.insert(
            i + 1,
            Node {
                keys: right_keys,
                values: right_values,
                children: right_children,
            },
        );
    }

    /// Merges child `i + 1` and separator `i` into child `i`.
    pub(crate) fn merge_children(&mut self, i: usize) {
        let mut right = self.children.remove(i + 1);
        let sep_key = self.keys.remove(i);
        let sep_value = self.values.remove(i);

        let left = &mut self.children[i];
        left.keys.push(sep_key);
        left.values.push(sep_value);
        left.keys.append(&mut right.keys);
        left.values.append(&mut right.values);
        left.children.append(&mut right.children);
    }

    /// Rotates the last entry of child `i - 1` up through separator `i - 1`
    /// into the front of child `i`.
    pub(crate) fn borrow_from_prev(&mut self, i: usize) {
        let (head, tail) = self.children.split_at_mut(i);
        let sibling = &mut head[i - 1];
        let child = &mut tail[0];

        let (Some(up_key), Some(up_value)) = (sibling.keys.pop(), sibling.values.pop()) else {
            return;
        };
        let down_key = std::mem::replace(&mut self.keys[i - 1], up_key);
        let down_value = std::mem::replace(&mut self.values[i - 1], up_value);
        child.keys.insert(0, down_key);
        child.values.insert(0, down_value);

        if let Some(moved) = sibling.children.pop() {
            child.children.insert(0, moved);
        }
    }

    /// Rotates the first entry of child `i + 1` up through separator `i`
    /// onto the end of child `i`.
    pub(crate) fn borrow_from_next(&mut self, i: usize) {
        let (head, tail) = self.children.split_at_mut(i + 1);
        let child = &mut head[i];
        let sibling = &mut tail[0];

        let up_key = sibling.keys.remove(0);
        let up_value = sibling.values.remove(0);
        let down_key = std::mem::replace(&mut self.keys[i], up_key);
        let down_value = std::mem::replace(&mut self.values[i], up_value);
        child.keys.push(down_key);
        child.values.push(down_value);

        if !sibling.is_leaf() {
            let moved = sibling.children.remove(0);
            child.children.push(moved);
        }
    }

    /// Ensures child `i` holds at least `MIN_DEGREE` keys, borrowing or
    /// merging as needed. Returns the index of the child that now covers the
    /// original child's key range.
    pub(crate) fn fill_child(&mut self, i: usize) -> usize {
        if self.children[i].keys.len() >= MIN_DEGREE {
            return i;
        }
        if i > 0 && self.children[i - 1].keys.len() >= MIN_DEGREE {
            self.borrow_from_prev(i);
            i
        } else if i < self.keys.len() && self.children[i + 1].keys.len() >= MIN_DEGREE {
            self.borrow_from_next(i);
            i
        } else if i < self.keys.len() {
            self.merge_children(i);
            i
        } else {
            self.merge_children(i - 1);
            i - 1
        }
    }

    /// Rightmost entry in this subtree.
    pub(crate) fn max_entry(&self) -> Option<(String, V)> {
        let mut node = self;
        while let Some(last) = node.children.last() {
            node = last;
        }
        let key = node.keys.last()?;
        let value = node.values.last()?;
        Some((key.clone(), value.clone()))
    }

    /// Leftmost entry in this subtree.
    pub(crate) fn min_entry(&self) -> Option<(String, V)> {
        let mut node = self;
        while let Some(first) = node.children.first() {
            node = first;
        }
        let key = node.keys.first()?;
        let value = node.values.first()?;
        Some((key.clone(), value.clone()))
    }

    /// Removes `key` from this subtree. The caller guarantees this node holds
    /// at least `MIN_DEGREE` keys unless it is the root.
    pub(crate) fn remove(&mut self, key: &str) -> bool {
        match self.find(key) {
            Ok(i) if self.is_leaf() => {
                self.keys.remove(i);
                self.values.remove(i);
                true
            }
            Ok(i) => {
                if self.children[i].keys.len() >= MIN_DEGREE {
                    let Some((pred_key, pred_value)) = self.children[i].max_entry() else {
                        return false;
                    };
                    self.children[i].remove(&pred_key);
                    self.keys[i] = pred_key;
                    self.values[i] = pred_value;
                    true
                } else if self.children[i + 1].keys.len() >= MIN_DEGREE {
                    let Some((succ_key, succ_value)) = self.children[i + 1].min_entry() else {
                        return false;
                    };
                    self.children[i + 1].remove(&succ_key);
                    self.keys[i] = succ_key;
                    self.values[i] = succ_value;
                    true
                } else {
                    self.merge_children(i);
                    self.children[i].remove(key)
                }
            }
            Err(_) if self.is_leaf() => false,
            Err(i) => {
                let i = self.fill_child(i);
                self.children[i].remove(key)
            }
        }
    }

    pub(crate) fn collect_in_order(&self, out: &mut Vec<(String, V)>) {
        for (i, (k, v)) in self.keys.iter().zip(self.values.iter()).enumerate() {
            if let Some(child) = self.children.get(i) {
                child.collect_in_order(out);
            }
            out.push((k.clone(), v.clone()));
        }
        if let Some(last) = self.children.get(self.keys.len()) {
            last.collect_in_order(out);
        }
    }

    /// In-order walk restricted to keys in `[start, end)`.
    pub(crate) fn collect_range(&self, start: &str, end: &str, out: &mut Vec<(String, V)>) {
        let first = match self.find(start) {
            Ok(i) | Err(i) => i,
        };
        for i in first..=self.keys.len() {
            if let Some(child) = self.children.get(i) {
                child.collect_range(start, end, out);
            }
            let Some(k) = self.keys.get(i) else {
                break;
            };
            if k.as_str() >= end {
                break;
            }
            if k.as_str() >= start {
                out.push((k.clone(), self.values[i].clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_with(keys: &[&str]) -> Node<u64> {
        let mut node = Node::leaf();
        for (i, k) in keys.iter().enumerate() {
            node.keys.push(k.to_string());
            node.values.push(i as u64);
        }
        node
    }

    #[test]
    fn test_split_child_promotes_median() {
        let mut parent: Node<u64> = Node::leaf();
        parent.children.push(leaf_with(&["a", "b", "c", "d"]));
        parent.split_child(0);

        assert_eq!(parent.keys, vec!["b"]);
        assert_eq!(parent.children.len(), 2);
        assert_eq!(parent.children[0].keys, vec!["a"]);
        assert_eq!(parent.children[1].keys, vec!["c", "d"]);
        assert_eq!(parent.values, vec![1]);
    }

    #[test]
    fn test_merge_children() {
        let mut parent: Node<u64> = Node::leaf();
        parent.keys.push("m".to_string());
        parent.values.push(99);
        parent.children.push(leaf_with(&["a"]));
        parent.children.push(leaf_with(&["x"]));

        parent.merge_children(0);
        assert!(parent.keys.is_empty());
        assert_eq!(parent.children.len(), 1);
        assert_eq!(parent.children[0].keys, vec!["a", "m", "x"]);
        assert_eq!(parent.children[0].values, vec![0, 99, 0]);
    }

    #[test]
    fn test_borrow_from_prev_and_next() {
        let mut parent: Node<u64> = Node::leaf();
        parent.keys.push("m".to_string());
        parent.values.push(7);
        parent.children.push(leaf_with(&["a", "b", "c"]));
        parent.children.push(leaf_with(&["x"]));

        parent.borrow_from_prev(1);
        assert_eq!(parent.keys, vec!["c"]);
        assert_eq!(parent.children[0].keys, vec!["a", "b"]);
        assert_eq!(parent.children[1].keys, vec!["m", "x"]);

        parent.borrow_from_next(0);
        assert_eq!(parent.keys, vec!["m"]);
        assert_eq!(parent.children[0].keys, vec!["a", "b", "c"]);
        assert_eq!(parent.children[1].keys, vec!["x"]);
    }

    #[test]
    fn test_find_positions() {
        let node = leaf_with(&["b", "d"]);
        assert_eq!(node.find("b"), Ok(0));
        assert_eq!(node.find("a"), Err(0));
        assert_eq!(node.find("c"), Err(1));
        assert_eq!(node.find("e"), Err(2));
    }
}
