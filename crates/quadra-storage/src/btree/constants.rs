//! B-tree sizing constants.

/// Branching factor: maximum number of children per internal node.
pub const ORDER: usize = 5;

/// Maximum keys per node.
pub const MAX_KEYS: usize = ORDER - 1;

/// Minimum keys per non-root node.
///
/// A top-down split of a full node leaves halves of 1 and 2 keys, so the
/// floor is `ORDER / 2 - 1`.
pub const MIN_KEYS: usize = ORDER / 2 - 1;

/// A child must hold at least this many keys before removal descends into it.
pub(crate) const MIN_DEGREE: usize = MIN_KEYS + 1;

/// Index of the promoted median when splitting a full node.
pub(crate) const SPLIT_MEDIAN: usize = MIN_KEYS;
