//! Filepath: src/tree.rs
//!
//! `PhTree` - a k-dimensional point index over `u64` keys.
//!
//! The tree is a thin dispatcher over the root node: it checks argument
//! dimensionality, owns the global entry count and the pools, and routes
//! every operation into the recursive node engine. The root always exists,
//! keeps `post_len = 63` / `infix_len = 0`, and is exempt from the
//! minimum-occupancy invariant and from merging.

use crate::distance::PhDistance;
use crate::node::{ComputeOutcome, Node, UpdateInfo};
use crate::pool::Pools;
use crate::query::iter::PhExtent;
use crate::query::knn::PhKnnQuery;
use crate::query::range::PhRangeQuery;
use crate::query::window::PhQuery;
use crate::tracing_helpers::debug_log;

/// Highest supported dimensionality: one hypercube-address bit per
/// dimension must fit a `u64`.
pub const MAX_DIM: usize = 63;

/// A map from k-dimensional `u64` keys to values, backed by a bit-sliced
/// trie with per-node secondary indexes.
///
/// Keys are compared as unsigned integers; use the preprocessors in
/// [`crate::pre`] to map signed or floating-point coordinates into this
/// space first.
///
/// All queries borrow the tree, so the borrow checker rejects mutation
/// while an iterator is alive - the single-writer model is enforced at
/// compile time.
///
/// # Example
///
/// ```rust
/// use phtree::PhTree;
///
/// let mut tree: PhTree<&str> = PhTree::new(2);
/// tree.put(&[0, 0], "a");
/// tree.put(&[1, 1], "b");
///
/// assert_eq!(tree.get(&[0, 0]), Some(&"a"));
/// assert_eq!(tree.query(&[0, 0], &[1, 1]).count(), 2);
/// assert_eq!(tree.remove(&[0, 0]), Some("a"));
/// assert_eq!(tree.size(), 1);
/// ```
pub struct PhTree<V> {
    dim: usize,
    size: usize,
    root: Node<V>,
    pools: Pools<V>,
}

impl<V> PhTree<V> {
    /// Create an empty tree for `dim`-dimensional keys.
    ///
    /// # Panics
    /// Panics if `dim` is 0 or exceeds [`MAX_DIM`].
    #[must_use]
    pub fn new(dim: usize) -> Self {
        assert!(
            (1..=MAX_DIM).contains(&dim),
            "dimensionality {dim} outside 1..={MAX_DIM}"
        );

        Self {
            dim,
            size: 0,
            root: Node::new(dim, 0, 63),
            pools: Pools::new(dim),
        }
    }

    /// Dimensionality of the keys in this tree.
    #[must_use]
    #[inline(always)]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Number of entries.
    #[must_use]
    #[inline(always)]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Check if the tree holds no entries.
    #[must_use]
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The root node, for the query engines.
    #[must_use]
    #[inline(always)]
    pub(crate) const fn root(&self) -> &Node<V> {
        &self.root
    }

    #[inline]
    fn check_key(&self, key: &[u64]) {
        assert_eq!(
            key.len(),
            self.dim,
            "key dimensionality {} does not match tree dimensionality {}",
            key.len(),
            self.dim
        );
    }

    // ========================================================================
    //  Point operations
    // ========================================================================

    /// Insert `key -> value`; returns the previous value if the key was
    /// already present.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn put(&mut self, key: &[u64], value: V) -> Option<V> {
        self.check_key(key);

        let prior: Option<V> = self.root.insert(key, value, &mut self.pools);
        if prior.is_none() {
            self.size += 1;
        }
        prior
    }

    /// Insert only if `key` is absent; returns the current value if it was
    /// already present (the offered value is dropped in that case).
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn put_if_absent(&mut self, key: &[u64], value: V) -> Option<&V> {
        self.check_key(key);

        if self.contains(key) {
            return self.root.get(key);
        }
        let prior: Option<V> = self.root.insert(key, value, &mut self.pools);
        debug_assert!(prior.is_none());
        self.size += 1;
        None
    }

    /// Look up `key`.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    #[must_use]
    pub fn get(&self, key: &[u64]) -> Option<&V> {
        self.check_key(key);

        self.root.get(key)
    }

    /// Check if `key` is present.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    #[must_use]
    pub fn contains(&self, key: &[u64]) -> bool {
        self.get(key).is_some()
    }

    /// Remove `key`; returns the removed value.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn remove(&mut self, key: &[u64]) -> Option<V> {
        self.check_key(key);

        let removed: Option<V> = self.root.remove(key, None, &mut self.pools);
        if removed.is_some() {
            self.size -= 1;
        }
        removed
    }

    /// Remove `key` only if it currently maps to `value`.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn remove_if_value(&mut self, key: &[u64], value: &V) -> bool
    where
        V: PartialEq,
    {
        if self.get(key) == Some(value) {
            self.remove(key);
            true
        } else {
            false
        }
    }

    /// Replace the value of an existing key; a missing key is left absent
    /// and the offered value is dropped.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn replace(&mut self, key: &[u64], value: V) -> Option<V> {
        self.check_key(key);

        self.root
            .get_mut(key)
            .map(|slot| std::mem::replace(slot, value))
    }

    /// Replace the value of `key` only if it currently equals `old`.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn replace_if_value(&mut self, key: &[u64], old: &V, new: V) -> bool
    where
        V: PartialEq,
    {
        self.check_key(key);

        match self.root.get_mut(key) {
            Some(slot) if *slot == *old => {
                *slot = new;
                true
            }
            _ => false,
        }
    }

    /// Move the entry at `old_key` to `new_key`; returns the value now
    /// stored at `new_key`, or None if `old_key` was absent.
    ///
    /// When both keys fall into the same node and differ only below its
    /// post bit, the stored key is swapped in place; otherwise the entry
    /// is removed and re-inserted from the root. An existing entry at
    /// `new_key` is replaced in the latter case.
    ///
    /// # Panics
    /// Panics if either key does not match the tree dimensionality.
    pub fn update(&mut self, old_key: &[u64], new_key: &[u64]) -> Option<&V> {
        self.check_key(old_key);
        self.check_key(new_key);

        let mut info = UpdateInfo::new(self.pools.key_buf(new_key));
        let removed: Option<V> = self.root.remove(old_key, Some(&mut info), &mut self.pools);
        let UpdateInfo {
            new_key: key_buf,
            insert_required,
            swapped,
        } = info;
        self.pools.offer_key(key_buf);

        match removed {
            Some(value) => {
                debug_assert!(insert_required);
                debug_log!("tree: update re-inserts from the root");

                self.size -= 1;
                let prior: Option<V> = self.root.insert(new_key, value, &mut self.pools);
                if prior.is_none() {
                    self.size += 1;
                }
                self.root.get(new_key)
            }
            None if swapped => self.root.get(new_key),
            None => None,
        }
    }

    // ========================================================================
    //  Compute operations
    // ========================================================================

    /// Unified update: `f` sees the current value (or None) and returns
    /// the new value (or None to remove). Returns the value now stored at
    /// `key`.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn compute<F>(&mut self, key: &[u64], f: F) -> Option<&V>
    where
        F: FnOnce(&[u64], Option<&V>) -> Option<V>,
    {
        self.check_key(key);

        match self.root.compute(key, true, f, &mut self.pools) {
            ComputeOutcome::Inserted => self.size += 1,
            ComputeOutcome::Removed => self.size -= 1,
            ComputeOutcome::Unchanged | ComputeOutcome::Replaced => {}
        }
        self.root.get(key)
    }

    /// Insert the value produced by `f` if `key` is absent; returns the
    /// value stored at `key` afterwards.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn compute_if_absent<F>(&mut self, key: &[u64], f: F) -> Option<&V>
    where
        F: FnOnce(&[u64]) -> Option<V>,
    {
        self.check_key(key);

        if self.contains(key) {
            return self.root.get(key);
        }
        let outcome: ComputeOutcome = self.root.compute(key, true, |k, _| f(k), &mut self.pools);
        if matches!(outcome, ComputeOutcome::Inserted) {
            self.size += 1;
        }
        self.root.get(key)
    }

    /// Re-map the value of an existing key; `f` returning None removes
    /// the entry. Returns the value stored at `key` afterwards.
    ///
    /// # Panics
    /// Panics if `key` does not match the tree dimensionality.
    pub fn compute_if_present<F>(&mut self, key: &[u64], f: F) -> Option<&V>
    where
        F: FnOnce(&[u64], &V) -> Option<V>,
    {
        self.check_key(key);

        let outcome: ComputeOutcome = self.root.compute(
            key,
            false,
            |k, current| current.and_then(|v| f(k, v)),
            &mut self.pools,
        );
        if matches!(outcome, ComputeOutcome::Removed) {
            self.size -= 1;
        }
        self.root.get(key)
    }

    /// Remove all entries, recycling nodes and key buffers through the
    /// pools.
    pub fn clear(&mut self) {
        self.root.clear_into(&mut self.pools);
        self.size = 0;
    }

    // ========================================================================
    //  Queries
    // ========================================================================

    /// Iterate all entries.
    #[must_use]
    pub fn iterator(&self) -> PhExtent<'_, V> {
        PhExtent::new(self)
    }

    /// Iterate the entries inside `[min, max]` (inclusive,
    /// component-wise).
    ///
    /// # Panics
    /// Panics if `min` or `max` do not match the tree dimensionality.
    #[must_use]
    pub fn query(&self, min: &[u64], max: &[u64]) -> PhQuery<'_, V> {
        PhQuery::new(self, min, max)
    }

    /// The `k` entries nearest to `center` under `dist`, plus any entries
    /// tied with the k-th distance.
    ///
    /// # Panics
    /// Panics if `center` does not match the tree dimensionality.
    #[must_use]
    pub fn nearest_neighbor<D>(&self, k: usize, dist: &D, center: &[u64]) -> PhKnnQuery<'_, V>
    where
        D: PhDistance + ?Sized,
    {
        PhKnnQuery::new(self, k, dist, center)
    }

    /// All entries within `radius` of `center` under `dist`.
    ///
    /// # Panics
    /// Panics if `center` does not match the tree dimensionality.
    #[must_use]
    pub fn range_query<D>(&self, radius: f64, dist: D, center: &[u64]) -> PhRangeQuery<'_, V, D>
    where
        D: PhDistance,
    {
        PhRangeQuery::new(self, radius, dist, center)
    }
}

impl<V> std::fmt::Debug for PhTree<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhTree")
            .field("dim", &self.dim)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
