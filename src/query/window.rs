//! Filepath: src/query/window.rs
//!
//! Rectangular window query.
//!
//! The engine descends the tree with one masked index cursor per level.
//! At each node it derives the pair of limit masks that bound the
//! hypercube addresses any matching key can have, from the node's
//! bisection in every dimension: the point where the quadrant with bit 0
//! ends and the quadrant with bit 1 begins. Keys are stored in the
//! monotone `u64` space, so a plain unsigned comparison against the
//! bisection is correct at every level, including the root.
//!
//! Subnode entries are pruned by their infix carrier: the carrier's bits
//! down to the subnode's span must fall inside the window. Terminal
//! entries are checked exactly, component-wise.

use crate::bits::{key_in_range, mask_above};
use crate::entry::NodeValue;
use crate::index::iter::IndexIter;
use crate::node::Node;
use crate::query::PhFilter;
use crate::tree::PhTree;

/// One stack level: a node's post length and its masked cursor.
struct WindowLevel<'a, V> {
    post_len: u8,
    iter: IndexIter<'a, V>,
}

/// Iterator over all entries inside `[min, max]` (inclusive,
/// component-wise).
///
/// # Example
///
/// ```rust
/// use phtree::PhTree;
///
/// let mut tree: PhTree<&str> = PhTree::new(2);
/// tree.put(&[0, 0], "a");
/// tree.put(&[1, 1], "b");
/// tree.put(&[9, 9], "c");
///
/// let hits: Vec<&str> = tree.query(&[0, 0], &[1, 1]).map(|(_, v)| *v).collect();
/// assert_eq!(hits.len(), 2);
/// ```
pub struct PhQuery<'a, V> {
    root: &'a Node<V>,
    min: Vec<u64>,
    max: Vec<u64>,
    stack: Vec<WindowLevel<'a, V>>,
    filter: Option<&'a dyn PhFilter>,
}

impl<'a, V> PhQuery<'a, V> {
    /// Start a window query over `tree`.
    ///
    /// # Panics
    /// Panics if `min` or `max` do not match the tree dimensionality.
    #[must_use]
    pub fn new(tree: &'a PhTree<V>, min: &[u64], max: &[u64]) -> Self {
        assert_eq!(min.len(), tree.dim(), "window min has wrong dimensionality");
        assert_eq!(max.len(), tree.dim(), "window max has wrong dimensionality");

        let mut query = Self {
            root: tree.root(),
            min: min.to_vec(),
            max: max.to_vec(),
            stack: Vec::new(),
            filter: None,
        };
        query.push_node(query.root, None);
        query
    }

    /// Attach a key predicate; entries it rejects are not yielded.
    #[must_use]
    pub fn with_filter(mut self, filter: &'a dyn PhFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Rewind for a new window, reusing the stack allocation.
    ///
    /// # Panics
    /// Panics if `min` or `max` do not match the tree dimensionality.
    pub fn reset(&mut self, min: &[u64], max: &[u64]) {
        assert_eq!(min.len(), self.min.len(), "window min has wrong dimensionality");
        assert_eq!(max.len(), self.max.len(), "window max has wrong dimensionality");

        self.min.copy_from_slice(min);
        self.max.copy_from_slice(max);
        self.stack.clear();
        let root: &'a Node<V> = self.root;
        self.push_node(root, None);
    }

    /// Enter `node`, computing its limit masks from the window.
    ///
    /// `prefix` is the infix carrier of the entry that leads to `node`
    /// (None for the root; only bits above the node's post length are
    /// read, which the carrier shares with every key below the node).
    fn push_node(&mut self, node: &'a Node<V>, prefix: Option<&[u64]>) {
        let post_len: u8 = node.post_len();
        let bit: u64 = 1u64 << post_len;
        let upper_mask: u64 = mask_above(post_len);

        let mut lower_limit: u64 = 0;
        let mut upper_limit: u64 = 0;
        for (d, (lo, hi)) in self.min.iter().zip(self.max.iter()).enumerate() {
            let pref: u64 = prefix.and_then(|p| p.get(d)).copied().unwrap_or(0);
            let bisection: u64 = (pref | bit) & upper_mask;
            if *lo >= bisection {
                lower_limit |= 1u64 << d;
            }
            if *hi >= bisection {
                upper_limit |= 1u64 << d;
            }
        }

        self.stack.push(WindowLevel {
            post_len,
            iter: IndexIter::masked(node.index(), lower_limit, upper_limit),
        });
    }

    /// Infix pruning: can any key below this subnode entry fall inside the
    /// window?
    ///
    /// The carrier's bits above the subnode's span are compared against the
    /// window with the low, still-undetermined bits masked away. Bits the
    /// ancestors already fixed pass trivially, so the mask runs from the
    /// top down to just above the subnode's own post bit.
    fn check_prefix(
        parent_post_len: u8,
        sub_infix_len: u8,
        kd_key: &[u64],
        min: &[u64],
        max: &[u64],
    ) -> bool {
        if sub_infix_len == 0 {
            return true;
        }

        let comp_mask: u64 = mask_above(parent_post_len + 1 - sub_infix_len);
        for (k, (lo, hi)) in kd_key.iter().zip(min.iter().zip(max.iter())) {
            let masked: u64 = k & comp_mask;
            if masked > *hi || masked < (lo & comp_mask) {
                return false;
            }
        }
        true
    }
}

impl<'a, V> Iterator for PhQuery<'a, V> {
    type Item = (&'a [u64], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level: &mut WindowLevel<'a, V> = self.stack.last_mut()?;
            let post_len: u8 = level.post_len;

            match level.iter.next_entry() {
                None => {
                    self.stack.pop();
                }
                Some(entry) => match entry.value() {
                    NodeValue::Node(sub) => {
                        if Self::check_prefix(
                            post_len,
                            sub.infix_len(),
                            entry.kd_key(),
                            &self.min,
                            &self.max,
                        ) {
                            self.push_node(sub, Some(entry.kd_key()));
                        }
                    }
                    NodeValue::Value(v) => {
                        if key_in_range(entry.kd_key(), &self.min, &self.max)
                            && self.filter.map_or(true, |f| f.accept(entry.kd_key()))
                        {
                            return Some((entry.kd_key(), v));
                        }
                    }
                },
            }
        }
    }
}
