//! Filepath: src/query/knn.rs
//!
//! k-nearest-neighbor search.
//!
//! Best-first traversal: a min-heap frontier of nodes ordered by the
//! lower-bound distance from the query center to the node's region, and a
//! distance-sorted candidate list of logical capacity k. A popped node is
//! scanned once; terminal entries update the candidate list, subnodes are
//! pushed when their bound is still competitive. The search stops when
//! the closest unvisited region lies strictly beyond the current k-th
//! distance, so regions tied with the k-th candidate are still visited
//! and the result keeps every entry whose distance equals the k-th
//! smallest.
//!
//! Results are materialized eagerly and drained through `Iterator`.

use std::collections::BinaryHeap;

use crate::distance::PhDistance;
use crate::entry::NodeValue;
use crate::index::iter::IndexIter;
use crate::node::Node;
use crate::tree::PhTree;

/// A frontier node with its lower-bound distance to the query center.
struct FrontierEntry<'a, V> {
    bound: f64,
    node: &'a Node<V>,
}

impl<V> PartialEq for FrontierEntry<'_, V> {
    fn eq(&self, other: &Self) -> bool {
        self.bound.total_cmp(&other.bound).is_eq()
    }
}

impl<V> Eq for FrontierEntry<'_, V> {}

impl<V> PartialOrd for FrontierEntry<'_, V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<V> Ord for FrontierEntry<'_, V> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // reversed: BinaryHeap is a max-heap, the frontier needs min-first
        other.bound.total_cmp(&self.bound)
    }
}

/// Iterator over the k entries nearest to a center point.
///
/// Yields `(distance, key, value)` in non-decreasing distance order. More
/// than k entries are returned when several tie on the k-th distance.
///
/// # Example
///
/// ```rust
/// use phtree::{PhDistanceL2, PhTree};
///
/// let mut tree: PhTree<&str> = PhTree::new(2);
/// tree.put(&[0, 0], "origin");
/// tree.put(&[10, 10], "far");
///
/// let nearest: Vec<&str> = tree
///     .nearest_neighbor(1, &PhDistanceL2, &[1, 1])
///     .map(|(_, _, v)| *v)
///     .collect();
/// assert_eq!(nearest, vec!["origin"]);
/// ```
pub struct PhKnnQuery<'a, V> {
    results: Vec<(f64, &'a [u64], &'a V)>,
    pos: usize,
}

impl<'a, V> PhKnnQuery<'a, V> {
    /// Run a k-NN search on `tree` around `center`.
    ///
    /// # Panics
    /// Panics if `center` does not match the tree dimensionality.
    #[must_use]
    pub fn new<D>(tree: &'a PhTree<V>, k: usize, dist: &D, center: &[u64]) -> Self
    where
        D: PhDistance + ?Sized,
    {
        let mut query = Self {
            results: Vec::new(),
            pos: 0,
        };
        query.reset(tree, k, dist, center);
        query
    }

    /// Re-run the search with new parameters, reusing the result buffer.
    ///
    /// # Panics
    /// Panics if `center` does not match the tree dimensionality.
    pub fn reset<D>(&mut self, tree: &'a PhTree<V>, k: usize, dist: &D, center: &[u64])
    where
        D: PhDistance + ?Sized,
    {
        assert_eq!(
            center.len(),
            tree.dim(),
            "center has wrong dimensionality"
        );

        self.results.clear();
        self.pos = 0;
        if k > 0 && tree.size() > 0 {
            self.search(tree, k, dist, center);
        }
    }

    /// Distance of the current k-th candidate, the search's pruning bound.
    fn kth_dist(&self, k: usize) -> f64 {
        if self.results.len() < k {
            f64::INFINITY
        } else {
            self.results.get(k - 1).map_or(f64::INFINITY, |r| r.0)
        }
    }

    /// Insert a candidate in distance order and trim entries that fell
    /// strictly behind the k-th distance; ties with it survive.
    fn offer(&mut self, k: usize, candidate: (f64, &'a [u64], &'a V)) {
        let pos: usize = self
            .results
            .partition_point(|r| r.0.total_cmp(&candidate.0).is_le());
        self.results.insert(pos, candidate);

        let kth: f64 = self.kth_dist(k);
        while self.results.len() > k {
            match self.results.last() {
                Some(last) if last.0 > kth => {
                    self.results.pop();
                }
                _ => break,
            }
        }
    }

    fn search<D>(&mut self, tree: &'a PhTree<V>, k: usize, dist: &D, center: &[u64])
    where
        D: PhDistance + ?Sized,
    {
        let mut frontier: BinaryHeap<FrontierEntry<'a, V>> = BinaryHeap::new();
        frontier.push(FrontierEntry {
            bound: 0.0,
            node: tree.root(),
        });

        while let Some(FrontierEntry { bound, node }) = frontier.pop() {
            if self.results.len() >= k && bound > self.kth_dist(k) {
                break;
            }

            let mut cursor: IndexIter<'a, V> = IndexIter::all(node.index());
            while let Some(entry) = cursor.next_entry() {
                match entry.value() {
                    NodeValue::Node(sub) => {
                        let sub_bound: f64 =
                            dist.min_dist_to_region(center, entry.kd_key(), sub.post_len());
                        if sub_bound <= self.kth_dist(k) {
                            frontier.push(FrontierEntry {
                                bound: sub_bound,
                                node: sub.as_ref(),
                            });
                        }
                    }
                    NodeValue::Value(v) => {
                        let d: f64 = dist.dist(center, entry.kd_key());
                        if d <= self.kth_dist(k) {
                            self.offer(k, (d, entry.kd_key(), v));
                        }
                    }
                }
            }
        }
    }
}

impl<'a, V> Iterator for PhKnnQuery<'a, V> {
    type Item = (f64, &'a [u64], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.results.get(self.pos).copied()?;
        self.pos += 1;
        Some(item)
    }
}
