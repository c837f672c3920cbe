//! Filepath: src/query/range.rs
//!
//! Distance range query: all entries within radius `r` of a center.
//!
//! A window query over the axis-aligned bounding box of the ball does the
//! tree traversal; an exact distance check post-filters the corners the
//! box admits but the ball does not.

use crate::distance::PhDistance;
use crate::query::window::PhQuery;
use crate::tree::PhTree;

/// Iterator over all entries with `dist(center, key) <= radius`.
///
/// # Example
///
/// ```rust
/// use phtree::{PhDistanceL2, PhTree};
///
/// let mut tree: PhTree<&str> = PhTree::new(2);
/// tree.put(&[0, 0], "in");
/// tree.put(&[3, 3], "out");
///
/// let hits: Vec<&str> = tree
///     .range_query(2.0, PhDistanceL2, &[0, 0])
///     .map(|(_, v)| *v)
///     .collect();
/// assert_eq!(hits, vec!["in"]);
/// ```
pub struct PhRangeQuery<'a, V, D> {
    window: PhQuery<'a, V>,
    dist: D,
    center: Vec<u64>,
    radius: f64,
}

impl<'a, V, D> PhRangeQuery<'a, V, D>
where
    D: PhDistance,
{
    /// Start a range query over `tree`.
    ///
    /// # Panics
    /// Panics if `center` does not match the tree dimensionality.
    #[must_use]
    pub fn new(tree: &'a PhTree<V>, radius: f64, dist: D, center: &[u64]) -> Self {
        assert_eq!(
            center.len(),
            tree.dim(),
            "center has wrong dimensionality"
        );

        let mut min: Vec<u64> = vec![0; center.len()];
        let mut max: Vec<u64> = vec![0; center.len()];
        dist.to_mbb(radius, center, &mut min, &mut max);

        Self {
            window: PhQuery::new(tree, &min, &max),
            dist,
            center: center.to_vec(),
            radius,
        }
    }

    /// Rewind for a new ball, reusing the window's stack allocation.
    ///
    /// # Panics
    /// Panics if `center` does not match the tree dimensionality.
    pub fn reset(&mut self, radius: f64, center: &[u64]) {
        assert_eq!(
            center.len(),
            self.center.len(),
            "center has wrong dimensionality"
        );

        self.center.copy_from_slice(center);
        self.radius = radius;

        let mut min: Vec<u64> = vec![0; center.len()];
        let mut max: Vec<u64> = vec![0; center.len()];
        self.dist.to_mbb(radius, center, &mut min, &mut max);
        self.window.reset(&min, &max);
    }
}

impl<'a, V, D> Iterator for PhRangeQuery<'a, V, D>
where
    D: PhDistance,
{
    type Item = (&'a [u64], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value) = self.window.next()?;
            if self.dist.dist(&self.center, key) <= self.radius {
                return Some((key, value));
            }
        }
    }
}
