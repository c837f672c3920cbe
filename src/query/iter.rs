//! Filepath: src/query/iter.rs
//!
//! Full-extent iterator: every entry of the tree, depth first, in
//! hypercube-address order per node.

use crate::entry::NodeValue;
use crate::index::iter::IndexIter;
use crate::tree::PhTree;

/// Iterator over all entries of a tree.
///
/// # Example
///
/// ```rust
/// use phtree::PhTree;
///
/// let mut tree: PhTree<u32> = PhTree::new(2);
/// tree.put(&[1, 2], 12);
/// tree.put(&[3, 4], 34);
///
/// let mut seen: Vec<u32> = tree.iterator().map(|(_, v)| *v).collect();
/// seen.sort_unstable();
/// assert_eq!(seen, vec![12, 34]);
/// ```
pub struct PhExtent<'a, V> {
    stack: Vec<IndexIter<'a, V>>,
}

impl<'a, V> PhExtent<'a, V> {
    /// Start a full iteration over `tree`.
    #[must_use]
    pub fn new(tree: &'a PhTree<V>) -> Self {
        let mut extent = Self { stack: Vec::new() };
        extent.stack.push(IndexIter::all(tree.root().index()));
        extent
    }

    /// Rewind to the beginning, reusing the stack allocation.
    pub fn reset(&mut self, tree: &'a PhTree<V>) {
        self.stack.clear();
        self.stack.push(IndexIter::all(tree.root().index()));
    }
}

impl<'a, V> Iterator for PhExtent<'a, V> {
    type Item = (&'a [u64], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let cursor: &mut IndexIter<'a, V> = self.stack.last_mut()?;
            match cursor.next_entry() {
                None => {
                    self.stack.pop();
                }
                Some(entry) => match entry.value() {
                    NodeValue::Node(sub) => {
                        self.stack.push(IndexIter::all(sub.index()));
                    }
                    NodeValue::Value(v) => return Some((entry.kd_key(), v)),
                },
            }
        }
    }
}
