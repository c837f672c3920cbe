//! Filepath: src/query/mod.rs
//!
//! Iterative query engines.
//!
//! All engines are explicit state machines driven by the caller through
//! `Iterator::next`; they keep a stack of per-node index cursors instead
//! of parent pointers, visit entries in hypercube-address order, and can
//! be `reset` for another run without reallocating. They borrow the tree,
//! so the borrow checker statically rules out mutation while a query is
//! live.

pub mod iter;
pub mod knn;
pub mod range;
pub mod window;

/// Optional key predicate honored by the window engine.
///
/// Implemented for plain closures, so
/// `query.with_filter(&|key: &[u64]| key[0] % 2 == 0)` works directly.
pub trait PhFilter {
    /// Accept or reject a candidate key.
    fn accept(&self, key: &[u64]) -> bool;
}

impl<F> PhFilter for F
where
    F: Fn(&[u64]) -> bool,
{
    #[inline]
    fn accept(&self, key: &[u64]) -> bool {
        self(key)
    }
}
