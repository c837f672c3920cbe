//! Filepath: src/lib.rs
//!
//! # PH-tree
//!
//! A k-dimensional point index: a bit-sliced trie over `u64` keys with
//! per-node secondary indexes.
//!
//! Every node discriminates one bit position of all k dimensions at once;
//! the k extracted bits form a *hypercube address* that selects the child
//! within the node. Runs of bits shared by all keys below a node (the
//! *infix*) are skipped and stored implicitly in the parent entry, so tree
//! depth follows key diversity, not key length.
//!
//! ## Design
//!
//! - Keys are k-tuples of `u64` in a monotone bit ordering; the
//!   preprocessors in [`pre`] map signed integers and IEEE-754 doubles
//!   into that space reversibly.
//! - Each node keeps its children in a small ordered map from hypercube
//!   address to entry, with three interchangeable layouts: a sorted leaf
//!   page, a direct-addressed table for small dense nodes, and a B+-tree
//!   of pages for high dimension counts.
//! - Inserting a conflicting key splits at the most significant differing
//!   bit; removals that leave a node with one entry merge it back into
//!   the parent. Nodes and key buffers recycle through per-tree pools.
//! - Queries (full iteration, rectangular windows, k-nearest-neighbor,
//!   distance ranges) are caller-driven state machines holding an explicit
//!   stack of index cursors; they borrow the tree, so mutation during
//!   iteration is a compile error.
//!
//! ## Example
//!
//! ```rust
//! use phtree::{PhDistanceL2, PhTree};
//!
//! let mut tree: PhTree<&str> = PhTree::new(2);
//! tree.put(&[1, 1], "a");
//! tree.put(&[2, 5], "b");
//! tree.put(&[9, 9], "c");
//!
//! // window query
//! let in_window: Vec<&str> = tree.query(&[0, 0], &[5, 5]).map(|(_, v)| *v).collect();
//! assert_eq!(in_window.len(), 2);
//!
//! // nearest neighbor
//! let (_, _, nearest) = tree.nearest_neighbor(1, &PhDistanceL2, &[8, 8]).next().unwrap();
//! assert_eq!(*nearest, "c");
//! ```

pub mod bits;
pub mod distance;
pub mod pre;
pub mod query;
pub mod tree;

mod entry;
mod index;
mod node;
mod pool;
mod tracing_helpers;

pub use distance::{PhDistance, PhDistanceL1, PhDistanceL2};
pub use pre::{IeeePreprocessor, IntegerPreprocessor};
pub use query::iter::PhExtent;
pub use query::knn::PhKnnQuery;
pub use query::range::PhRangeQuery;
pub use query::window::PhQuery;
pub use query::PhFilter;
pub use tree::{PhTree, MAX_DIM};
