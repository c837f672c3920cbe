//! Filepath: src/pool.rs
//!
//! Per-tree recyclers for nodes and key buffers.
//!
//! Split and merge churn allocates nodes and k-sized key buffers at a high
//! rate; both are recycled here instead of round-tripping through the
//! allocator. The pools are owned by one tree and items offered to them
//! must not be referenced by anyone else afterwards.
//!
//! Contract: `get_*` returns a usable instance (a node is re-initialized,
//! a key buffer is overwritten in full); `offer_*` transfers ownership to
//! the pool. Offered nodes must already be empty — the engine only
//! discards nodes whose entries were drained or hoisted.

use crate::node::Node;

/// Upper bound per pool; beyond this, offered items are dropped.
const MAX_POOLED: usize = 128;

/// Node and key-buffer pools of a single tree.
pub(crate) struct Pools<V> {
    dim: usize,
    nodes: Vec<Box<Node<V>>>,
    keys: Vec<Vec<u64>>,
}

impl<V> Pools<V> {
    /// Create empty pools for a `dim`-dimensional tree.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            nodes: Vec::new(),
            keys: Vec::new(),
        }
    }

    /// Tree dimensionality; every pooled key buffer has this length.
    #[must_use]
    #[inline(always)]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// A key buffer holding a copy of `key`.
    #[must_use]
    pub fn key_buf(&mut self, key: &[u64]) -> Vec<u64> {
        debug_assert_eq!(key.len(), self.dim);

        match self.keys.pop() {
            Some(mut buf) => {
                buf.copy_from_slice(key);
                buf
            }
            None => key.to_vec(),
        }
    }

    /// Return a key buffer to the pool.
    pub fn offer_key(&mut self, buf: Vec<u64>) {
        debug_assert_eq!(buf.len(), self.dim);

        if self.keys.len() < MAX_POOLED {
            self.keys.push(buf);
        }
    }

    /// A node initialized with the given lengths and an empty index.
    #[must_use]
    pub fn get_node(&mut self, infix_len: u8, post_len: u8) -> Box<Node<V>> {
        match self.nodes.pop() {
            Some(mut node) => {
                node.reinit(infix_len, post_len);
                node
            }
            None => Box::new(Node::new(self.dim, infix_len, post_len)),
        }
    }

    /// Return an emptied node to the pool.
    pub fn offer_node(&mut self, node: Box<Node<V>>) {
        debug_assert_eq!(node.entry_count(), 0, "offered node still holds entries");

        if self.nodes.len() < MAX_POOLED {
            self.nodes.push(node);
        }
    }
}
