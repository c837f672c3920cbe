//! Filepath: src/entry.rs
//!
//! Entry types stored in a node's secondary index.
//!
//! This module provides:
//! - [`NodeValue<V>`]: the tagged child of an entry — either a terminal
//!   user value or a boxed subnode
//! - [`IndexEntry<V>`]: the fixed-shape record `{hc_pos, kd_key, value}`
//!
//! "Absent" is represented by the absence of an entry, never by a sentinel
//! stored in the value slot; the enum discriminant replaces runtime type
//! inspection.

use std::fmt as StdFmt;

use crate::node::Node;

// ============================================================================
//  NodeValue<V> - tagged child
// ============================================================================

/// Child link of an [`IndexEntry`].
pub(crate) enum NodeValue<V> {
    /// Terminal entry: the user's value.
    Value(V),

    /// Subtree rooted below this entry; the entry's `kd_key` carries the
    /// subnode's infix bits.
    Node(Box<Node<V>>),
}

impl<V> NodeValue<V> {
    /// Check if this child is a subnode.
    #[must_use]
    #[inline(always)]
    pub const fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// Check if this child is a terminal value.
    #[must_use]
    #[inline(always)]
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Try to get the terminal value, returning None for a subnode.
    #[must_use]
    #[inline(always)]
    pub const fn try_as_value(&self) -> Option<&V> {
        match self {
            Self::Value(v) => Some(v),
            Self::Node(_) => None,
        }
    }

    /// Try to get the subnode, returning None for a terminal value.
    #[must_use]
    #[inline(always)]
    pub fn try_as_node(&self) -> Option<&Node<V>> {
        match self {
            Self::Node(n) => Some(n.as_ref()),
            Self::Value(_) => None,
        }
    }

    /// Unwrap the terminal value by move.
    ///
    /// # Panics
    /// Panics if this is a subnode.
    #[must_use]
    #[inline]
    #[expect(clippy::panic, reason = "invariant ensured by caller")]
    pub fn into_value(self) -> V {
        match self {
            Self::Value(v) => v,
            Self::Node(_) => panic!("NodeValue::into_value called on a subnode"),
        }
    }
}

impl<V> StdFmt::Debug for NodeValue<V> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::Value(_) => write!(f, "Value(...)"),
            Self::Node(n) => write!(
                f,
                "Node(post_len={}, infix_len={})",
                n.post_len(),
                n.infix_len()
            ),
        }
    }
}

// ============================================================================
//  IndexEntry<V>
// ============================================================================

/// One slot of a node's secondary index.
///
/// # Invariants
/// - `hc_pos` equals the hypercube address of `kd_key` at the owning
///   node's post length
/// - for a subnode child, `kd_key` agrees with every key below the subnode
///   on all bits above the subnode's post length (it is the infix carrier)
#[derive(Debug)]
pub(crate) struct IndexEntry<V> {
    /// Hypercube address within the owning node, in `[0, 2^k)`.
    hc_pos: u64,

    /// Full k-dimensional key; pooled buffer owned by this entry.
    kd_key: Vec<u64>,

    /// Terminal value or subnode.
    value: NodeValue<V>,
}

impl<V> IndexEntry<V> {
    /// Create an entry.
    #[must_use]
    #[inline]
    pub const fn new(hc_pos: u64, kd_key: Vec<u64>, value: NodeValue<V>) -> Self {
        Self {
            hc_pos,
            kd_key,
            value,
        }
    }

    /// Hypercube address within the owning node.
    #[must_use]
    #[inline(always)]
    pub const fn hc_pos(&self) -> u64 {
        self.hc_pos
    }

    /// The stored k-dimensional key (infix carrier for subnode entries).
    #[must_use]
    #[inline(always)]
    pub fn kd_key(&self) -> &[u64] {
        &self.kd_key
    }

    /// The child link.
    #[must_use]
    #[inline(always)]
    pub const fn value(&self) -> &NodeValue<V> {
        &self.value
    }

    /// Mutable child link.
    #[inline(always)]
    pub fn value_mut(&mut self) -> &mut NodeValue<V> {
        &mut self.value
    }

    /// Borrow the key and the child link at once.
    ///
    /// Needed where the infix carrier and the subnode must be inspected
    /// together without releasing the entry borrow.
    #[inline(always)]
    pub fn parts_mut(&mut self) -> (&[u64], &mut NodeValue<V>) {
        (&self.kd_key, &mut self.value)
    }

    /// Overwrite the stored key in place, keeping length and child.
    #[inline]
    pub fn set_kd_key(&mut self, key: &[u64]) {
        debug_assert_eq!(self.kd_key.len(), key.len());

        self.kd_key.copy_from_slice(key);
    }

    /// Swap in a new child link, returning the previous one.
    #[inline]
    pub fn replace_value(&mut self, value: NodeValue<V>) -> NodeValue<V> {
        std::mem::replace(&mut self.value, value)
    }

    /// Replace key and child wholesale, returning the previous pair.
    ///
    /// Used by the merge path: the surviving entry of a collapsed subnode
    /// takes over the parent entry's slot, the slot's `hc_pos` stays.
    #[inline]
    pub fn replace_payload(&mut self, kd_key: Vec<u64>, value: NodeValue<V>) -> (Vec<u64>, NodeValue<V>) {
        (
            std::mem::replace(&mut self.kd_key, kd_key),
            std::mem::replace(&mut self.value, value),
        )
    }

    /// Decompose into `(hc_pos, kd_key, value)`.
    #[must_use]
    #[inline]
    pub fn into_parts(self) -> (u64, Vec<u64>, NodeValue<V>) {
        (self.hc_pos, self.kd_key, self.value)
    }
}
