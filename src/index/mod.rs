//! Filepath: src/index/mod.rs
//!
//! Per-node secondary index: an ordered mapping from hypercube address to
//! entry, behind one dispatch enum with three interchangeable layouts.
//!
//! - [`leaf::LeafPage`]: sorted parallel arrays, the default
//! - [`ahc::AhcTable`]: direct-addressed table for small, dense nodes
//! - [`bst::BstIndex`]: B+-tree of leaf pages for high dimension counts
//!
//! Layout selection is per node: nodes start on the ordered leaf (or the
//! B+-layout for `dim >= 12`, where a node can hold thousands of entries)
//! and low-dimensional nodes are promoted to the direct-addressed table
//! once they are dense enough, with hysteresis on the way back down.
//! Promotion is an optimization; every layout implements the full
//! capability set.

pub(crate) mod ahc;
pub(crate) mod bst;
pub(crate) mod iter;
pub(crate) mod leaf;

use crate::entry::IndexEntry;
use crate::tracing_helpers::trace_log;

use ahc::AhcTable;
use bst::BstIndex;
use leaf::LeafPage;

/// Largest dimensionality for which the direct-addressed layout is viable
/// (`2^dim` slots).
pub(crate) const AHC_MAX_DIM: usize = 6;

/// Dimensionality from which nodes use the B+-layout from the start.
pub(crate) const BST_MIN_DIM: usize = 12;

// ============================================================================
//  Removal protocol
// ============================================================================

/// Decision returned by a removal callback after inspecting the entry at
/// the requested address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoveOp {
    /// Entry matched; delete it from the index.
    Remove,

    /// Entry matched but stays (subnode hit, or an in-place key swap
    /// already did the work).
    Keep,

    /// Entry at this address does not match the search key.
    NoMatch,
}

/// Outcome of [`NodeIndex::remove_with`].
pub(crate) enum RemoveResult<V> {
    /// No entry at the address, or the callback said [`RemoveOp::NoMatch`].
    NotFound,

    /// The entry was deleted and is returned to the caller.
    Removed(IndexEntry<V>),

    /// The entry matched and was kept.
    Kept,
}

// ============================================================================
//  NodeIndex
// ============================================================================

/// The secondary index of one node.
pub(crate) enum NodeIndex<V> {
    Leaf(LeafPage<V>),
    Ahc(AhcTable<V>),
    Bst(BstIndex<V>),
}

impl<V> NodeIndex<V> {
    /// Create an empty index for a node in a `dim`-dimensional tree.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        if dim >= BST_MIN_DIM {
            Self::Bst(BstIndex::new(dim))
        } else {
            Self::Leaf(LeafPage::new(dim))
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Leaf(page) => page.len(),
            Self::Ahc(table) => table.len(),
            Self::Bst(bst) => bst.len(),
        }
    }

    /// Get the entry at `hc_pos`.
    #[must_use]
    pub fn get(&self, hc_pos: u64) -> Option<&IndexEntry<V>> {
        match self {
            Self::Leaf(page) => page.get(hc_pos),
            Self::Ahc(table) => table.get(hc_pos),
            Self::Bst(bst) => bst.get(hc_pos),
        }
    }

    /// Get the entry at `hc_pos` mutably.
    pub fn get_mut(&mut self, hc_pos: u64) -> Option<&mut IndexEntry<V>> {
        match self {
            Self::Leaf(page) => page.get_mut(hc_pos),
            Self::Ahc(table) => table.get_mut(hc_pos),
            Self::Bst(bst) => bst.get_mut(hc_pos),
        }
    }

    /// Insert an entry whose `hc_pos` is not yet present.
    pub fn insert(&mut self, entry: IndexEntry<V>) {
        match self {
            Self::Leaf(page) => page.insert(entry),
            Self::Ahc(table) => table.insert(entry),
            Self::Bst(bst) => bst.insert(entry),
        }
    }

    /// Locate `hc_pos` and let `decide` choose between deleting the entry,
    /// keeping it, or reporting a mismatch.
    pub fn remove_with<F>(&mut self, hc_pos: u64, decide: F) -> RemoveResult<V>
    where
        F: FnOnce(&mut IndexEntry<V>) -> RemoveOp,
    {
        match self {
            Self::Leaf(page) => page.remove_with(hc_pos, decide),
            Self::Ahc(table) => table.remove_with(hc_pos, decide),
            Self::Bst(bst) => bst.remove_with(hc_pos, decide),
        }
    }

    /// First entry in hc order.
    #[must_use]
    pub fn first_entry(&self) -> Option<&IndexEntry<V>> {
        match self {
            Self::Leaf(page) => page.first_entry(),
            Self::Ahc(table) => table.first_entry(),
            Self::Bst(bst) => bst.first_entry(),
        }
    }

    /// Remove and return the first entry in hc order.
    pub fn take_first(&mut self) -> Option<IndexEntry<V>> {
        match self {
            Self::Leaf(page) => page.take_first(),
            Self::Ahc(table) => table.take_first(),
            Self::Bst(bst) => bst.take_first(),
        }
    }

    /// Populate a fresh index with the two entries of a newly split node.
    pub fn init_two(&mut self, e1: IndexEntry<V>, e2: IndexEntry<V>) {
        debug_assert_eq!(self.len(), 0);

        match self {
            Self::Leaf(page) => page.init_two(e1, e2),
            Self::Ahc(table) => {
                table.insert(e1);
                table.insert(e2);
            }
            Self::Bst(bst) => {
                bst.insert(e1);
                bst.insert(e2);
            }
        }
    }

    /// Drain all entries in hc order into `f`, leaving the index empty.
    pub fn drain<F>(&mut self, f: &mut F)
    where
        F: FnMut(IndexEntry<V>),
    {
        match self {
            Self::Leaf(page) => page.drain(f),
            Self::Ahc(table) => table.drain(f),
            Self::Bst(bst) => bst.drain(f),
        }
    }

    /// Switch a dense low-dimensional node to the direct-addressed layout.
    ///
    /// Called after growth; a no-op unless the node is an ordered leaf at
    /// more than half of `2^dim` occupancy with `dim <= AHC_MAX_DIM`.
    pub fn maybe_promote(&mut self, dim: usize) {
        if dim > AHC_MAX_DIM {
            return;
        }
        let Self::Leaf(page) = self else {
            return;
        };
        if page.len() * 2 <= (1usize << dim) {
            return;
        }

        trace_log!(len = page.len(), dim, "index: promoting to array hypercube");
        let mut table: AhcTable<V> = AhcTable::new(dim);
        page.drain(&mut |entry| table.insert(entry));
        *self = Self::Ahc(table);
    }

    /// Switch a sparse direct-addressed node back to the ordered leaf.
    ///
    /// Called after shrinkage; the quarter-occupancy bound keeps an
    /// alternating insert/remove workload from thrashing between layouts.
    pub fn maybe_demote(&mut self, dim: usize) {
        let Self::Ahc(table) = self else {
            return;
        };
        if table.len() * 4 >= table.capacity() {
            return;
        }

        trace_log!(len = table.len(), dim, "index: demoting to ordered leaf");
        let mut page: LeafPage<V> = LeafPage::new(dim);
        table.drain(&mut |entry| page.insert(entry));
        *self = Self::Leaf(page);
    }
}
