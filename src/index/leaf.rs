//! Filepath: src/index/leaf.rs
//!
//! Ordered leaf page: the default secondary-index layout.
//!
//! Parallel arrays hold the hypercube addresses (sorted, strictly
//! increasing) and the entries. Lookup is a binary search that falls back
//! to a linear scan on small pages; insertion and deletion shift the tail.
//! The same page type serves as the leaf of the B+-layout used for high
//! dimension counts.

use crate::entry::IndexEntry;
use crate::index::{RemoveOp, RemoveResult};

/// Pages at or below this size are scanned linearly; binary search wins
/// only above it.
const LINEAR_SEARCH_MAX: usize = 8;

/// Default initial capacity of a page.
const INITIAL_PAGE_SIZE: usize = 4;

/// An ordered leaf page.
///
/// # Invariants
/// - `keys.len() == entries.len()`
/// - `keys` is strictly increasing
/// - `keys[i] == entries[i].hc_pos()`
pub(crate) struct LeafPage<V> {
    keys: Vec<u64>,
    entries: Vec<IndexEntry<V>>,
}

impl<V> LeafPage<V> {
    /// Create an empty page sized for a tree of the given dimensionality.
    ///
    /// Small hypercubes (`2^dim <= 8`) can never hold more than 8 entries,
    /// so they start at capacity 2 instead of the default 4.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        let cap: usize = if dim <= 3 { 2 } else { INITIAL_PAGE_SIZE };
        Self {
            keys: Vec::with_capacity(cap),
            entries: Vec::with_capacity(cap),
        }
    }

    /// Number of entries on this page.
    #[must_use]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the page holds no entries.
    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted hypercube addresses.
    #[must_use]
    #[inline(always)]
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    /// Entry at position `pos`.
    #[must_use]
    #[inline(always)]
    pub fn entry_at(&self, pos: usize) -> Option<&IndexEntry<V>> {
        self.entries.get(pos)
    }

    /// Locate `hc_pos`: `Ok(position)` if present, `Err(insertion point)`
    /// otherwise.
    ///
    /// Linear scan on small pages, binary search above
    /// [`LINEAR_SEARCH_MAX`].
    #[must_use]
    pub fn search(&self, hc_pos: u64) -> Result<usize, usize> {
        if self.keys.len() <= LINEAR_SEARCH_MAX {
            for (i, k) in self.keys.iter().enumerate() {
                if hc_pos <= *k {
                    return if hc_pos == *k { Ok(i) } else { Err(i) };
                }
            }
            Err(self.keys.len())
        } else {
            self.keys.binary_search(&hc_pos)
        }
    }

    /// Get the entry at `hc_pos`.
    #[must_use]
    pub fn get(&self, hc_pos: u64) -> Option<&IndexEntry<V>> {
        let pos: usize = self.search(hc_pos).ok()?;
        self.entries.get(pos)
    }

    /// Get the entry at `hc_pos` mutably.
    pub fn get_mut(&mut self, hc_pos: u64) -> Option<&mut IndexEntry<V>> {
        let pos: usize = self.search(hc_pos).ok()?;
        self.entries.get_mut(pos)
    }

    /// Insert an entry whose `hc_pos` is not yet present.
    pub fn insert(&mut self, entry: IndexEntry<V>) {
        match self.search(entry.hc_pos()) {
            Ok(_) => debug_assert!(false, "duplicate hc_pos {}", entry.hc_pos()),
            Err(pos) => self.insert_at(pos, entry),
        }
    }

    /// Insert at a known position (from a failed [`Self::search`]).
    pub fn insert_at(&mut self, pos: usize, entry: IndexEntry<V>) {
        self.keys.insert(pos, entry.hc_pos());
        self.entries.insert(pos, entry);
    }

    /// Remove and return the entry at position `pos`.
    pub fn remove_at(&mut self, pos: usize) -> IndexEntry<V> {
        self.keys.remove(pos);
        self.entries.remove(pos)
    }

    /// Three-way removal: locate `hc_pos`, let `decide` inspect the entry,
    /// and remove it only on [`RemoveOp::Remove`].
    pub fn remove_with<F>(&mut self, hc_pos: u64, decide: F) -> RemoveResult<V>
    where
        F: FnOnce(&mut IndexEntry<V>) -> RemoveOp,
    {
        let Ok(pos) = self.search(hc_pos) else {
            return RemoveResult::NotFound;
        };
        let Some(entry) = self.entries.get_mut(pos) else {
            return RemoveResult::NotFound;
        };

        match decide(entry) {
            RemoveOp::Remove => RemoveResult::Removed(self.remove_at(pos)),
            RemoveOp::Keep => RemoveResult::Kept,
            RemoveOp::NoMatch => RemoveResult::NotFound,
        }
    }

    /// First entry in hc order.
    #[must_use]
    pub fn first_entry(&self) -> Option<&IndexEntry<V>> {
        self.entries.first()
    }

    /// Remove and return the first entry.
    pub fn take_first(&mut self) -> Option<IndexEntry<V>> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Initialize an empty page with two pre-sorted-or-not entries.
    ///
    /// Used when a split creates a fresh node holding exactly the existing
    /// entry and the new one.
    pub fn init_two(&mut self, e1: IndexEntry<V>, e2: IndexEntry<V>) {
        debug_assert!(self.is_empty());
        debug_assert_ne!(e1.hc_pos(), e2.hc_pos());

        let (lo, hi) = if e1.hc_pos() < e2.hc_pos() {
            (e1, e2)
        } else {
            (e2, e1)
        };
        self.keys.push(lo.hc_pos());
        self.entries.push(lo);
        self.keys.push(hi.hc_pos());
        self.entries.push(hi);
    }

    /// Create a page with no backing storage; grows on first insert.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            keys: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Split off the upper half into a new page; returns the first key of
    /// the new page as the separator.
    pub fn split_upper_half(&mut self) -> (u64, Self) {
        debug_assert!(self.len() >= 2);

        let mid: usize = self.len() / 2;
        let right = Self {
            keys: self.keys.split_off(mid),
            entries: self.entries.split_off(mid),
        };
        let sep: u64 = right.keys.first().copied().unwrap_or_default();
        (sep, right)
    }

    /// Append all entries of `right`; every key of `right` must be larger
    /// than every key of `self`.
    pub fn append(&mut self, mut right: Self) {
        debug_assert!(match (self.keys.last(), right.keys.first()) {
            (Some(l), Some(r)) => l < r,
            _ => true,
        });

        self.keys.append(&mut right.keys);
        self.entries.append(&mut right.entries);
    }

    /// Drain all entries in order into `f`, leaving the page empty but
    /// keeping its capacity.
    pub fn drain<F>(&mut self, f: &mut F)
    where
        F: FnMut(IndexEntry<V>),
    {
        self.keys.clear();
        for entry in self.entries.drain(..) {
            f(entry);
        }
    }
}
