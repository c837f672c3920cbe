//! Filepath: src/node.rs
//!
//! A node of the PH-tree.
//!
//! Every node discriminates one bit position (`post_len`) of all k
//! dimensions at once; the k extracted bits form the hypercube address an
//! entry lives under in the node's secondary index. Between a node and its
//! parent lie `infix_len` bits that are identical for every key reachable
//! through the node; they are not stored here but in the parent entry's
//! `kd_key` (the infix carrier).
//!
//! # Structural invariants
//! - the root has `post_len == 63` and `infix_len == 0`
//! - for a child node `S` under parent `P`:
//!   `P.post_len == S.post_len + S.infix_len + 1`
//! - every non-root node holds at least 2 entries; a removal that leaves
//!   exactly one triggers a merge into the parent entry
//!
//! Operations report outcomes to the caller; the tree owns the global
//! entry count and adjusts it from the returned outcome.

use crate::bits::{conflicting_bits, hc_pos, infix_mask, keys_equal, keys_equal_masked};
use crate::entry::{IndexEntry, NodeValue};
use crate::index::{NodeIndex, RemoveOp, RemoveResult};
use crate::pool::Pools;
use crate::tracing_helpers::debug_log;

// ============================================================================
//  Outcome types
// ============================================================================

/// What a [`Node::compute`] call did to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ComputeOutcome {
    /// Nothing changed.
    Unchanged,

    /// A new entry was created; the tree size grows by one.
    Inserted,

    /// An existing entry was deleted; the tree size shrinks by one.
    Removed,

    /// An existing value was replaced in place.
    Replaced,
}

/// State threaded through [`Node::remove`] by a key-move operation.
pub(crate) struct UpdateInfo {
    /// The key the entry should move to.
    pub new_key: Vec<u64>,

    /// Set when the entry was removed and must be re-inserted under
    /// `new_key` from the root.
    pub insert_required: bool,

    /// Set when the key was swapped in place without structural change.
    pub swapped: bool,
}

impl UpdateInfo {
    #[must_use]
    pub fn new(new_key: Vec<u64>) -> Self {
        Self {
            new_key,
            insert_required: false,
            swapped: false,
        }
    }
}

// ============================================================================
//  Node
// ============================================================================

/// A PH-tree node; see the module docs for the bit layout.
pub(crate) struct Node<V> {
    /// Bit position this node discriminates on, `0..=63`.
    post_len: u8,

    /// Number of identical bits directly above `post_len`.
    infix_len: u8,

    /// Entries in the secondary index.
    entry_cnt: usize,

    /// Hypercube address -> entry.
    index: NodeIndex<V>,
}

impl<V> Node<V> {
    /// Create a node with an empty index.
    #[must_use]
    pub fn new(dim: usize, infix_len: u8, post_len: u8) -> Self {
        debug_assert!(post_len <= 63);
        debug_assert!(infix_len <= 63);

        Self {
            post_len,
            infix_len,
            entry_cnt: 0,
            index: NodeIndex::new(dim),
        }
    }

    /// Re-initialize a pooled node; its index must already be empty.
    pub fn reinit(&mut self, infix_len: u8, post_len: u8) {
        debug_assert_eq!(self.index.len(), 0);

        self.post_len = post_len;
        self.infix_len = infix_len;
        self.entry_cnt = 0;
    }

    /// Bit position this node discriminates on.
    #[must_use]
    #[inline(always)]
    pub const fn post_len(&self) -> u8 {
        self.post_len
    }

    /// Number of infix bits above this node.
    #[must_use]
    #[inline(always)]
    pub const fn infix_len(&self) -> u8 {
        self.infix_len
    }

    pub(crate) fn set_infix_len(&mut self, infix_len: u8) {
        debug_assert!(infix_len <= 63);

        self.infix_len = infix_len;
    }

    /// Number of entries in this node.
    #[must_use]
    #[inline(always)]
    pub const fn entry_count(&self) -> usize {
        self.entry_cnt
    }

    /// The secondary index, for the query engines.
    #[must_use]
    #[inline(always)]
    pub const fn index(&self) -> &NodeIndex<V> {
        &self.index
    }

    // ========================================================================
    //  Point operations
    // ========================================================================

    /// Look up `key` below this node.
    #[must_use]
    pub fn get(&self, key: &[u64]) -> Option<&V> {
        let hc: u64 = hc_pos(key, self.post_len);
        let entry: &IndexEntry<V> = self.index.get(hc)?;

        match entry.value() {
            NodeValue::Node(sub) => {
                if sub.infix_len > 0
                    && !keys_equal_masked(entry.kd_key(), key, infix_mask(sub.post_len))
                {
                    return None;
                }
                sub.get(key)
            }
            NodeValue::Value(v) => keys_equal(entry.kd_key(), key).then_some(v),
        }
    }

    /// Look up `key` below this node, mutably.
    pub fn get_mut(&mut self, key: &[u64]) -> Option<&mut V> {
        let hc: u64 = hc_pos(key, self.post_len);
        let entry: &mut IndexEntry<V> = self.index.get_mut(hc)?;
        let (kd_key, child) = entry.parts_mut();

        match child {
            NodeValue::Node(sub) => {
                if sub.infix_len > 0 && !keys_equal_masked(kd_key, key, infix_mask(sub.post_len))
                {
                    return None;
                }
                sub.get_mut(key)
            }
            NodeValue::Value(v) => keys_equal(kd_key, key).then_some(v),
        }
    }

    /// Insert `key -> value` below this node.
    ///
    /// Returns the replaced value for an existing key, or None when a new
    /// entry was created (the caller grows the tree size).
    pub fn insert(&mut self, key: &[u64], value: V, pools: &mut Pools<V>) -> Option<V> {
        let hc: u64 = hc_pos(key, self.post_len);
        let post_len: u8 = self.post_len;

        if let Some(entry) = self.index.get_mut(hc) {
            return Self::on_collision(entry, key, value, post_len, pools);
        }

        let kd_key: Vec<u64> = pools.key_buf(key);
        self.index
            .insert(IndexEntry::new(hc, kd_key, NodeValue::Value(value)));
        self.entry_cnt += 1;
        self.index.maybe_promote(key.len());
        None
    }

    /// Two entries at the same hypercube address: replace, traverse, or
    /// split.
    fn on_collision(
        entry: &mut IndexEntry<V>,
        key: &[u64],
        value: V,
        post_len: u8,
        pools: &mut Pools<V>,
    ) -> Option<V> {
        // A subnode without infix cannot conflict above its own span; the
        // empty mask makes the conflict scan come up clean and we traverse.
        let mask: u64 = match entry.value() {
            NodeValue::Node(sub) => {
                if sub.infix_len == 0 {
                    0
                } else {
                    infix_mask(sub.post_len)
                }
            }
            NodeValue::Value(_) => !0u64,
        };

        let mcb: u8 = conflicting_bits(key, entry.kd_key(), mask);
        if mcb == 0 {
            return match entry.value_mut() {
                NodeValue::Node(sub) => sub.insert(key, value, pools),
                NodeValue::Value(old) => Some(std::mem::replace(old, value)),
            };
        }

        Self::split_entry(entry, key, value, mcb, post_len, pools);
        None
    }

    /// Introduce an intermediate node at conflicting bit `mcb` holding the
    /// entry's current payload and the new `key -> value`.
    ///
    /// The entry keeps its `kd_key` as the infix carrier of the new node.
    fn split_entry(
        entry: &mut IndexEntry<V>,
        key: &[u64],
        value: V,
        mcb: u8,
        post_len: u8,
        pools: &mut Pools<V>,
    ) {
        debug_assert!(mcb >= 1 && mcb <= post_len);

        let new_post_len: u8 = mcb - 1;
        let new_infix_len: u8 = post_len - mcb;
        debug_log!(
            mcb,
            new_post_len,
            new_infix_len,
            "node: splitting entry into subnode"
        );

        let sub: Box<Node<V>> = pools.get_node(new_infix_len, new_post_len);
        let old_key: Vec<u64> = pools.key_buf(entry.kd_key());
        let old_value: NodeValue<V> = entry.replace_value(NodeValue::Node(sub));
        match entry.value_mut() {
            NodeValue::Node(sub) => sub.init_two(old_key, old_value, key, value, pools),
            NodeValue::Value(_) => unreachable!("child was just replaced with a subnode"),
        }
    }

    /// Populate a freshly split node with the relocated payload and the new
    /// terminal entry.
    fn init_two(
        &mut self,
        key1: Vec<u64>,
        mut val1: NodeValue<V>,
        key2: &[u64],
        val2: V,
        pools: &mut Pools<V>,
    ) {
        debug_assert_eq!(self.entry_cnt, 0);

        let p1: u64 = hc_pos(&key1, self.post_len);
        let p2: u64 = hc_pos(key2, self.post_len);
        debug_assert_ne!(p1, p2, "split bit does not separate the keys");

        if let NodeValue::Node(sub) = &mut val1 {
            // the relocated subnode now hangs directly below this node
            sub.set_infix_len(self.post_len - sub.post_len - 1);
        }

        let e1: IndexEntry<V> = IndexEntry::new(p1, key1, val1);
        let e2: IndexEntry<V> =
            IndexEntry::new(p2, pools.key_buf(key2), NodeValue::Value(val2));
        self.index.init_two(e1, e2);
        self.entry_cnt = 2;
    }

    /// Remove `key` below this node; returns the removed value.
    ///
    /// With `update` set, a key move is attempted first: if old and new key
    /// differ only within this node's span the entry's key is swapped in
    /// place (`update.swapped`); otherwise the entry is removed and
    /// `update.insert_required` tells the tree to re-insert from the root.
    pub fn remove(
        &mut self,
        key: &[u64],
        mut update: Option<&mut UpdateInfo>,
        pools: &mut Pools<V>,
    ) -> Option<V> {
        let hc: u64 = hc_pos(key, self.post_len);
        let post_len: u8 = self.post_len;

        let mut sub_removed: Option<V> = None;
        let mut swapped: bool = false;
        let pools_ref: &mut Pools<V> = &mut *pools;

        let result: RemoveResult<V> = self.index.remove_with(hc, |entry| {
            let (kd_key, child) = entry.parts_mut();
            match child {
                NodeValue::Node(sub) => {
                    if sub.infix_len > 0
                        && !keys_equal_masked(kd_key, key, infix_mask(sub.post_len))
                    {
                        return RemoveOp::NoMatch;
                    }
                    sub_removed = sub.remove(key, update.as_deref_mut(), pools_ref);
                    if sub_removed.is_some() && sub.entry_count() == 1 {
                        Self::merge_child(entry, pools_ref);
                    }
                    RemoveOp::Keep
                }
                NodeValue::Value(_) => {
                    if !keys_equal(kd_key, key) {
                        return RemoveOp::NoMatch;
                    }
                    if let Some(ui) = update.as_deref_mut() {
                        let diff: u8 = conflicting_bits(key, &ui.new_key, !0u64);
                        if diff <= post_len {
                            // all differing bits are below this node's post
                            // bit: same hc address, just swap the key
                            let new_key: &[u64] = &ui.new_key;
                            entry.set_kd_key(new_key);
                            ui.swapped = true;
                            swapped = true;
                            return RemoveOp::Keep;
                        }
                        ui.insert_required = true;
                    }
                    RemoveOp::Remove
                }
            }
        });

        match result {
            RemoveResult::Removed(entry) => {
                self.entry_cnt -= 1;
                self.index.maybe_demote(key.len());
                let (_, kd_key, value) = entry.into_parts();
                pools.offer_key(kd_key);
                Some(value.into_value())
            }
            RemoveResult::Kept => {
                if swapped {
                    None
                } else {
                    sub_removed
                }
            }
            RemoveResult::NotFound => None,
        }
    }

    /// Unified update: apply `f` to the current value (or None) and
    /// insert, replace, or remove accordingly.
    ///
    /// With `do_if_absent == false` the function is never invoked for a
    /// missing key.
    pub fn compute<F>(
        &mut self,
        key: &[u64],
        do_if_absent: bool,
        f: F,
        pools: &mut Pools<V>,
    ) -> ComputeOutcome
    where
        F: FnOnce(&[u64], Option<&V>) -> Option<V>,
    {
        let hc: u64 = hc_pos(key, self.post_len);
        let post_len: u8 = self.post_len;

        let Some(entry) = self.index.get_mut(hc) else {
            // vacant address
            if !do_if_absent {
                return ComputeOutcome::Unchanged;
            }
            let Some(new_value) = f(key, None) else {
                return ComputeOutcome::Unchanged;
            };
            let kd_key: Vec<u64> = pools.key_buf(key);
            self.index
                .insert(IndexEntry::new(hc, kd_key, NodeValue::Value(new_value)));
            self.entry_cnt += 1;
            self.index.maybe_promote(key.len());
            return ComputeOutcome::Inserted;
        };

        let mask: u64 = match entry.value() {
            NodeValue::Node(sub) => {
                if sub.infix_len == 0 {
                    0
                } else {
                    infix_mask(sub.post_len)
                }
            }
            NodeValue::Value(_) => !0u64,
        };
        let mcb: u8 = conflicting_bits(key, entry.kd_key(), mask);

        if mcb != 0 {
            // occupied by a different key (or a subtree the key is not in)
            if !do_if_absent {
                return ComputeOutcome::Unchanged;
            }
            return match f(key, None) {
                Some(new_value) => {
                    Self::split_entry(entry, key, new_value, mcb, post_len, pools);
                    ComputeOutcome::Inserted
                }
                None => ComputeOutcome::Unchanged,
            };
        }

        let mut removed_here: bool = false;
        let outcome: ComputeOutcome = match entry.value_mut() {
            NodeValue::Node(sub) => {
                let outcome = sub.compute(key, do_if_absent, f, pools);
                if matches!(outcome, ComputeOutcome::Removed) && sub.entry_count() == 1 {
                    Self::merge_child(entry, pools);
                }
                outcome
            }
            NodeValue::Value(current) => match f(key, Some(current)) {
                Some(new_value) => {
                    *current = new_value;
                    ComputeOutcome::Replaced
                }
                None => {
                    removed_here = true;
                    ComputeOutcome::Removed
                }
            },
        };

        if removed_here {
            match self.index.remove_with(hc, |_| RemoveOp::Remove) {
                RemoveResult::Removed(entry) => {
                    self.entry_cnt -= 1;
                    self.index.maybe_demote(key.len());
                    let (_, kd_key, _) = entry.into_parts();
                    pools.offer_key(kd_key);
                }
                _ => debug_assert!(false, "entry vanished between lookup and removal"),
            }
        }
        outcome
    }

    /// Collapse the single-entry child node behind `entry` by hoisting its
    /// surviving entry into `entry`'s slot.
    ///
    /// The slot's hypercube address is untouched; a surviving subnode
    /// absorbs the collapsed node's infix plus its post bit.
    fn merge_child(entry: &mut IndexEntry<V>, pools: &mut Pools<V>) {
        let (kd_key, value) = match entry.value_mut() {
            NodeValue::Node(sub) => {
                debug_assert_eq!(sub.entry_count(), 1);

                let Some(survivor) = sub.index.take_first() else {
                    debug_assert!(false, "single-entry node with empty index");
                    return;
                };
                sub.entry_cnt = 0;
                let sub_infix_len: u8 = sub.infix_len;

                let (_, kd_key, mut value) = survivor.into_parts();
                if let NodeValue::Node(child) = &mut value {
                    child.set_infix_len(child.infix_len + 1 + sub_infix_len);
                }
                (kd_key, value)
            }
            NodeValue::Value(_) => {
                debug_assert!(false, "merge_child on a terminal entry");
                return;
            }
        };

        debug_log!("node: merging single-entry child into parent slot");
        let (old_key, old_value) = entry.replace_payload(kd_key, value);
        pools.offer_key(old_key);
        match old_value {
            NodeValue::Node(sub) => pools.offer_node(sub),
            NodeValue::Value(_) => debug_assert!(false, "merged child was not a node"),
        }
    }

    /// Recursively drain this node's subtree into the pools.
    pub fn clear_into(&mut self, pools: &mut Pools<V>) {
        let mut children: Vec<Box<Node<V>>> = Vec::new();
        let pools_ref: &mut Pools<V> = &mut *pools;
        self.index.drain(&mut |entry| {
            let (_, kd_key, value) = entry.into_parts();
            pools_ref.offer_key(kd_key);
            if let NodeValue::Node(sub) = value {
                children.push(sub);
            }
        });
        self.entry_cnt = 0;

        for mut child in children {
            child.clear_into(pools);
            pools.offer_node(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root<V>() -> Node<V> {
        Node::new(2, 0, 63)
    }

    #[test]
    fn test_insert_and_get() {
        let mut pools: Pools<&str> = Pools::new(2);
        let mut node = root();

        assert!(node.insert(&[0, 0], "a", &mut pools).is_none());
        assert!(node.insert(&[1, 1], "b", &mut pools).is_none());
        assert_eq!(node.get(&[0, 0]), Some(&"a"));
        assert_eq!(node.get(&[1, 1]), Some(&"b"));
        assert_eq!(node.get(&[0, 1]), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        assert!(node.insert(&[5, 5], 1, &mut pools).is_none());
        assert_eq!(node.insert(&[5, 5], 2, &mut pools), Some(1));
        assert_eq!(node.get(&[5, 5]), Some(&2));
    }

    #[test]
    fn test_split_at_low_bit() {
        let mut pools: Pools<&str> = Pools::new(2);
        let mut node = root();

        // [3,3] and [3,4] first differ (over all dims) at bit 2, so the
        // subnode sits at post_len 2 under the root entry
        node.insert(&[3, 3], "a", &mut pools);
        node.insert(&[3, 4], "b", &mut pools);

        assert_eq!(node.entry_count(), 1);
        let hc: u64 = hc_pos(&[3, 3], 63);
        let entry = node.index().get(hc).unwrap();
        let sub = entry.value().try_as_node().unwrap();
        assert_eq!(sub.post_len(), 2);
        assert_eq!(sub.infix_len(), 60);
        assert_eq!(sub.entry_count(), 2);

        assert_eq!(node.get(&[3, 3]), Some(&"a"));
        assert_eq!(node.get(&[3, 4]), Some(&"b"));
    }

    #[test]
    fn test_remove_triggers_merge() {
        let mut pools: Pools<&str> = Pools::new(2);
        let mut node = root();

        node.insert(&[3, 3], "a", &mut pools);
        node.insert(&[3, 4], "b", &mut pools);
        assert_eq!(node.remove(&[3, 3], None, &mut pools), Some("a"));

        // the subnode collapsed; the root entry is terminal again
        let hc: u64 = hc_pos(&[3, 4], 63);
        let entry = node.index().get(hc).unwrap();
        assert!(entry.value().is_value());
        assert_eq!(node.get(&[3, 4]), Some(&"b"));
        assert_eq!(node.get(&[3, 3]), None);
    }

    #[test]
    fn test_merge_keeps_deep_structure() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        // three keys sharing a deep prefix, one outlier inside the subnode
        node.insert(&[8, 8], 1, &mut pools);
        node.insert(&[8, 9], 2, &mut pools);
        node.insert(&[9, 8], 3, &mut pools);
        assert_eq!(node.remove(&[9, 8], None, &mut pools), Some(3));

        assert_eq!(node.get(&[8, 8]), Some(&1));
        assert_eq!(node.get(&[8, 9]), Some(&2));
    }

    #[test]
    fn test_remove_missing() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        node.insert(&[1, 2], 1, &mut pools);
        assert_eq!(node.remove(&[2, 1], None, &mut pools), None);
        assert_eq!(node.remove(&[1, 3], None, &mut pools), None);
        assert_eq!(node.entry_count(), 1);
    }

    #[test]
    fn test_update_swaps_in_place() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        node.insert(&[3, 3], 7, &mut pools);
        node.insert(&[3, 4], 8, &mut pools);

        // [3,4] -> [3,5]: differs at bit 0, inside the split node's span
        let mut ui = UpdateInfo::new(vec![3, 5]);
        let removed = node.remove(&[3, 4], Some(&mut ui), &mut pools);
        assert_eq!(removed, None);
        assert!(ui.swapped);
        assert!(!ui.insert_required);
        assert_eq!(node.get(&[3, 5]), Some(&8));
        assert_eq!(node.get(&[3, 4]), None);
    }

    #[test]
    fn test_update_requires_reinsert() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        node.insert(&[3, 3], 7, &mut pools);
        node.insert(&[3, 4], 8, &mut pools);

        // [3,4] -> [100,100] conflicts far above the local node
        let mut ui = UpdateInfo::new(vec![100, 100]);
        let removed = node.remove(&[3, 4], Some(&mut ui), &mut pools);
        assert_eq!(removed, Some(8));
        assert!(!ui.swapped);
        assert!(ui.insert_required);
    }

    #[test]
    fn test_compute_insert_then_remove() {
        let mut pools: Pools<&str> = Pools::new(2);
        let mut node = root();

        let outcome = node.compute(
            &[7, 7],
            true,
            |_, cur| if cur.is_none() { Some("x") } else { None },
            &mut pools,
        );
        assert_eq!(outcome, ComputeOutcome::Inserted);
        assert_eq!(node.get(&[7, 7]), Some(&"x"));

        let outcome = node.compute(
            &[7, 7],
            true,
            |_, cur| if cur.is_none() { Some("x") } else { None },
            &mut pools,
        );
        assert_eq!(outcome, ComputeOutcome::Removed);
        assert_eq!(node.get(&[7, 7]), None);
    }

    #[test]
    fn test_compute_if_present_skips_absent() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        let outcome = node.compute(&[1, 1], false, |_, _| Some(1), &mut pools);
        assert_eq!(outcome, ComputeOutcome::Unchanged);
        assert_eq!(node.entry_count(), 0);
    }

    #[test]
    fn test_compute_replaces() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        node.insert(&[2, 2], 10, &mut pools);
        let outcome = node.compute(&[2, 2], true, |_, cur| cur.map(|v| v + 1), &mut pools);
        assert_eq!(outcome, ComputeOutcome::Replaced);
        assert_eq!(node.get(&[2, 2]), Some(&11));
    }

    #[test]
    fn test_compute_removes_in_subnode_and_merges() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        node.insert(&[3, 3], 1, &mut pools);
        node.insert(&[3, 4], 2, &mut pools);
        let outcome = node.compute(&[3, 3], true, |_, _| None, &mut pools);
        assert_eq!(outcome, ComputeOutcome::Removed);

        let hc: u64 = hc_pos(&[3, 4], 63);
        assert!(node.index().get(hc).unwrap().value().is_value());
        assert_eq!(node.get(&[3, 4]), Some(&2));
    }

    #[test]
    fn test_clear_into_pools() {
        let mut pools: Pools<u32> = Pools::new(2);
        let mut node = root();

        for i in 0..32u64 {
            node.insert(&[i, i * 3], i as u32, &mut pools);
        }
        node.clear_into(&mut pools);
        assert_eq!(node.entry_count(), 0);
        assert_eq!(node.get(&[0, 0]), None);
    }

    #[test]
    fn test_dense_corner_cube_dim3() {
        let mut pools: Pools<u64> = Pools::new(3);
        let mut node: Node<u64> = Node::new(3, 0, 63);

        for b0 in 0..2u64 {
            for b1 in 0..2u64 {
                for b2 in 0..2u64 {
                    let key = [b0, b1, b2];
                    assert!(node.insert(&key, hc_pos(&key, 0), &mut pools).is_none());
                }
            }
        }
        for b0 in 0..2u64 {
            for b1 in 0..2u64 {
                for b2 in 0..2u64 {
                    let key = [b0, b1, b2];
                    assert_eq!(node.get(&key), Some(&hc_pos(&key, 0)));
                }
            }
        }
    }
}
