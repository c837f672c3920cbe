//! Property-based tests for the tree.
//!
//! These tests verify invariants that should hold for all inputs.
//! Uses differential testing against `BTreeMap` as an oracle.

#![allow(clippy::indexing_slicing)]

use phtree::{PhDistanceL2, PhTree};
use proptest::prelude::*;
use std::collections::BTreeMap;

const DIM: usize = 2;

// ============================================================================
//  Strategies
// ============================================================================

/// Keys from a small grid, so splits and merges happen constantly.
fn dense_key() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..16, DIM)
}

/// Keys spread over the full space, including the top of the range.
fn sparse_key() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(
        prop_oneof![0u64..64, (u64::MAX - 64)..=u64::MAX, any::<u64>()],
        DIM,
    )
}

fn any_key() -> impl Strategy<Value = Vec<u64>> {
    prop_oneof![3 => dense_key(), 1 => sparse_key()]
}

/// Operations for random sequence testing.
#[derive(Debug, Clone)]
enum Op {
    Put(Vec<u64>, u64),
    Remove(Vec<u64>),
    Toggle(Vec<u64>, u64),
    Update(Vec<u64>, Vec<u64>),
}

fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            4 => (any_key(), any::<u64>()).prop_map(|(k, v)| Op::Put(k, v)),
            2 => any_key().prop_map(Op::Remove),
            1 => (any_key(), any::<u64>()).prop_map(|(k, v)| Op::Toggle(k, v)),
            1 => (any_key(), any_key()).prop_map(|(a, b)| Op::Update(a, b)),
        ],
        0..=max_ops,
    )
}

fn tree_contents(tree: &PhTree<u64>) -> BTreeMap<Vec<u64>, u64> {
    tree.iterator().map(|(k, v)| (k.to_vec(), *v)).collect()
}

// ============================================================================
//  Basic put/get/remove properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every inserted key is retrievable.
    #[test]
    fn put_then_get_returns_value(key in any_key(), value: u64) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        tree.put(&key, value);

        prop_assert_eq!(tree.get(&key), Some(&value));
        prop_assert_eq!(tree.size(), 1);
    }

    /// Inserting twice returns the first value and stores the second.
    #[test]
    fn put_duplicate_returns_old_value(key in any_key(), v1: u64, v2: u64) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);

        prop_assert!(tree.put(&key, v1).is_none());
        prop_assert_eq!(tree.put(&key, v2), Some(v1));
        prop_assert_eq!(tree.get(&key), Some(&v2));
        prop_assert_eq!(tree.size(), 1);
    }

    /// put then remove round-trips the value and leaves no trace.
    #[test]
    fn put_remove_roundtrip(keys in prop::collection::hash_set(any_key(), 1..40)) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        let keys: Vec<Vec<u64>> = keys.into_iter().collect();

        for (i, key) in keys.iter().enumerate() {
            tree.put(key, i as u64);
        }
        prop_assert_eq!(tree.size(), keys.len());

        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(tree.remove(key), Some(i as u64));
            prop_assert_eq!(tree.get(key), None);
        }
        prop_assert!(tree.is_empty());
    }

    /// Removing a missing key changes nothing.
    #[test]
    fn remove_missing_is_noop(present in any_key(), absent in any_key()) {
        prop_assume!(present != absent);

        let mut tree: PhTree<u64> = PhTree::new(DIM);
        tree.put(&present, 1);

        prop_assert_eq!(tree.remove(&absent), None);
        prop_assert_eq!(tree.size(), 1);
        prop_assert_eq!(tree.get(&present), Some(&1));
    }

    /// update moves exactly one entry.
    #[test]
    fn update_moves_entry(a in any_key(), b in any_key(), value: u64) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        tree.put(&a, value);

        prop_assert_eq!(tree.update(&a, &b), Some(&value));
        prop_assert_eq!(tree.get(&b), Some(&value));
        if a != b {
            prop_assert_eq!(tree.get(&a), None);
        }
        prop_assert_eq!(tree.size(), 1);
    }
}

// ============================================================================
//  Differential testing against BTreeMap
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Random operation sequences behave exactly like a BTreeMap.
    #[test]
    fn differential_random_ops(ops in operations(120)) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        let mut oracle: BTreeMap<Vec<u64>, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    let tree_prior = tree.put(&key, value);
                    let oracle_prior = oracle.insert(key, value);
                    prop_assert_eq!(tree_prior, oracle_prior);
                }
                Op::Remove(key) => {
                    let tree_removed = tree.remove(&key);
                    let oracle_removed = oracle.remove(&key);
                    prop_assert_eq!(tree_removed, oracle_removed);
                }
                Op::Toggle(key, value) => {
                    tree.compute(&key, |_, cur| if cur.is_none() { Some(value) } else { None });
                    if oracle.remove(&key).is_none() {
                        oracle.insert(key, value);
                    }
                }
                Op::Update(a, b) => {
                    tree.update(&a, &b);
                    if let Some(v) = oracle.remove(&a) {
                        oracle.insert(b, v);
                    }
                }
            }
            prop_assert_eq!(tree.size(), oracle.len());
        }

        prop_assert_eq!(tree_contents(&tree), oracle);
    }

    /// The full iterator visits every entry exactly once.
    #[test]
    fn iterator_visits_each_once(pairs in prop::collection::btree_map(any_key(), any::<u64>(), 0..80)) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        for (key, value) in &pairs {
            tree.put(key, *value);
        }

        let visited: Vec<Vec<u64>> = tree.iterator().map(|(k, _)| k.to_vec()).collect();
        prop_assert_eq!(visited.len(), pairs.len());
        prop_assert_eq!(tree_contents(&tree), pairs);
    }
}

// ============================================================================
//  Query properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// The window query returns exactly the keys inside the box.
    #[test]
    fn window_query_matches_brute_force(
        pairs in prop::collection::btree_map(dense_key(), any::<u64>(), 0..60),
        corner_a in dense_key(),
        corner_b in dense_key(),
    ) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        for (key, value) in &pairs {
            tree.put(key, *value);
        }

        let min: Vec<u64> = corner_a.iter().zip(&corner_b).map(|(a, b)| *a.min(b)).collect();
        let max: Vec<u64> = corner_a.iter().zip(&corner_b).map(|(a, b)| *a.max(b)).collect();

        let mut got: Vec<Vec<u64>> = tree.query(&min, &max).map(|(k, _)| k.to_vec()).collect();
        got.sort();

        let mut expected: Vec<Vec<u64>> = pairs
            .keys()
            .filter(|k| k.iter().zip(min.iter().zip(&max)).all(|(c, (lo, hi))| lo <= c && c <= hi))
            .cloned()
            .collect();
        expected.sort();

        prop_assert_eq!(got, expected);
    }

    /// A full-space window visits everything.
    #[test]
    fn unbounded_window_is_full_iteration(
        pairs in prop::collection::btree_map(any_key(), any::<u64>(), 0..60),
    ) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        for (key, value) in &pairs {
            tree.put(key, *value);
        }

        let count = tree.query(&[0; DIM], &[u64::MAX; DIM]).count();
        prop_assert_eq!(count, pairs.len());
    }

    /// k-NN returns every entry at or below the k-th smallest distance,
    /// in non-decreasing order.
    #[test]
    fn knn_matches_brute_force(
        pairs in prop::collection::btree_map(dense_key(), any::<u64>(), 1..50),
        center in dense_key(),
        k in 1usize..12,
    ) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        for (key, value) in &pairs {
            tree.put(key, *value);
        }

        let got: Vec<f64> = tree
            .nearest_neighbor(k, &PhDistanceL2, &center)
            .map(|(d, _, _)| d)
            .collect();
        prop_assert!(got.windows(2).all(|w| w[0] <= w[1]));

        let mut brute: Vec<f64> = pairs
            .keys()
            .map(|key| {
                key.iter()
                    .zip(&center)
                    .map(|(a, b)| {
                        let d = a.abs_diff(*b) as f64;
                        d * d
                    })
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();
        brute.sort_by(f64::total_cmp);

        if pairs.len() <= k {
            prop_assert_eq!(got, brute);
        } else {
            let kth = brute[k - 1];
            let expected: Vec<f64> = brute.iter().copied().take_while(|d| *d <= kth).collect();
            prop_assert_eq!(got, expected);
        }
    }

    /// Range query equals the brute-force ball.
    #[test]
    fn range_query_matches_brute_force(
        pairs in prop::collection::btree_map(dense_key(), any::<u64>(), 0..50),
        center in dense_key(),
        radius in 0.0f64..12.0,
    ) {
        let mut tree: PhTree<u64> = PhTree::new(DIM);
        for (key, value) in &pairs {
            tree.put(key, *value);
        }

        let mut got: Vec<Vec<u64>> = tree
            .range_query(radius, PhDistanceL2, &center)
            .map(|(k, _)| k.to_vec())
            .collect();
        got.sort();

        let mut expected: Vec<Vec<u64>> = pairs
            .keys()
            .filter(|key| {
                let d2: f64 = key
                    .iter()
                    .zip(&center)
                    .map(|(a, b)| {
                        let d = a.abs_diff(*b) as f64;
                        d * d
                    })
                    .sum();
                d2.sqrt() <= radius
            })
            .cloned()
            .collect();
        expected.sort();

        prop_assert_eq!(got, expected);
    }
}

// ============================================================================
//  High-dimensional trees (B+ index layout)
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(60))]

    /// The wide-key layout behaves like the narrow one.
    #[test]
    fn high_dim_differential(
        pairs in prop::collection::btree_map(
            prop::collection::vec(0u64..4, 13),
            any::<u64>(),
            0..120,
        ),
    ) {
        let mut tree: PhTree<u64> = PhTree::new(13);
        let mut oracle: BTreeMap<Vec<u64>, u64> = BTreeMap::new();

        for (key, value) in &pairs {
            prop_assert_eq!(tree.put(key, *value), oracle.insert(key.clone(), *value));
        }
        prop_assert_eq!(tree.size(), oracle.len());

        for key in pairs.keys() {
            prop_assert_eq!(tree.get(key), oracle.get(key));
        }

        // remove half, keep the rest intact
        let doomed: Vec<Vec<u64>> = oracle.keys().step_by(2).cloned().collect();
        for key in &doomed {
            prop_assert_eq!(tree.remove(key), oracle.remove(key));
        }
        prop_assert_eq!(tree_contents(&tree), oracle);
    }
}
