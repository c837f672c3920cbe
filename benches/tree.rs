//! Core operation benchmarks.
//!
//! Run with: `cargo bench --bench tree`

#![expect(clippy::unwrap_used)]

use divan::{black_box, Bencher};
use phtree::{PhDistanceL2, PhTree};

fn main() {
    divan::main();
}

// ============================================================================
//  Constants
// ============================================================================

/// Tree size for steady-state benchmarks.
const N: usize = 100_000;

/// Lookups / queries per iteration.
const OPS: usize = 1_000;

// ============================================================================
//  Setup helpers
// ============================================================================

/// Deterministic pseudo-random 2d keys (no RNG dependency).
fn random_keys(n: usize, seed: u64) -> Vec<[u64; 2]> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    (0..n as u64)
        .map(|i| {
            let mut h = DefaultHasher::new();
            (i, seed).hash(&mut h);
            let x = h.finish();
            (i, seed, 1u8).hash(&mut h);
            [x, h.finish()]
        })
        .collect()
}

fn clustered_keys(n: usize) -> Vec<[u64; 2]> {
    (0..n as u64).map(|i| [i / 64, i % 64]).collect()
}

fn filled_tree(keys: &[[u64; 2]]) -> PhTree<u64> {
    let mut tree: PhTree<u64> = PhTree::new(2);
    for (i, key) in keys.iter().enumerate() {
        tree.put(key, i as u64);
    }
    tree
}

// ============================================================================
//  Insert
// ============================================================================

#[divan::bench]
fn insert_random(bencher: Bencher) {
    let keys = random_keys(N, 42);
    bencher.bench_local(|| {
        let mut tree: PhTree<u64> = PhTree::new(2);
        for (i, key) in keys.iter().enumerate() {
            tree.put(black_box(key), i as u64);
        }
        tree.size()
    });
}

#[divan::bench]
fn insert_clustered(bencher: Bencher) {
    let keys = clustered_keys(N);
    bencher.bench_local(|| {
        let mut tree: PhTree<u64> = PhTree::new(2);
        for (i, key) in keys.iter().enumerate() {
            tree.put(black_box(key), i as u64);
        }
        tree.size()
    });
}

// ============================================================================
//  Lookup
// ============================================================================

#[divan::bench]
fn get_hit(bencher: Bencher) {
    let keys = random_keys(N, 42);
    let tree = filled_tree(&keys);
    bencher.bench_local(|| {
        let mut found: usize = 0;
        for key in keys.iter().take(OPS) {
            if tree.get(black_box(key)).is_some() {
                found += 1;
            }
        }
        found
    });
}

#[divan::bench]
fn get_miss(bencher: Bencher) {
    let keys = random_keys(N, 42);
    let probes = random_keys(OPS, 43);
    let tree = filled_tree(&keys);
    bencher.bench_local(|| {
        let mut found: usize = 0;
        for key in &probes {
            if tree.get(black_box(key)).is_some() {
                found += 1;
            }
        }
        found
    });
}

// ============================================================================
//  Remove / reinsert churn
// ============================================================================

#[divan::bench]
fn remove_insert_churn(bencher: Bencher) {
    let keys = random_keys(N, 42);
    bencher
        .with_inputs(|| filled_tree(&keys))
        .bench_local_values(|mut tree| {
            for (i, key) in keys.iter().take(OPS).enumerate() {
                tree.remove(key).unwrap();
                tree.put(key, i as u64);
            }
            tree.size()
        });
}

// ============================================================================
//  Queries
// ============================================================================

#[divan::bench]
fn window_query_small(bencher: Bencher) {
    let keys = clustered_keys(N);
    let tree = filled_tree(&keys);
    bencher.bench_local(|| {
        let mut total: usize = 0;
        for i in 0..OPS as u64 {
            let base = i % 1_000;
            total += tree
                .query(black_box(&[base, 0]), black_box(&[base + 8, 63]))
                .count();
        }
        total
    });
}

#[divan::bench]
fn full_iteration(bencher: Bencher) {
    let keys = random_keys(N, 42);
    let tree = filled_tree(&keys);
    bencher.bench_local(|| tree.iterator().count());
}

#[divan::bench(args = [1, 10, 100])]
fn knn(bencher: Bencher, k: usize) {
    let keys = clustered_keys(N);
    let tree = filled_tree(&keys);
    bencher.bench_local(|| {
        tree.nearest_neighbor(black_box(k), &PhDistanceL2, &[700, 32])
            .count()
    });
}
