//! Filepath: src/distance.rs
//!
//! Distance functions over the monotone `u64` key space.
//!
//! The k-NN and range engines are metric-agnostic: they only need a point
//! distance, a lower bound from a point to a node's region, and the
//! axis-aligned bounding box of a ball. [`PhDistanceL2`] and
//! [`PhDistanceL1`] provide the Euclidean and Manhattan metrics on keys
//! interpreted as integer coordinates.

use crate::bits::infix_mask;

/// Distance contract used by [`crate::PhTree::nearest_neighbor`] and
/// [`crate::PhTree::range_query`].
pub trait PhDistance {
    /// Distance between two points.
    fn dist(&self, a: &[u64], b: &[u64]) -> f64;

    /// Lower bound of the distance from `center` to any point in a node's
    /// region: the hypercube whose coordinates match `region_key` above
    /// bit `post_len` and span `[0, 2^(post_len + 1))` below.
    fn min_dist_to_region(&self, center: &[u64], region_key: &[u64], post_len: u8) -> f64;

    /// Axis-aligned bounding box of the ball around `center`, written to
    /// `min`/`max` (saturating at the key-space bounds).
    fn to_mbb(&self, radius: f64, center: &[u64], min: &mut [u64], max: &mut [u64]);
}

/// Per-dimension bounds of a node's region.
#[inline]
fn region_bounds(region_coord: u64, post_len: u8) -> (u64, u64) {
    let mask: u64 = infix_mask(post_len);
    let lo: u64 = region_coord & mask;
    (lo, lo | !mask)
}

/// Distance from a coordinate to an interval; 0 inside.
#[inline]
fn axis_gap(center: u64, lo: u64, hi: u64) -> u64 {
    if center < lo {
        lo - center
    } else if center > hi {
        center - hi
    } else {
        0
    }
}

/// Integer radius covering `radius`, for bounding-box corners.
#[inline]
fn mbb_radius(radius: f64) -> u64 {
    debug_assert!(radius >= 0.0, "negative query radius");

    // saturating float-to-int conversion
    radius.ceil() as u64
}

// ============================================================================
//  Euclidean (L2)
// ============================================================================

/// Euclidean distance on integer coordinates.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhDistanceL2;

impl PhDistance for PhDistanceL2 {
    fn dist(&self, a: &[u64], b: &[u64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());

        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d: f64 = x.abs_diff(*y) as f64;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    fn min_dist_to_region(&self, center: &[u64], region_key: &[u64], post_len: u8) -> f64 {
        debug_assert_eq!(center.len(), region_key.len());

        center
            .iter()
            .zip(region_key.iter())
            .map(|(c, r)| {
                let (lo, hi) = region_bounds(*r, post_len);
                let d: f64 = axis_gap(*c, lo, hi) as f64;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    fn to_mbb(&self, radius: f64, center: &[u64], min: &mut [u64], max: &mut [u64]) {
        let r: u64 = mbb_radius(radius);
        for (d, c) in center.iter().enumerate() {
            if let (Some(lo), Some(hi)) = (min.get_mut(d), max.get_mut(d)) {
                *lo = c.saturating_sub(r);
                *hi = c.saturating_add(r);
            }
        }
    }
}

// ============================================================================
//  Manhattan (L1)
// ============================================================================

/// Manhattan distance on integer coordinates.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhDistanceL1;

impl PhDistance for PhDistanceL1 {
    fn dist(&self, a: &[u64], b: &[u64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());

        a.iter()
            .zip(b.iter())
            .map(|(x, y)| x.abs_diff(*y) as f64)
            .sum()
    }

    fn min_dist_to_region(&self, center: &[u64], region_key: &[u64], post_len: u8) -> f64 {
        debug_assert_eq!(center.len(), region_key.len());

        center
            .iter()
            .zip(region_key.iter())
            .map(|(c, r)| {
                let (lo, hi) = region_bounds(*r, post_len);
                axis_gap(*c, lo, hi) as f64
            })
            .sum()
    }

    fn to_mbb(&self, radius: f64, center: &[u64], min: &mut [u64], max: &mut [u64]) {
        // the L1 ball is contained in the same +-r box
        PhDistanceL2.to_mbb(radius, center, min, max);
    }
}
