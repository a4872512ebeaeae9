//! Broad phase collision detection algorithms
//! are responsible for detecting pairs of possibly intersecting objects
//! for further, more accurate narrow phase inspection.
//!
//! Every implementation keeps one proxy per collider holding a fattened copy of its AABB.
//! Small movements that stay inside the fattened box don't touch the structure at all.

use super::{Collider, ColliderKey, ColliderRef, Ray, AABB};
use crate::{error::CollisionError, math as m};

mod tree;
pub use tree::{AabbIter, DynamicTree};

mod sap;
pub use sap::{BruteForceSap, IncrementalSap};

/// Tunable parameters shared by every broad phase.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BroadPhaseParams {
    /// Total amount added to the width and height of every proxy AABB.
    /// Zero disables fattening.
    pub aabb_expansion: f64,
    /// Number of proxies to reserve space for on construction.
    pub initial_capacity: usize,
    /// Expected number of pairs per proxy, used to presize `detect` results.
    pub estimated_pairs_per_proxy: f64,
    /// Expected fraction of proxies hit by an AABB or ray query.
    pub estimated_query_fraction: f64,
}

impl Default for BroadPhaseParams {
    fn default() -> Self {
        Self {
            aabb_expansion: 0.2,
            initial_capacity: 64,
            estimated_pairs_per_proxy: 4.0,
            estimated_query_fraction: 0.02,
        }
    }
}

impl BroadPhaseParams {
    pub fn validate(&self) -> Result<(), CollisionError> {
        check_expansion(self.aabb_expansion)?;
        let pairs = self.estimated_pairs_per_proxy;
        if !(pairs >= 0.0 && pairs.is_finite()) {
            return Err(CollisionError::InvalidEstimate(pairs));
        }
        let fraction = self.estimated_query_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(CollisionError::InvalidEstimate(fraction));
        }
        Ok(())
    }

    /// Never more than the number of distinct pairs.
    #[inline]
    pub(crate) fn pair_capacity(&self, proxy_count: usize) -> usize {
        let estimate = (proxy_count as f64 * self.estimated_pairs_per_proxy.max(0.0)) as usize;
        estimate.min(proxy_count.saturating_mul(proxy_count.saturating_sub(1)) / 2)
    }

    #[inline]
    pub(crate) fn query_capacity(&self, proxy_count: usize) -> usize {
        let estimate = (proxy_count as f64 * self.estimated_query_fraction.max(0.0)).ceil() as usize;
        estimate.clamp(1, proxy_count.max(1))
    }
}

pub(crate) fn check_expansion(expansion: f64) -> Result<f64, CollisionError> {
    if expansion >= 0.0 && expansion.is_finite() {
        Ok(expansion)
    } else {
        Err(CollisionError::InvalidExpansion(expansion))
    }
}

/// The proxy box a collider needs, or `None` if its cached one still covers it.
pub(crate) fn refreshed_aabb(cached: &AABB, collider: &Collider, expansion: f64) -> Option<AABB> {
    let tight = collider.aabb();
    if cached.contains(&tight) {
        None
    } else {
        Some(tight.expanded(expansion))
    }
}

/// Two colliders whose proxy AABBs overlap.
///
/// Keys are stored in ascending order,
/// so the same two colliders always produce an equal pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BroadPhasePair {
    pub first: ColliderKey,
    pub second: ColliderKey,
}

impl BroadPhasePair {
    pub fn new(a: ColliderKey, b: ColliderKey) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }
}

/// A broad phase algorithm.
///
/// All mutation happens through `&mut self`,
/// so a broad phase is only ever touched by one thread at a time.
pub trait BroadPhase {
    /// Start tracking a collider. Adding a collider twice replaces its proxy.
    fn add(&mut self, coll: ColliderRef<'_>);
    /// Stop tracking a collider, returning whether it was tracked.
    fn remove(&mut self, key: ColliderKey) -> bool;
    /// Refresh a collider's proxy after it moved.
    /// Colliders that were never added are added.
    fn update(&mut self, coll: ColliderRef<'_>);
    fn clear(&mut self);
    /// The cached, fattened AABB of a collider.
    fn aabb(&self, key: ColliderKey) -> Option<AABB>;
    fn contains(&self, key: ColliderKey) -> bool {
        self.aabb(key).is_some()
    }
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Every pair of colliders whose proxies overlap, each pair exactly once.
    fn detect(&mut self) -> Vec<BroadPhasePair>;
    /// Every collider whose proxy overlaps the given box.
    fn detect_aabb(&mut self, aabb: &AABB) -> Vec<ColliderKey>;
    /// Every collider whose proxy overlaps the bounding box of the ray.
    ///
    /// A non-positive or infinite `max_length` makes the ray unbounded.
    fn raycast(&mut self, ray: Ray, max_length: f64) -> Vec<ColliderKey> {
        self.detect_aabb(&AABB::from_ray(ray, max_length))
    }
    /// Move every cached AABB by `shift` without recomputing them from shapes.
    fn shift_coordinates(&mut self, shift: m::Vec2);
    fn aabb_expansion(&self) -> f64;
    /// Change the fattening applied by future `add` and `update` calls.
    fn set_aabb_expansion(&mut self, expansion: f64) -> Result<(), CollisionError>;
}
