//! Sweep-and-prune broad phases, keeping proxies sorted along the x axis.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    ops::Bound,
};

use super::{check_expansion, refreshed_aabb, BroadPhase, BroadPhaseParams, BroadPhasePair};
use crate::{
    collision::{ColliderKey, ColliderRef, AABB},
    error::CollisionError,
    math as m,
};

/// A proxy ordered by the left edge of its box, ties broken by key.
#[derive(Clone, Copy, Debug)]
struct SapProxy {
    key: ColliderKey,
    aabb: AABB,
}

impl PartialEq for SapProxy {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for SapProxy {}
impl PartialOrd for SapProxy {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for SapProxy {
    fn cmp(&self, other: &Self) -> Ordering {
        self.aabb
            .min
            .x
            .total_cmp(&other.aabb.min.x)
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// Pair `proxy` with every proxy after it in sorted order
/// until they start past its right edge.
fn sweep_from<'a>(
    proxy: &SapProxy,
    rest: impl Iterator<Item = &'a SapProxy>,
    pairs: &mut Vec<BroadPhasePair>,
) {
    for other in rest {
        if other.aabb.min.x > proxy.aabb.max.x {
            break;
        }
        if proxy.aabb.overlaps(&other.aabb) {
            pairs.push(BroadPhasePair::new(proxy.key, other.key));
        }
    }
}

/// Collect every proxy overlapping `aabb` from a sorted sequence.
fn sweep_query<'a>(
    sorted: impl Iterator<Item = &'a SapProxy>,
    aabb: &AABB,
    found: &mut Vec<ColliderKey>,
) {
    for proxy in sorted {
        if proxy.aabb.min.x > aabb.max.x {
            break;
        }
        if proxy.aabb.overlaps(aabb) {
            found.push(proxy.key);
        }
    }
}

//
// Brute force
//

/// Sweep and prune that re-sorts every proxy whenever anything changed.
///
/// Cheap to modify, best when most proxies move every step anyway.
#[derive(Clone, Debug)]
pub struct BruteForceSap {
    params: BroadPhaseParams,
    proxies: HashMap<ColliderKey, AABB>,
    sorted: Vec<SapProxy>,
    dirty: bool,
}

impl Default for BruteForceSap {
    fn default() -> Self {
        Self::build(BroadPhaseParams::default())
    }
}

impl BruteForceSap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: BroadPhaseParams) -> Result<Self, CollisionError> {
        params.validate()?;
        Ok(Self::build(params))
    }

    fn build(params: BroadPhaseParams) -> Self {
        Self {
            params,
            proxies: HashMap::with_capacity(params.initial_capacity),
            sorted: Vec::with_capacity(params.initial_capacity),
            dirty: false,
        }
    }

    fn ensure_sorted(&mut self) {
        if !self.dirty {
            return;
        }
        self.sorted.clear();
        self.sorted.extend(
            self.proxies
                .iter()
                .map(|(&key, &aabb)| SapProxy { key, aabb }),
        );
        // keys are unique so no two proxies compare equal
        self.sorted.sort_unstable();
        self.dirty = false;
    }
}

impl BroadPhase for BruteForceSap {
    fn add(&mut self, coll: ColliderRef<'_>) {
        let aabb = coll.collider.aabb().expanded(self.params.aabb_expansion);
        self.proxies.insert(coll.key, aabb);
        self.dirty = true;
    }

    fn remove(&mut self, key: ColliderKey) -> bool {
        let existed = self.proxies.remove(&key).is_some();
        self.dirty |= existed;
        existed
    }

    fn update(&mut self, coll: ColliderRef<'_>) {
        let Some(cached) = self.proxies.get_mut(&coll.key) else {
            self.add(coll);
            return;
        };
        if let Some(aabb) = refreshed_aabb(cached, coll.collider, self.params.aabb_expansion) {
            *cached = aabb;
            self.dirty = true;
        }
    }

    fn clear(&mut self) {
        self.proxies.clear();
        self.sorted.clear();
        self.dirty = false;
    }

    fn aabb(&self, key: ColliderKey) -> Option<AABB> {
        self.proxies.get(&key).copied()
    }

    fn len(&self) -> usize {
        self.proxies.len()
    }

    fn detect(&mut self) -> Vec<BroadPhasePair> {
        tracy_span!("BruteForceSap::detect");

        self.ensure_sorted();
        let mut pairs = Vec::with_capacity(self.params.pair_capacity(self.sorted.len()));
        for (i, proxy) in self.sorted.iter().enumerate() {
            sweep_from(proxy, self.sorted[i + 1..].iter(), &mut pairs);
        }
        pairs
    }

    fn detect_aabb(&mut self, aabb: &AABB) -> Vec<ColliderKey> {
        self.ensure_sorted();
        let mut found = Vec::with_capacity(self.params.query_capacity(self.sorted.len()));
        sweep_query(self.sorted.iter(), aabb, &mut found);
        found
    }

    fn shift_coordinates(&mut self, shift: m::Vec2) {
        for aabb in self.proxies.values_mut() {
            *aabb = aabb.translated(shift);
        }
        self.dirty = true;
    }

    fn aabb_expansion(&self) -> f64 {
        self.params.aabb_expansion
    }

    fn set_aabb_expansion(&mut self, expansion: f64) -> Result<(), CollisionError> {
        self.params.aabb_expansion = check_expansion(expansion)?;
        Ok(())
    }
}

//
// Incremental
//

/// Sweep and prune that keeps proxies in an ordered set,
/// moving only the proxies that actually changed.
///
/// Best when most proxies stay inside their fattened boxes between steps.
#[derive(Clone, Debug)]
pub struct IncrementalSap {
    params: BroadPhaseParams,
    proxies: HashMap<ColliderKey, AABB>,
    sorted: BTreeSet<SapProxy>,
}

impl Default for IncrementalSap {
    fn default() -> Self {
        Self::build(BroadPhaseParams::default())
    }
}

impl IncrementalSap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: BroadPhaseParams) -> Result<Self, CollisionError> {
        params.validate()?;
        Ok(Self::build(params))
    }

    fn build(params: BroadPhaseParams) -> Self {
        Self {
            params,
            proxies: HashMap::with_capacity(params.initial_capacity),
            sorted: BTreeSet::new(),
        }
    }

    fn replace(&mut self, key: ColliderKey, aabb: AABB) {
        if let Some(old) = self.proxies.insert(key, aabb) {
            self.sorted.remove(&SapProxy { key, aabb: old });
        }
        self.sorted.insert(SapProxy { key, aabb });
    }
}

impl BroadPhase for IncrementalSap {
    fn add(&mut self, coll: ColliderRef<'_>) {
        let aabb = coll.collider.aabb().expanded(self.params.aabb_expansion);
        self.replace(coll.key, aabb);
    }

    fn remove(&mut self, key: ColliderKey) -> bool {
        match self.proxies.remove(&key) {
            Some(aabb) => {
                self.sorted.remove(&SapProxy { key, aabb });
                true
            }
            None => false,
        }
    }

    fn update(&mut self, coll: ColliderRef<'_>) {
        let Some(cached) = self.proxies.get(&coll.key) else {
            self.add(coll);
            return;
        };
        if let Some(aabb) = refreshed_aabb(cached, coll.collider, self.params.aabb_expansion) {
            self.replace(coll.key, aabb);
        }
    }

    fn clear(&mut self) {
        self.proxies.clear();
        self.sorted.clear();
    }

    fn aabb(&self, key: ColliderKey) -> Option<AABB> {
        self.proxies.get(&key).copied()
    }

    fn len(&self) -> usize {
        self.proxies.len()
    }

    fn detect(&mut self) -> Vec<BroadPhasePair> {
        tracy_span!("IncrementalSap::detect");

        let mut pairs = Vec::with_capacity(self.params.pair_capacity(self.sorted.len()));
        for proxy in &self.sorted {
            let rest = self
                .sorted
                .range((Bound::Excluded(*proxy), Bound::Unbounded));
            sweep_from(proxy, rest, &mut pairs);
        }
        pairs
    }

    fn detect_aabb(&mut self, aabb: &AABB) -> Vec<ColliderKey> {
        let mut found = Vec::with_capacity(self.params.query_capacity(self.sorted.len()));
        sweep_query(self.sorted.iter(), aabb, &mut found);
        found
    }

    fn shift_coordinates(&mut self, shift: m::Vec2) {
        for aabb in self.proxies.values_mut() {
            *aabb = aabb.translated(shift);
        }
        self.sorted = self
            .proxies
            .iter()
            .map(|(&key, &aabb)| SapProxy { key, aabb })
            .collect();
    }

    fn aabb_expansion(&self) -> f64 {
        self.params.aabb_expansion
    }

    fn set_aabb_expansion(&mut self, expansion: f64) -> Result<(), CollisionError> {
        self.params.aabb_expansion = check_expansion(expansion)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Collider, ColliderSet, ColliderShape};
    use crate::math::PoseBuilder;
    use itertools::assert_equal;

    #[test]
    fn incremental_order_follows_updates() {
        let mut set = ColliderSet::new();
        let shape = ColliderShape::new_square(1.0).unwrap();
        let keys: Vec<ColliderKey> = [0.0, 5.0, 10.0]
            .iter()
            .map(|&x| {
                set.insert(Collider::single(
                    shape.clone(),
                    PoseBuilder::new().with_position([x, 0.0]),
                ))
            })
            .collect();
        let mut sap = IncrementalSap::new();
        for coll in set.iter() {
            sap.add(coll);
        }
        assert_equal(sap.sorted.iter().map(|p| p.key), keys.iter().copied());

        // move the first box past the last one
        set.get_mut(keys[0]).unwrap().pose.translation = m::Vec2::new(20.0, 0.0);
        sap.update(set.get_ref(keys[0]).unwrap());
        assert_equal(
            sap.sorted.iter().map(|p| p.key),
            [keys[1], keys[2], keys[0]],
        );
        assert_eq!(sap.sorted.len(), sap.proxies.len());
    }

    #[test]
    fn brute_force_sorts_lazily() {
        let mut set = ColliderSet::new();
        let shape = ColliderShape::new_circle(1.0).unwrap();
        let right = set.insert(Collider::single(
            shape.clone(),
            PoseBuilder::new().with_position([1.5, 0.0]),
        ));
        let left = set.insert(Collider::single(shape, PoseBuilder::new()));
        let mut sap = BruteForceSap::new();
        for coll in set.iter() {
            sap.add(coll);
        }
        assert!(sap.dirty);
        assert_eq!(sap.detect(), vec![BroadPhasePair::new(left, right)]);
        assert!(!sap.dirty);
        assert_equal(sap.sorted.iter().map(|p| p.key), [left, right]);
    }
}
