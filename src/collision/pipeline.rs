//! Running every stage of collision detection over a set of colliders.

use std::collections::HashSet;

use itertools::iproduct;

use super::{
    broadphase::{BroadPhase, BroadPhasePair, DynamicTree},
    manifold::{ClippingManifoldSolver, Manifold, ManifoldSolver},
    narrowphase::{Gjk, NarrowPhase, Penetration},
    ColliderKey, ColliderSet,
};

/// Contact between one fixture of each collider in a pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPair {
    pub pair: BroadPhasePair,
    /// Indices of the touching fixtures in `pair.first` and `pair.second`.
    pub fixtures: [usize; 2],
    /// Normal pointing from `pair.first` towards `pair.second`.
    pub penetration: Penetration,
    pub manifold: Manifold,
}

/// Broad phase, narrow phase and manifold generation bundled together.
///
/// The pipeline remembers which colliders it has seen,
/// so it can be handed the same [`ColliderSet`] every step
/// and keep the broad phase in sync with insertions and removals.
#[derive(Clone, Debug, Default)]
pub struct CollisionPipeline<B = DynamicTree, N = Gjk, M = ClippingManifoldSolver> {
    broad_phase: B,
    narrow_phase: N,
    manifold_solver: M,
    known: HashSet<ColliderKey>,
}

impl<B, N, M> CollisionPipeline<B, N, M>
where
    B: BroadPhase,
    N: NarrowPhase,
    M: ManifoldSolver,
{
    pub fn new(broad_phase: B, narrow_phase: N, manifold_solver: M) -> Self {
        Self {
            broad_phase,
            narrow_phase,
            manifold_solver,
            known: HashSet::new(),
        }
    }

    pub fn broad_phase(&self) -> &B {
        &self.broad_phase
    }

    pub fn broad_phase_mut(&mut self) -> &mut B {
        &mut self.broad_phase
    }

    pub fn narrow_phase(&self) -> &N {
        &self.narrow_phase
    }

    pub fn manifold_solver(&self) -> &M {
        &self.manifold_solver
    }

    /// Bring the broad phase up to date with the collider set:
    /// add new colliders, refresh existing ones and drop removed ones.
    pub fn sync(&mut self, colliders: &ColliderSet) {
        let mut seen = HashSet::with_capacity(colliders.len());
        for coll in colliders.iter() {
            if self.known.contains(&coll.key) {
                self.broad_phase.update(coll);
            } else {
                self.broad_phase.add(coll);
            }
            seen.insert(coll.key);
        }
        for gone in self.known.difference(&seen) {
            self.broad_phase.remove(*gone);
        }
        self.known = seen;
    }

    /// Forget every collider.
    pub fn clear(&mut self) {
        self.broad_phase.clear();
        self.known.clear();
    }

    /// Sync with the collider set and find every contact between fixtures.
    pub fn detect(&mut self, colliders: &ColliderSet) -> Vec<ContactPair> {
        tracy_span!("CollisionPipeline::detect");

        self.sync(colliders);
        let pairs = self.broad_phase.detect();
        let narrow_phase = &self.narrow_phase;
        let solver = &self.manifold_solver;

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            pairs
                .par_iter()
                .flat_map(|pair| pair_contacts(narrow_phase, solver, colliders, *pair))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            pairs
                .iter()
                .flat_map(|pair| pair_contacts(narrow_phase, solver, colliders, *pair))
                .collect()
        }
    }
}

fn pair_contacts<N: NarrowPhase, M: ManifoldSolver>(
    narrow_phase: &N,
    solver: &M,
    colliders: &ColliderSet,
    pair: BroadPhasePair,
) -> Vec<ContactPair> {
    let (Some(c1), Some(c2)) = (colliders.get(pair.first), colliders.get(pair.second)) else {
        log::trace!("broad phase pair refers to a removed collider");
        return Vec::new();
    };

    let mut contacts = Vec::new();
    for ((i1, f1), (i2, f2)) in iproduct!(
        c1.fixtures.iter().enumerate(),
        c2.fixtures.iter().enumerate()
    ) {
        let pose1 = c1.fixture_pose(f1);
        let pose2 = c2.fixture_pose(f2);
        if !f1.shape.aabb(&pose1).overlaps(&f2.shape.aabb(&pose2)) {
            continue;
        }
        let Some(penetration) = narrow_phase.penetration(&f1.shape, &pose1, &f2.shape, &pose2)
        else {
            continue;
        };
        let manifold = solver.manifold(&penetration, &f1.shape, &pose1, &f2.shape, &pose2);
        contacts.push(ContactPair {
            pair,
            fixtures: [i1, i2],
            penetration,
            manifold,
        });
    }
    contacts
}
