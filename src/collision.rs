//! Everything involved in finding out which shapes touch and how.
//!
//! Data flows through the submodules in the order they are declared below:
//! shapes and colliders are fed to a [`BroadPhase`][broadphase::BroadPhase] for candidate pairs,
//! which a [`NarrowPhase`][narrowphase::NarrowPhase] confirms and measures,
//! and a [`ManifoldSolver`][manifold::ManifoldSolver] turns into contact points.
//! [`ccd`] handles shapes moving too fast for that pipeline to catch.

use crate::math::{self as m, Unit};

mod aabb;
pub use aabb::AABB;

mod shape;
pub use shape::{ColliderShape, EdgeFeature, Feature, Interval, ShapeKind, Vertex};

mod polygon;
pub use polygon::ConvexPolygon;

mod collider;
pub use collider::{Collider, ColliderKey, ColliderSet, Fixture};

pub mod broadphase;
pub mod ccd;
pub mod manifold;
pub mod narrowphase;
pub mod pipeline;

/// A ray, used for raycast queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub start: m::Vec2,
    pub dir: Unit<m::Vec2>,
}

impl Ray {
    pub fn new(start: m::Vec2, dir: Unit<m::Vec2>) -> Self {
        Ray { start, dir }
    }

    /// The point `t` units of length along the ray.
    #[inline]
    pub fn point_at(&self, t: f64) -> m::Vec2 {
        self.start + t * *self.dir
    }
}

/// A collider borrowed from a [`ColliderSet`] together with its key.
#[derive(Clone, Copy, Debug)]
pub struct ColliderRef<'a> {
    pub key: ColliderKey,
    pub collider: &'a Collider,
}
