//! Exact intersection tests between pairs of convex shapes.
//!
//! Every result is expressed with the normal pointing from the first shape towards the second.

use super::{ColliderShape, Ray};
use crate::math::{self as m, Pose, Unit};

mod circle;

mod gjk;
pub use gjk::{Gjk, GjkParams};

mod epa;
pub use epa::EpaParams;

mod sat;
pub use sat::Sat;

mod fallback;
pub use fallback::{FallbackCondition, FallbackMatch, FallbackNarrowPhase};

/// The smallest number of iterations any of the iterative algorithms may be configured with.
pub const MIN_ITERATIONS: usize = 5;

/// Default convergence tolerance of the iterative algorithms.
#[inline]
pub(crate) fn default_distance_epsilon() -> f64 {
    m::EPSILON.cbrt()
}

/// How deep two overlapping shapes are inside each other.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penetration {
    /// Direction to move the second shape to separate them.
    pub normal: Unit<m::Vec2>,
    pub depth: f64,
}

impl Penetration {
    /// The same penetration seen from the other shape.
    pub fn flipped(self) -> Self {
        Penetration {
            normal: -self.normal,
            depth: self.depth,
        }
    }
}

/// The gap between two shapes that don't overlap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Separation {
    /// Direction from the first shape's closest point to the second's.
    pub normal: Unit<m::Vec2>,
    pub distance: f64,
    /// Closest points on the first and second shape, in world space.
    pub points: [m::Vec2; 2],
}

impl Separation {
    pub fn flipped(self) -> Self {
        Separation {
            normal: -self.normal,
            distance: self.distance,
            points: [self.points[1], self.points[0]],
        }
    }
}

/// Where a ray first hits a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit {
    pub point: m::Vec2,
    /// Surface normal at the hit point, facing the ray.
    pub normal: Unit<m::Vec2>,
    /// Distance travelled along the ray.
    pub distance: f64,
}

/// A narrow phase algorithm, answering whether and how deeply two shapes overlap.
pub trait NarrowPhase: Send + Sync {
    fn detect(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> bool;

    fn penetration(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> Option<Penetration>;
}

/// Closest-point queries between shapes that don't overlap.
pub trait DistanceDetector: Send + Sync {
    /// `None` if the shapes overlap or touch.
    fn distance(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> Option<Separation>;
}

pub trait RaycastDetector: Send + Sync {
    /// Cast a ray against a single shape.
    ///
    /// A non-positive `max_length` means the ray is unbounded.
    /// Rays starting inside the shape don't hit it.
    fn raycast(
        &self,
        ray: Ray,
        max_length: f64,
        shape: &ColliderShape,
        pose: &Pose,
    ) -> Option<RaycastHit>;
}
