//! Collision detection for 2D convex shapes:
//! broad phase pair finding, exact narrow phase tests,
//! contact manifold generation and continuous collision detection.

/// Open a profiling span for the rest of the enclosing scope
/// when the `tracy` feature is enabled.
macro_rules! tracy_span {
    ($name:literal) => {
        #[cfg(feature = "tracy")]
        let _span = tracy_client::span!($name);
    };
}

pub mod math;
#[cfg(feature = "serde-types")]
pub use math::serde_pose;
pub use math::{uv, Angle, Pose, PoseBuilder, Rotor2, Unit, Vec2};

pub mod error;
pub use error::CollisionError;

pub mod collision;
pub use collision::{
    broadphase::{
        BroadPhase, BroadPhaseParams, BroadPhasePair, BruteForceSap, DynamicTree, IncrementalSap,
    },
    ccd::{
        CcdParams, ConservativeAdvancement, MovingShape, TimeInterval, TimeOfImpact,
        TimeOfImpactDetector, ToiResult, Velocity,
    },
    manifold::{
        ClippingManifoldSolver, Manifold, ManifoldPoint, ManifoldPointId, ManifoldPoints,
        ManifoldSolver,
    },
    narrowphase::{
        DistanceDetector, EpaParams, FallbackCondition, FallbackMatch, FallbackNarrowPhase, Gjk,
        GjkParams, NarrowPhase, Penetration, RaycastDetector, RaycastHit, Sat, Separation,
    },
    pipeline::{CollisionPipeline, ContactPair},
    Collider, ColliderKey, ColliderRef, ColliderSet, ColliderShape, ConvexPolygon, Feature,
    Fixture, Interval, Ray, ShapeKind, AABB,
};
