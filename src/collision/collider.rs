use super::{ColliderRef, ColliderShape, AABB};
use crate::math::Pose;

use thunderdome as td;

/// A shape attached to a collider at some offset.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Fixture {
    pub shape: ColliderShape,
    #[cfg_attr(
        feature = "serde-types",
        serde(with = "crate::math::serde_pose", default = "Pose::identity")
    )]
    pub offset: Pose,
}

impl Fixture {
    pub fn new(shape: ColliderShape) -> Self {
        Fixture {
            shape,
            offset: Pose::identity(),
        }
    }

    pub fn with_offset(mut self, offset: impl Into<Pose>) -> Self {
        self.offset = offset.into();
        self
    }
}

/// An object that can collide with others,
/// made of one or more convex fixtures moving together.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Collider {
    #[cfg_attr(
        feature = "serde-types",
        serde(with = "crate::math::serde_pose", default = "Pose::identity")
    )]
    pub pose: Pose,
    pub fixtures: Vec<Fixture>,
}

impl Collider {
    pub fn new(pose: impl Into<Pose>) -> Self {
        Collider {
            pose: pose.into(),
            fixtures: Vec::new(),
        }
    }

    /// A collider with a single fixture at its origin.
    pub fn single(shape: ColliderShape, pose: impl Into<Pose>) -> Self {
        Self::new(pose).with_fixture(Fixture::new(shape))
    }

    pub fn with_fixture(mut self, fixture: Fixture) -> Self {
        self.fixtures.push(fixture);
        self
    }

    /// World-space pose of one of this collider's fixtures.
    #[inline]
    pub fn fixture_pose(&self, fixture: &Fixture) -> Pose {
        self.pose * fixture.offset
    }

    /// Union of the bounding boxes of every fixture.
    ///
    /// A collider without fixtures has a zero-size box at its position.
    pub fn aabb(&self) -> AABB {
        self.fixtures
            .iter()
            .map(|f| f.shape.aabb(&self.fixture_pose(f)))
            .reduce(|acc, aabb| acc.union(&aabb))
            .unwrap_or_else(|| AABB::at_point(self.pose.translation))
    }

    /// Maximum distance of any fixture point from the collider's origin.
    pub fn radius(&self) -> f64 {
        self.fixtures
            .iter()
            .map(|f| f.offset.translation.mag() + f.shape.radius())
            .fold(0.0, f64::max)
    }
}

/// Key type to look up a collider stored in a [`ColliderSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColliderKey(pub(super) td::Index);

impl ColliderKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from colliders to other things.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

impl PartialOrd for ColliderKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ColliderKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.to_bits().cmp(&other.0.to_bits())
    }
}

/// Storage for colliders, handing out stable generational keys.
#[derive(Clone, Debug, Default)]
pub struct ColliderSet {
    colliders: td::Arena<Collider>,
}

impl ColliderSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, collider: Collider) -> ColliderKey {
        ColliderKey(self.colliders.insert(collider))
    }

    #[inline]
    pub fn remove(&mut self, key: ColliderKey) -> Option<Collider> {
        self.colliders.remove(key.0)
    }

    #[inline]
    pub fn get(&self, key: ColliderKey) -> Option<&Collider> {
        self.colliders.get(key.0)
    }

    #[inline]
    pub fn get_mut(&mut self, key: ColliderKey) -> Option<&mut Collider> {
        self.colliders.get_mut(key.0)
    }

    #[inline]
    pub fn get_ref(&self, key: ColliderKey) -> Option<ColliderRef<'_>> {
        self.get(key).map(|collider| ColliderRef { key, collider })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ColliderRef<'_>> + '_ {
        self.colliders.iter().map(|(idx, collider)| ColliderRef {
            key: ColliderKey(idx),
            collider,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ColliderKey, &mut Collider)> + '_ {
        self.colliders
            .iter_mut()
            .map(|(idx, collider)| (ColliderKey(idx), collider))
    }
}
