//! Routing shape pairs that one algorithm handles badly to another.

use super::{DistanceDetector, Gjk, NarrowPhase, Penetration, Sat, Separation};
use crate::{
    collision::{ColliderShape, ShapeKind},
    math::Pose,
};

/// Which shape pairs a [`FallbackCondition`] applies to.
#[derive(Clone, Copy, Debug)]
pub enum FallbackMatch {
    /// Either shape is of this kind.
    Single(ShapeKind),
    /// One shape of each kind, in either order.
    Pairwise(ShapeKind, ShapeKind),
    Custom(fn(ShapeKind, ShapeKind) -> bool),
}

impl FallbackMatch {
    pub fn is_match(&self, kind1: ShapeKind, kind2: ShapeKind) -> bool {
        match *self {
            FallbackMatch::Single(k) => kind1 == k || kind2 == k,
            FallbackMatch::Pairwise(a, b) => {
                (kind1 == a && kind2 == b) || (kind1 == b && kind2 == a)
            }
            FallbackMatch::Custom(f) => f(kind1, kind2),
        }
    }
}

/// A rule sending matching shape pairs to the fallback detector.
///
/// Conditions are checked in ascending `sort_index` order.
#[derive(Clone, Copy, Debug)]
pub struct FallbackCondition {
    pub matcher: FallbackMatch,
    pub sort_index: i32,
}

impl FallbackCondition {
    pub fn single(kind: ShapeKind, sort_index: i32) -> Self {
        Self {
            matcher: FallbackMatch::Single(kind),
            sort_index,
        }
    }

    pub fn pairwise(kind1: ShapeKind, kind2: ShapeKind, sort_index: i32) -> Self {
        Self {
            matcher: FallbackMatch::Pairwise(kind1, kind2),
            sort_index,
        }
    }

    pub fn custom(f: fn(ShapeKind, ShapeKind) -> bool, sort_index: i32) -> Self {
        Self {
            matcher: FallbackMatch::Custom(f),
            sort_index,
        }
    }

    #[inline]
    pub fn is_match(&self, shape1: &ColliderShape, shape2: &ColliderShape) -> bool {
        self.matcher.is_match(shape1.kind(), shape2.kind())
    }
}

/// A pair of narrow phases, using the fallback for shape pairs
/// matched by any of its conditions and the primary for everything else.
#[derive(Clone, Debug, Default)]
pub struct FallbackNarrowPhase<P = Gjk, F = Sat> {
    primary: P,
    fallback: F,
    conditions: Vec<FallbackCondition>,
}

impl<P, F> FallbackNarrowPhase<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary,
            fallback,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: FallbackCondition) -> Self {
        self.add_condition(condition);
        self
    }

    /// Insert a condition, keeping the list sorted.
    /// Conditions with equal sort indices keep their insertion order.
    pub fn add_condition(&mut self, condition: FallbackCondition) {
        let at = self
            .conditions
            .partition_point(|c| c.sort_index <= condition.sort_index);
        self.conditions.insert(at, condition);
    }

    pub fn clear_conditions(&mut self) {
        self.conditions.clear();
    }

    pub fn conditions(&self) -> &[FallbackCondition] {
        &self.conditions
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    /// The first matching condition, if any.
    pub fn matching_condition(
        &self,
        shape1: &ColliderShape,
        shape2: &ColliderShape,
    ) -> Option<&FallbackCondition> {
        self.conditions.iter().find(|c| c.is_match(shape1, shape2))
    }

    #[inline]
    pub fn is_fallback_required(&self, shape1: &ColliderShape, shape2: &ColliderShape) -> bool {
        self.matching_condition(shape1, shape2).is_some()
    }
}

impl<P: NarrowPhase, F: NarrowPhase> FallbackNarrowPhase<P, F> {
    fn select(&self, shape1: &ColliderShape, shape2: &ColliderShape) -> &dyn NarrowPhase {
        if self.is_fallback_required(shape1, shape2) {
            &self.fallback
        } else {
            &self.primary
        }
    }
}

impl<P: NarrowPhase, F: NarrowPhase> NarrowPhase for FallbackNarrowPhase<P, F> {
    fn detect(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> bool {
        self.select(shape1, shape2)
            .detect(shape1, pose1, shape2, pose2)
    }

    fn penetration(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> Option<Penetration> {
        self.select(shape1, shape2)
            .penetration(shape1, pose1, shape2, pose2)
    }
}

impl<P, F> DistanceDetector for FallbackNarrowPhase<P, F>
where
    P: DistanceDetector,
    F: DistanceDetector,
{
    fn distance(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> Option<Separation> {
        if self.is_fallback_required(shape1, shape2) {
            self.fallback.distance(shape1, pose1, shape2, pose2)
        } else {
            self.primary.distance(shape1, pose1, shape2, pose2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::narrowphase::GjkParams;
    use crate::math::{self as m, Unit};

    /// Reports a fixed depth so tests can tell which detector answered.
    struct Tagged(f64);

    impl NarrowPhase for Tagged {
        fn detect(&self, _: &ColliderShape, _: &Pose, _: &ColliderShape, _: &Pose) -> bool {
            true
        }

        fn penetration(
            &self,
            _: &ColliderShape,
            _: &Pose,
            _: &ColliderShape,
            _: &Pose,
        ) -> Option<Penetration> {
            Some(Penetration {
                normal: Unit::unit_x(),
                depth: self.0,
            })
        }
    }

    fn depth(np: &impl NarrowPhase, s1: &ColliderShape, s2: &ColliderShape) -> f64 {
        let pose = Pose::identity();
        np.penetration(s1, &pose, s2, &pose).unwrap().depth
    }

    #[test]
    fn routes_matching_pairs() {
        let circle = ColliderShape::new_circle(1.0).unwrap();
        let rect = ColliderShape::new_rect(1.0, 2.0).unwrap();
        let capsule = ColliderShape::new_capsule(1.0, 0.5).unwrap();

        let np = FallbackNarrowPhase::new(Tagged(1.0), Tagged(2.0))
            .with_condition(FallbackCondition::pairwise(ShapeKind::Rect, ShapeKind::Circle, 0));
        assert_eq!(depth(&np, &circle, &rect), 2.0);
        assert_eq!(depth(&np, &rect, &circle), 2.0);
        assert_eq!(depth(&np, &rect, &rect), 1.0);
        assert_eq!(depth(&np, &capsule, &circle), 1.0);

        let np = np.with_condition(FallbackCondition::single(ShapeKind::Capsule, 1));
        assert_eq!(depth(&np, &capsule, &circle), 2.0);
        assert_eq!(depth(&np, &rect, &capsule), 2.0);

        fn same_kind(a: ShapeKind, b: ShapeKind) -> bool {
            a == b
        }
        let np = np.with_condition(FallbackCondition::custom(same_kind, 2));
        assert_eq!(depth(&np, &rect, &rect), 2.0);
        assert_eq!(depth(&np, &circle, &circle), 2.0);
    }

    #[test]
    fn conditions_stay_sorted_and_stable() {
        let mut np = FallbackNarrowPhase::new(Tagged(1.0), Tagged(2.0));
        np.add_condition(FallbackCondition::single(ShapeKind::Rect, 5));
        np.add_condition(FallbackCondition::single(ShapeKind::Circle, -1));
        np.add_condition(FallbackCondition::single(ShapeKind::Segment, 5));
        np.add_condition(FallbackCondition::single(ShapeKind::Capsule, 2));

        let indices: Vec<i32> = np.conditions().iter().map(|c| c.sort_index).collect();
        assert_eq!(indices, vec![-1, 2, 5, 5]);
        assert!(matches!(
            np.conditions()[2].matcher,
            FallbackMatch::Single(ShapeKind::Rect)
        ));
        assert!(matches!(
            np.conditions()[3].matcher,
            FallbackMatch::Single(ShapeKind::Segment)
        ));

        // the lowest index wins when several match
        let circle = ColliderShape::new_circle(1.0).unwrap();
        let rect = ColliderShape::new_rect(1.0, 1.0).unwrap();
        assert_eq!(np.matching_condition(&rect, &circle).unwrap().sort_index, -1);

        np.clear_conditions();
        assert!(!np.is_fallback_required(&rect, &circle));
    }

    #[test]
    fn gjk_with_sat_fallback() {
        let np = FallbackNarrowPhase::<Gjk, Sat>::default()
            .with_condition(FallbackCondition::single(ShapeKind::Capsule, 0));
        let capsule = ColliderShape::new_capsule(2.0, 0.5).unwrap();
        let p1 = Pose::identity();
        let p2 = Pose::new(m::Vec2::new(0.0, 0.8), m::Rotor2::identity());
        let pen = np.penetration(&capsule, &p1, &capsule, &p2).unwrap();
        assert!((pen.depth - 0.2).abs() < 1e-9);
        assert!(np.detect(&capsule, &p1, &capsule, &p2));
    }

    #[test]
    fn distance_routes_like_penetration() {
        let strict = Gjk::with_params(
            GjkParams {
                max_iterations: 5,
                ..Default::default()
            },
            Default::default(),
        )
        .unwrap();
        let np = FallbackNarrowPhase::new(Gjk::new(), strict)
            .with_condition(FallbackCondition::single(ShapeKind::Circle, 0));
        assert!(np.is_fallback_required(
            &ColliderShape::new_circle(1.0).unwrap(),
            &ColliderShape::new_rect(1.0, 1.0).unwrap()
        ));

        let rect = ColliderShape::new_rect(2.0, 2.0).unwrap();
        let p1 = Pose::identity();
        let p2 = Pose::new(m::Vec2::new(3.0, 0.0), m::Rotor2::identity());
        let sep = np.distance(&rect, &p1, &rect, &p2).unwrap();
        assert!((sep.distance - 1.0).abs() < 1e-9);
        assert!((*sep.normal - m::Vec2::new(1.0, 0.0)).mag() < 1e-9);

        let circle = ColliderShape::new_circle(0.5).unwrap();
        let sep = np.distance(&circle, &p1, &circle, &p2).unwrap();
        assert!((sep.distance - 2.0).abs() < 1e-9);
        assert!(np.distance(&circle, &p1, &rect, &p1).is_none());
    }
}
