//! Continuous collision detection: when, during a motion,
//! two shapes first come into contact.

use super::{
    narrowphase::{default_distance_epsilon, DistanceDetector, Gjk, Separation, MIN_ITERATIONS},
    ColliderShape,
};
use crate::{
    error::{check_iterations, check_positive, CollisionError},
    math::{self as m, Pose},
};

/// Velocity of an object.
///
/// In time of impact queries this is the total motion over the queried interval,
/// i.e. the displacement and rotation from time 0 to time 1.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Velocity {
    pub linear: m::Vec2,
    /// Angular velocity in radians, counter-clockwise.
    pub angular: f64,
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity {
            linear: m::Vec2::zero(),
            angular: 0.0,
        }
    }
}

impl Velocity {
    pub fn new(linear: impl Into<m::Vec2>, angular: f64) -> Self {
        Velocity {
            linear: linear.into(),
            angular,
        }
    }

    /// The motion taking `start` to `end`, rotating the shorter way around.
    pub fn between(start: &Pose, end: &Pose) -> Self {
        Velocity {
            linear: end.translation - start.translation,
            angular: m::wrap_angle(m::pose_angle(end) - m::pose_angle(start)),
        }
    }

    /// Get the linear velocity of a point offset from the pose's origin.
    pub fn point_velocity(&self, offset: m::Vec2) -> m::Vec2 {
        let tangent = m::left_normal(offset) * self.angular;
        self.linear + tangent
    }

    pub fn apply_to_pose(&self, dt: f64, mut pose: Pose) -> Pose {
        let scaled = *self * dt;
        pose.append_translation(scaled.linear);
        pose.prepend_rotation(m::Angle::Rad(scaled.angular).into());
        pose
    }
}

impl std::ops::Add for Velocity {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            linear: self.linear + other.linear,
            angular: self.angular + other.angular,
        }
    }
}
impl std::ops::AddAssign for Velocity {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
impl std::ops::Mul<f64> for Velocity {
    type Output = Velocity;

    fn mul(self, rhs: f64) -> Self::Output {
        Velocity {
            linear: self.linear * rhs,
            angular: self.angular * rhs,
        }
    }
}

/// The pose at time `t` of a shape starting at `pose` and moving by `motion` over unit time.
#[inline]
pub fn lerp_pose(pose: &Pose, motion: &Velocity, t: f64) -> Pose {
    motion.apply_to_pose(t, *pose)
}

/// Interpolate between two poses, rotating the shorter way around.
pub fn lerp_between(start: &Pose, end: &Pose, t: f64) -> Pose {
    lerp_pose(start, &Velocity::between(start, end), t)
}

//
// Queries
//

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CcdParams {
    pub max_iterations: usize,
    /// Shapes closer than this count as touching.
    pub distance_epsilon: f64,
}

impl Default for CcdParams {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            distance_epsilon: default_distance_epsilon(),
        }
    }
}

impl CcdParams {
    pub fn validate(&self) -> Result<(), CollisionError> {
        check_iterations(self.max_iterations, MIN_ITERATIONS)?;
        check_positive(self.distance_epsilon, CollisionError::InvalidEpsilon)?;
        Ok(())
    }
}

/// A part of the unit time interval over which motions are given.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeInterval {
    start: f64,
    end: f64,
}

impl TimeInterval {
    pub const FULL: TimeInterval = TimeInterval {
        start: 0.0,
        end: 1.0,
    };

    pub fn new(start: f64, end: f64) -> Result<Self, CollisionError> {
        if (0.0..=1.0).contains(&start) && (0.0..=1.0).contains(&end) && start <= end {
            Ok(TimeInterval { start, end })
        } else {
            Err(CollisionError::InvalidInterval(start, end))
        }
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }
}

impl Default for TimeInterval {
    fn default() -> Self {
        Self::FULL
    }
}

/// A shape at its starting pose along with its motion over unit time.
#[derive(Clone, Copy, Debug)]
pub struct MovingShape<'a> {
    pub shape: &'a ColliderShape,
    pub pose: Pose,
    pub motion: Velocity,
}

impl<'a> MovingShape<'a> {
    pub fn new(shape: &'a ColliderShape, pose: impl Into<Pose>, motion: Velocity) -> Self {
        Self {
            shape,
            pose: pose.into(),
            motion,
        }
    }

    pub fn stationary(shape: &'a ColliderShape, pose: impl Into<Pose>) -> Self {
        Self::new(shape, pose, Velocity::default())
    }

    #[inline]
    pub fn pose_at(&self, t: f64) -> Pose {
        lerp_pose(&self.pose, &self.motion, t)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeOfImpact {
    /// Fraction of the motion at which the shapes touch.
    pub time: f64,
    /// Separation at that time.
    /// `None` if the shapes were found overlapping by less than the tolerance.
    pub separation: Option<Separation>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToiResult {
    Impact(TimeOfImpact),
    /// The shapes don't touch during the interval,
    /// or they already overlap at its start.
    NoImpact,
    /// The iteration limit ran out before the shapes got close enough.
    Inconclusive,
}

impl ToiResult {
    pub fn impact(&self) -> Option<&TimeOfImpact> {
        match self {
            ToiResult::Impact(toi) => Some(toi),
            _ => None,
        }
    }
}

pub trait TimeOfImpactDetector: Send + Sync {
    fn time_of_impact(
        &self,
        shape1: &MovingShape,
        shape2: &MovingShape,
        interval: TimeInterval,
    ) -> ToiResult;
}

/// Time of impact by conservative advancement: repeatedly step forward
/// by the current distance over an upper bound on the closing speed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConservativeAdvancement<D = Gjk> {
    detector: D,
    params: CcdParams,
}

impl<D: DistanceDetector> ConservativeAdvancement<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            params: CcdParams::default(),
        }
    }

    pub fn with_params(detector: D, params: CcdParams) -> Result<Self, CollisionError> {
        params.validate()?;
        Ok(Self { detector, params })
    }

    pub fn params(&self) -> &CcdParams {
        &self.params
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Time of impact over the full interval for shapes moving from `start` to `end` poses.
    pub fn time_of_impact_between(
        &self,
        shape1: &ColliderShape,
        start1: &Pose,
        end1: &Pose,
        shape2: &ColliderShape,
        start2: &Pose,
        end2: &Pose,
    ) -> ToiResult {
        self.time_of_impact(
            &MovingShape::new(shape1, *start1, Velocity::between(start1, end1)),
            &MovingShape::new(shape2, *start2, Velocity::between(start2, end2)),
            TimeInterval::FULL,
        )
    }

    fn distance_at(&self, shape1: &MovingShape, shape2: &MovingShape, t: f64) -> Option<Separation> {
        self.detector.distance(
            shape1.shape,
            &shape1.pose_at(t),
            shape2.shape,
            &shape2.pose_at(t),
        )
    }
}

impl<D: DistanceDetector> TimeOfImpactDetector for ConservativeAdvancement<D> {
    fn time_of_impact(
        &self,
        shape1: &MovingShape,
        shape2: &MovingShape,
        interval: TimeInterval,
    ) -> ToiResult {
        let eps = self.params.distance_epsilon;
        let mut t = interval.start;

        let Some(mut separation) = self.distance_at(shape1, shape2, t) else {
            return ToiResult::NoImpact;
        };
        if separation.distance < eps {
            return ToiResult::Impact(TimeOfImpact {
                time: t,
                separation: Some(separation),
            });
        }

        let rel_linear = shape1.motion.linear - shape2.motion.linear;
        // bound on how fast rotation can move any point of either shape
        let max_angular = shape1.shape.radius() * shape1.motion.angular.abs()
            + shape2.shape.radius() * shape2.motion.angular.abs();
        if rel_linear.mag() + max_angular == 0.0 {
            return ToiResult::NoImpact;
        }

        let mut distance = separation.distance;
        let mut contact = Some(separation);
        let mut iterations = 0;
        while distance > eps {
            if iterations == self.params.max_iterations {
                log::debug!(
                    "Conservative advancement reached its limit of {} iterations",
                    self.params.max_iterations
                );
                return ToiResult::Inconclusive;
            }
            iterations += 1;

            let closing_speed = rel_linear.dot(*separation.normal) + max_angular;
            if closing_speed <= 0.0 {
                return ToiResult::NoImpact;
            }
            let next_t = t + distance / closing_speed;
            if next_t > interval.end || next_t <= t {
                return ToiResult::NoImpact;
            }
            t = next_t;

            match self.distance_at(shape1, shape2, t) {
                Some(sep) => {
                    separation = sep;
                    distance = sep.distance;
                    contact = Some(sep);
                }
                None => {
                    // stepped into overlap, back off to just before contact
                    t -= 0.5 * eps / closing_speed;
                    contact = self.distance_at(shape1, shape2, t);
                    break;
                }
            }
        }

        ToiResult::Impact(TimeOfImpact {
            time: t,
            separation: contact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Angle, PoseBuilder};
    use std::f64::consts::PI;

    fn at(x: f64, y: f64) -> Pose {
        PoseBuilder::new().with_position([x, y]).build()
    }

    #[test]
    fn circle_hits_circle() {
        let ca = ConservativeAdvancement::<Gjk>::default();
        let circle = ColliderShape::new_circle(0.5).unwrap();
        let mover = MovingShape::new(&circle, at(-3.0, 0.0), Velocity::new([6.0, 0.0], 0.0));
        let target = MovingShape::stationary(&circle, at(0.0, 0.0));
        let toi = match ca.time_of_impact(&mover, &target, TimeInterval::FULL) {
            ToiResult::Impact(toi) => toi,
            other => panic!("expected impact, got {other:?}"),
        };
        assert!((toi.time - 1.0 / 3.0).abs() < 1e-6);

        // the other way around gives the same time
        let toi2 = ca.time_of_impact(&target, &mover, TimeInterval::FULL);
        assert!((toi2.impact().unwrap().time - toi.time).abs() < 1e-6);
    }

    #[test]
    fn misses_and_late_hits() {
        let ca = ConservativeAdvancement::new(Gjk::new());
        let circle = ColliderShape::new_circle(0.5).unwrap();
        let target = MovingShape::stationary(&circle, at(0.0, 0.0));

        let away = MovingShape::new(&circle, at(-3.0, 0.0), Velocity::new([-6.0, 0.0], 0.0));
        assert_eq!(
            ca.time_of_impact(&away, &target, TimeInterval::FULL),
            ToiResult::NoImpact
        );

        let passing = MovingShape::new(&circle, at(-3.0, 2.0), Velocity::new([6.0, 0.0], 0.0));
        assert_eq!(
            ca.time_of_impact(&passing, &target, TimeInterval::FULL),
            ToiResult::NoImpact
        );

        let slow = MovingShape::new(&circle, at(-3.0, 0.0), Velocity::new([1.0, 0.0], 0.0));
        assert_eq!(
            ca.time_of_impact(&slow, &target, TimeInterval::FULL),
            ToiResult::NoImpact
        );

        // the impact at 1/3 lies outside the latter half of the motion
        let fast = MovingShape::new(&circle, at(-3.0, 0.0), Velocity::new([6.0, 0.0], 0.0));
        let late = TimeInterval::new(0.5, 1.0).unwrap();
        assert_eq!(ca.time_of_impact(&fast, &target, late), ToiResult::NoImpact);
        let early = TimeInterval::new(0.0, 0.5).unwrap();
        assert!(ca.time_of_impact(&fast, &target, early).impact().is_some());
    }

    #[test]
    fn overlapping_at_start_is_not_an_impact() {
        let ca = ConservativeAdvancement::<Gjk>::default();
        let square = ColliderShape::new_square(1.0).unwrap();
        let a = MovingShape::new(&square, at(0.0, 0.0), Velocity::new([1.0, 0.0], 0.0));
        let b = MovingShape::stationary(&square, at(0.5, 0.0));
        assert_eq!(
            ca.time_of_impact(&a, &b, TimeInterval::FULL),
            ToiResult::NoImpact
        );
    }

    #[test]
    fn rotating_bar_hits_circle() {
        let ca = ConservativeAdvancement::<Gjk>::default();
        let bar = ColliderShape::new_rect(4.0, 0.2).unwrap();
        let circle = ColliderShape::new_circle(0.25).unwrap();
        let spinning = MovingShape::new(&bar, Pose::identity(), Velocity::new([0.0, 0.0], PI / 2.0));
        let target = MovingShape::stationary(&circle, at(0.0, 1.5));

        let toi = match ca.time_of_impact(&spinning, &target, TimeInterval::FULL) {
            ToiResult::Impact(toi) => toi,
            other => panic!("expected impact, got {other:?}"),
        };
        // the bar's side reaches the circle once 1.5 cos(angle) = 0.35
        let expected = (0.35f64 / 1.5).acos() / (PI / 2.0);
        assert!((toi.time - expected).abs() < 1e-3, "{} vs {expected}", toi.time);
        if let Some(sep) = toi.separation {
            assert!(sep.distance < 1e-3);
        }
    }

    #[test]
    fn iteration_limit_is_inconclusive() {
        let params = CcdParams {
            max_iterations: 5,
            ..Default::default()
        };
        let ca = ConservativeAdvancement::with_params(Gjk::new(), params).unwrap();
        let circle = ColliderShape::new_circle(0.5).unwrap();
        // fast spin makes the closing speed bound very loose
        let mover = MovingShape::new(&circle, at(-2.0, 0.0), Velocity::new([3.0, 0.0], 100.0));
        let target = MovingShape::stationary(&circle, at(0.0, 0.0));
        assert_eq!(
            ca.time_of_impact(&mover, &target, TimeInterval::FULL),
            ToiResult::Inconclusive
        );
    }

    #[test]
    fn params_and_intervals_are_validated() {
        let too_few = CcdParams {
            max_iterations: 3,
            ..Default::default()
        };
        assert_eq!(
            ConservativeAdvancement::with_params(Gjk::new(), too_few),
            Err(CollisionError::TooFewIterations { min: 5, given: 3 })
        );
        assert!(TimeInterval::new(0.6, 0.4).is_err());
        assert!(TimeInterval::new(-0.1, 0.4).is_err());
        assert!(TimeInterval::new(0.2, 1.5).is_err());
        assert_eq!(TimeInterval::new(0.0, 1.0), Ok(TimeInterval::FULL));
    }

    #[test]
    fn impact_between_pose_pairs() {
        let ca = ConservativeAdvancement::<Gjk>::default();
        let square = ColliderShape::new_square(1.0).unwrap();
        let still = at(0.0, 0.0);
        let result = ca.time_of_impact_between(
            &square,
            &at(-4.0, 0.0),
            &at(4.0, 0.0),
            &square,
            &still,
            &still,
        );
        // the gap of 3 closes over a travel of 8
        let toi = result.impact().unwrap();
        assert!((toi.time - 3.0 / 8.0).abs() < 1e-6);
    }

    #[test]
    fn poses_interpolate_the_short_way() {
        let start: Pose = PoseBuilder::new()
            .with_position([0.0, 0.0])
            .with_rotation(Angle::Deg(170.0))
            .build();
        let end: Pose = PoseBuilder::new()
            .with_position([2.0, 4.0])
            .with_rotation(Angle::Deg(-170.0))
            .build();
        let motion = Velocity::between(&start, &end);
        assert!((motion.angular.to_degrees() - 20.0).abs() < 1e-9);

        let mid = lerp_between(&start, &end, 0.5);
        assert!((mid.translation - m::Vec2::new(1.0, 2.0)).mag() < 1e-12);
        assert!((m::pose_angle(&mid).to_degrees().abs() - 180.0).abs() < 1e-9);
        let full = lerp_between(&start, &end, 1.0);
        assert!((m::pose_angle(&full).to_degrees() + 170.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_arithmetic() {
        let v = Velocity::new([1.0, 0.0], 2.0);
        // rotating counter-clockwise, a point above the origin moves left
        assert_eq!(v.point_velocity(m::Vec2::new(0.0, 1.0)), m::Vec2::new(-1.0, 0.0));
        let mut sum = v + v * 0.5;
        assert_eq!(sum, Velocity::new([1.5, 0.0], 3.0));
        sum += Velocity::default();
        assert_eq!(sum.angular, 3.0);
    }
}
