//! The Gilbert-Johnson-Keerthi algorithm and its relatives,
//! all working on the Minkowski difference of two shapes.

use super::{
    circle, default_distance_epsilon,
    epa::{self, EpaParams},
    DistanceDetector, NarrowPhase, Penetration, RaycastDetector, RaycastHit, Separation,
    MIN_ITERATIONS,
};
use crate::{
    collision::{ColliderShape, Ray},
    error::{check_iterations, check_positive, CollisionError},
    math::{self as m, Pose, Unit, EPSILON},
};

/// Tuning for the GJK queries.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct GjkParams {
    /// Upper bound on the iterations of any single query.
    pub max_iterations: usize,
    /// Distance queries stop once a new support point improves the result by less than this.
    pub distance_epsilon: f64,
    /// Ray casts stop once the squared distance to the simplex drops below this.
    pub raycast_epsilon: f64,
}

impl Default for GjkParams {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            distance_epsilon: default_distance_epsilon(),
            raycast_epsilon: default_distance_epsilon(),
        }
    }
}

impl GjkParams {
    pub fn validate(&self) -> Result<(), CollisionError> {
        check_iterations(self.max_iterations, MIN_ITERATIONS)?;
        check_positive(self.distance_epsilon, CollisionError::InvalidEpsilon)?;
        check_positive(self.raycast_epsilon, CollisionError::InvalidEpsilon)?;
        Ok(())
    }
}

//
// Minkowski difference
//

/// A point of the Minkowski difference along with the shape points it came from.
#[derive(Clone, Copy, Debug)]
pub(super) struct SupportPoint {
    pub point: m::Vec2,
    pub support1: m::Vec2,
    pub support2: m::Vec2,
}

/// The set `{a - b}` for all points `a` of the first shape and `b` of the second.
/// The shapes overlap exactly when it contains the origin.
#[derive(Clone, Copy)]
pub(super) struct MinkowskiDifference<'a> {
    pub shape1: &'a ColliderShape,
    pub pose1: &'a Pose,
    pub shape2: &'a ColliderShape,
    pub pose2: &'a Pose,
}

impl<'a> MinkowskiDifference<'a> {
    #[inline]
    pub fn support(&self, dir: m::Vec2) -> m::Vec2 {
        self.support_point(dir).point
    }

    pub fn support_point(&self, dir: m::Vec2) -> SupportPoint {
        let support1 = self.shape1.farthest_point(dir, self.pose1);
        let support2 = self.shape2.farthest_point(-dir, self.pose2);
        SupportPoint {
            point: support1 - support2,
            support1,
            support2,
        }
    }

    /// Vector from the first shape's center to the second's.
    pub fn initial_direction(&self) -> m::Vec2 {
        self.shape2.center(self.pose2) - self.shape1.center(self.pose1)
    }
}

//
// Detector
//

/// GJK with EPA for penetration depth.
///
/// Circle pairs are answered in closed form instead,
/// since the iteration converges slowly on curved boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Gjk {
    params: GjkParams,
    epa: EpaParams,
}

impl Gjk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: GjkParams, epa: EpaParams) -> Result<Self, CollisionError> {
        params.validate()?;
        epa.validate()?;
        Ok(Self { params, epa })
    }

    pub fn params(&self) -> &GjkParams {
        &self.params
    }

    pub fn epa_params(&self) -> &EpaParams {
        &self.epa
    }

    /// Run GJK until the simplex encloses the origin or the shapes are found to be separate.
    ///
    /// On success `simplex` holds the enclosing triangle, which EPA continues from.
    pub(super) fn detect_simplex(
        &self,
        md: &MinkowskiDifference,
        simplex: &mut Vec<m::Vec2>,
    ) -> bool {
        simplex.clear();
        let mut dir = md.initial_direction();
        if dir.mag_sq() <= EPSILON {
            dir = m::Vec2::unit_x();
        }

        let first = md.support(dir);
        if first.dot(dir) <= 0.0 {
            return false;
        }
        simplex.push(first);
        dir = -dir;

        for _ in 0..self.params.max_iterations {
            let next = md.support(dir);
            if next.dot(dir) <= EPSILON {
                // the new point doesn't pass the origin, it can't be enclosed
                return false;
            }
            simplex.push(next);
            if check_simplex(simplex, &mut dir) {
                return true;
            }
        }

        log::debug!(
            "GJK detect reached its limit of {} iterations",
            self.params.max_iterations
        );
        false
    }

    fn gjk_distance(&self, md: &MinkowskiDifference) -> Option<Separation> {
        let mut dir = md.initial_direction();
        if dir.mag_sq() <= EPSILON {
            // centers coincide, convex shapes must overlap
            return None;
        }

        let mut a = md.support_point(dir);
        dir = -dir;
        let mut b = md.support_point(dir);
        dir = m::closest_point_on_segment(m::Vec2::zero(), b.point, a.point);

        for _ in 0..self.params.max_iterations {
            dir = -dir;
            let simplex_dist = dir.mag();
            if simplex_dist * simplex_dist <= EPSILON {
                // origin lies on the simplex, the shapes are touching
                return None;
            }
            let normal = Unit::new_unchecked(dir / simplex_dist);
            let c = md.support_point(*normal);
            if contains_origin(a.point, b.point, c.point) {
                return None;
            }

            // the true distance lies between the support plane and the simplex
            let support_dist = -c.point.dot(*normal);
            if simplex_dist - support_dist < self.params.distance_epsilon {
                return Some(separation(normal, support_dist.max(0.0), &a, &b));
            }

            let p1 = m::closest_point_on_segment(m::Vec2::zero(), a.point, c.point);
            let p2 = m::closest_point_on_segment(m::Vec2::zero(), c.point, b.point);
            if p1.mag_sq() < p2.mag_sq() {
                b = c;
                dir = p1;
            } else {
                a = c;
                dir = p2;
            }
        }

        log::debug!(
            "GJK distance reached its limit of {} iterations",
            self.params.max_iterations
        );
        let normal = Unit::try_new(-dir, EPSILON)?;
        let distance = -md.support(*normal).dot(*normal);
        Some(separation(normal, distance.max(0.0), &a, &b))
    }

    fn gjk_raycast(
        &self,
        ray: Ray,
        max_length: f64,
        shape: &ColliderShape,
        pose: &Pose,
    ) -> Option<RaycastHit> {
        if shape.contains_point(ray.start, pose) {
            return None;
        }
        let bounded = max_length > 0.0;
        let r = *ray.dir;

        let mut lambda = 0.0;
        let mut x = ray.start;
        let mut normal = m::Vec2::zero();
        // simplex of points on the shape
        let mut a: Option<m::Vec2> = None;
        let mut b: Option<m::Vec2> = None;
        // always points from the simplex towards x
        let mut dir = x - shape.center(pose);
        let mut dist_sq = f64::MAX;

        let mut iterations = 0;
        while dist_sq > self.params.raycast_epsilon {
            if iterations == self.params.max_iterations {
                log::debug!(
                    "GJK raycast reached its limit of {} iterations",
                    self.params.max_iterations
                );
                return None;
            }
            iterations += 1;

            let p = shape.farthest_point(dir, pose);
            let w = x - p;
            let d_dot_w = dir.dot(w);
            if d_dot_w > 0.0 {
                let d_dot_r = dir.dot(r);
                if d_dot_r >= 0.0 {
                    // separated along dir and moving away
                    return None;
                }
                lambda -= d_dot_w / d_dot_r;
                if bounded && lambda > max_length {
                    return None;
                }
                x = ray.point_at(lambda);
                normal = dir;
            }

            match (a, b) {
                (None, _) => {
                    a = Some(p);
                    dir = x - p;
                    dist_sq = dir.mag_sq();
                }
                (Some(a_pt), None) => {
                    b = Some(p);
                    let closest = m::closest_point_on_segment(x, a_pt, p);
                    dist_sq = (x - closest).mag_sq();
                    let ab = p - a_pt;
                    dir = m::triple_product(ab, x - a_pt, ab);
                }
                (Some(a_pt), Some(b_pt)) => {
                    let p1 = m::closest_point_on_segment(x, a_pt, p);
                    let p2 = m::closest_point_on_segment(x, p, b_pt);
                    let (new_a, new_b) = if (x - p1).mag_sq() < (x - p2).mag_sq() {
                        dist_sq = (x - p1).mag_sq();
                        (a_pt, p)
                    } else {
                        dist_sq = (x - p2).mag_sq();
                        (p, b_pt)
                    };
                    a = Some(new_a);
                    b = Some(new_b);
                    let ab = new_b - new_a;
                    dir = m::triple_product(ab, x - new_a, ab);
                }
            }

            if dir.mag_sq() <= EPSILON {
                // x lies on the line through the simplex
                break;
            }
        }

        let Some(normal) = Unit::try_new(normal, EPSILON) else {
            log::trace!("GJK raycast started on the surface of the shape");
            return None;
        };
        Some(RaycastHit {
            point: x,
            normal,
            distance: lambda,
        })
    }
}

/// Update the simplex and search direction after a new point was pushed.
/// Returns true if the simplex now encloses the origin.
fn check_simplex(simplex: &mut Vec<m::Vec2>, dir: &mut m::Vec2) -> bool {
    let a = simplex[simplex.len() - 1];
    let ao = -a;
    if simplex.len() == 3 {
        let b = simplex[1];
        let c = simplex[0];
        let ab = b - a;
        let ac = c - a;
        let winding = m::cross(ab, ac);
        let ac_perp = m::Vec2::new(-ac.y * winding, ac.x * winding);
        if ac_perp.dot(ao) >= 0.0 {
            // origin is outside edge ac, b no longer helps
            simplex.remove(1);
            *dir = ac_perp;
        } else {
            let ab_perp = m::Vec2::new(ab.y * winding, -ab.x * winding);
            if ab_perp.dot(ao) < 0.0 {
                return true;
            }
            simplex.remove(0);
            *dir = ab_perp;
        }
    } else {
        let b = simplex[0];
        let ab = b - a;
        *dir = m::triple_product(ab, ao, ab);
        if dir.mag_sq() <= EPSILON {
            // origin lies on the line through ab
            *dir = m::left_normal(ab);
        }
    }
    false
}

fn contains_origin(a: m::Vec2, b: m::Vec2, c: m::Vec2) -> bool {
    let sa = m::cross(a, b);
    let sb = m::cross(b, c);
    let sc = m::cross(c, a);
    sa * sb > 0.0 && sa * sc > 0.0
}

/// Build the result of a distance query, recovering the closest points
/// on the original shapes from the final simplex edge.
fn separation(
    normal: Unit<m::Vec2>,
    distance: f64,
    a: &SupportPoint,
    b: &SupportPoint,
) -> Separation {
    let l = b.point - a.point;
    let ll = l.mag_sq();
    let points = if ll <= EPSILON {
        [a.support1, a.support2]
    } else {
        let t = -l.dot(a.point) / ll;
        if t >= 1.0 {
            [b.support1, b.support2]
        } else if t <= 0.0 {
            [a.support1, a.support2]
        } else {
            let s = 1.0 - t;
            [
                a.support1 * s + b.support1 * t,
                a.support2 * s + b.support2 * t,
            ]
        }
    };
    Separation {
        normal,
        distance,
        points,
    }
}

impl NarrowPhase for Gjk {
    fn detect(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> bool {
        if let (ColliderShape::Circle { r: r1 }, ColliderShape::Circle { r: r2 }) = (shape1, shape2)
        {
            return circle::circle_circle_detect(pose1.translation, *r1, pose2.translation, *r2);
        }
        let md = MinkowskiDifference {
            shape1,
            pose1,
            shape2,
            pose2,
        };
        let mut simplex = Vec::with_capacity(3);
        self.detect_simplex(&md, &mut simplex)
    }

    fn penetration(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> Option<Penetration> {
        if let (ColliderShape::Circle { r: r1 }, ColliderShape::Circle { r: r2 }) = (shape1, shape2)
        {
            return circle::circle_circle_penetration(
                pose1.translation,
                *r1,
                pose2.translation,
                *r2,
            );
        }
        let md = MinkowskiDifference {
            shape1,
            pose1,
            shape2,
            pose2,
        };
        let mut simplex = Vec::with_capacity(3);
        if !self.detect_simplex(&md, &mut simplex) {
            return None;
        }
        epa::penetration(&md, &simplex, &self.epa)
    }
}

impl DistanceDetector for Gjk {
    fn distance(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> Option<Separation> {
        if let (ColliderShape::Circle { r: r1 }, ColliderShape::Circle { r: r2 }) = (shape1, shape2)
        {
            return circle::circle_circle_distance(pose1.translation, *r1, pose2.translation, *r2);
        }
        self.gjk_distance(&MinkowskiDifference {
            shape1,
            pose1,
            shape2,
            pose2,
        })
    }
}

impl RaycastDetector for Gjk {
    fn raycast(
        &self,
        ray: Ray,
        max_length: f64,
        shape: &ColliderShape,
        pose: &Pose,
    ) -> Option<RaycastHit> {
        match shape {
            ColliderShape::Circle { r } => circle::ray_circle(ray, max_length, pose.translation, *r),
            ColliderShape::Segment { hl } => circle::ray_segment(
                ray,
                max_length,
                *pose * m::Vec2::new(-hl, 0.0),
                *pose * m::Vec2::new(*hl, 0.0),
            ),
            _ => self.gjk_raycast(ray, max_length, shape, pose),
        }
    }
}
