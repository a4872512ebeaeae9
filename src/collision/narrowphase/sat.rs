//! Separating axis test.

use std::cmp::Ordering;

use super::{circle, NarrowPhase, Penetration};
use crate::{
    collision::ColliderShape,
    math::{self as m, Pose, Unit, EPSILON},
};

/// Narrow phase by separating axes.
///
/// Exact on polygons, rectangles and segments, and handles circles and capsules
/// through axes towards their round features. Has no iteration limit,
/// making it a good fallback for pairs where GJK struggles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sat;

impl Sat {
    pub fn new() -> Self {
        Sat
    }
}

/// Flip the axis into the half plane `x > 0`, or `x == 0, y > 0`,
/// so that the same axis found from either shape compares equal.
fn canonical(axis: Unit<m::Vec2>) -> Unit<m::Vec2> {
    if axis.x < 0.0 || (axis.x == 0.0 && axis.y < 0.0) {
        -axis
    } else {
        axis
    }
}

fn axis_order(a: &Unit<m::Vec2>, b: &Unit<m::Vec2>) -> Ordering {
    a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y))
}

impl NarrowPhase for Sat {
    fn detect(
        &self,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> bool {
        self.penetration(shape1, pose1, shape2, pose2).is_some()
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

        let foci1 = shape1.foci(pose1);
        let foci2 = shape2.foci(pose2);
        let axes = shape1
            .sat_axes(&foci2, pose1)
            .into_iter()
            .chain(shape2.sat_axes(&foci1, pose2));

        let mut best: Option<(Unit<m::Vec2>, f64)> = None;
        for axis in axes.map(canonical) {
            let i1 = shape1.project(axis, pose1);
            let i2 = shape2.project(axis, pose2);
            if !i1.overlaps(&i2) {
                return None;
            }
            let mut overlap = i1.overlap(&i2);
            if i1.contains(&i2) || i2.contains(&i1) {
                // pushing out of a containing interval takes the shorter way out
                overlap += (i1.min - i2.min).abs().min((i1.max - i2.max).abs());
            }
            let better = match best {
                None => true,
                Some((best_axis, best_overlap)) => {
                    overlap < best_overlap
                        || (overlap == best_overlap
                            && axis_order(&axis, &best_axis) == Ordering::Less)
                }
            };
            if better {
                best = Some((axis, overlap));
            }
        }

        let Some((axis, depth)) = best else {
            log::trace!(
                "no separating axis candidates between {:?} and {:?}",
                shape1.kind(),
                shape2.kind()
            );
            return None;
        };

        // orient from the first shape towards the second
        let mid_diff = shape2.project(axis, pose2).midpoint() - shape1.project(axis, pose1).midpoint();
        let center_diff = (shape2.center(pose2) - shape1.center(pose1)).dot(*axis);
        let normal = if mid_diff.abs() > EPSILON {
            if mid_diff < 0.0 {
                -axis
            } else {
                axis
            }
        } else if center_diff < 0.0 {
            -axis
        } else {
            axis
        };
        Some(Penetration { normal, depth })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::narrowphase::Gjk;
    use crate::math::{Angle, PoseBuilder};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn pose(x: f64, y: f64, deg: f64) -> Pose {
        PoseBuilder::new()
            .with_position([x, y])
            .with_rotation(Angle::Deg(deg))
            .build()
    }

    #[test]
    fn boxes() {
        let square = ColliderShape::new_square(2.0).unwrap();
        let pen = Sat
            .penetration(&square, &pose(0.0, 0.0, 0.0), &square, &pose(1.5, 0.2, 0.0))
            .unwrap();
        assert!((pen.depth - 0.5).abs() < 1e-12);
        assert_eq!(*pen.normal, m::Vec2::new(1.0, 0.0));

        let pen = Sat
            .penetration(&square, &pose(0.0, 0.0, 0.0), &square, &pose(-0.2, -1.8, 0.0))
            .unwrap();
        assert!((pen.depth - 0.2).abs() < 1e-12);
        assert_eq!(*pen.normal, m::Vec2::new(0.0, -1.0));

        assert!(!Sat.detect(&square, &pose(0.0, 0.0, 0.0), &square, &pose(2.5, 0.0, 30.0)));
    }

    #[test]
    fn circle_against_box_corner() {
        let square = ColliderShape::new_square(2.0).unwrap();
        let circle = ColliderShape::new_circle(1.0).unwrap();
        // circle center 0.5 diagonally off the corner at (1, 1)
        let off = 1.0 + 0.5f64.sqrt() * 0.5;
        let pen = Sat
            .penetration(&square, &pose(0.0, 0.0, 0.0), &circle, &pose(off, off, 0.0))
            .unwrap();
        assert!((pen.depth - 0.5).abs() < 1e-9);
        assert!((*pen.normal - m::Vec2::new(1.0, 1.0).normalized()).mag() < 1e-9);

        let far = 1.0 + 0.5f64.sqrt() * 2.1;
        assert!(!Sat.detect(&square, &pose(0.0, 0.0, 0.0), &circle, &pose(far, far, 0.0)));
    }

    #[test]
    fn capsules_crossing() {
        let capsule = ColliderShape::new_capsule(2.0, 0.5).unwrap();
        let pen = Sat
            .penetration(&capsule, &pose(0.0, 0.0, 0.0), &capsule, &pose(0.0, 0.8, 0.0))
            .unwrap();
        assert!((pen.depth - 0.2).abs() < 1e-9);
        assert!((*pen.normal - m::Vec2::new(0.0, 1.0)).mag() < 1e-9);

        // end to end along the x axis
        let pen = Sat
            .penetration(&capsule, &pose(0.0, 0.0, 0.0), &capsule, &pose(-2.9, 0.0, 0.0))
            .unwrap();
        assert!((pen.depth - 0.1).abs() < 1e-9);
        assert!((*pen.normal - m::Vec2::new(-1.0, 0.0)).mag() < 1e-9);
    }

    #[test]
    fn contained_shape_takes_shorter_way_out() {
        let big = ColliderShape::new_square(10.0).unwrap();
        let small = ColliderShape::new_square(1.0).unwrap();
        let pen = Sat
            .penetration(&big, &pose(0.0, 0.0, 0.0), &small, &pose(4.0, 0.0, 0.0))
            .unwrap();
        // overlap of 1 plus the gap of 0.5 to the right wall
        assert!((pen.depth - 1.5).abs() < 1e-12);
        assert_eq!(*pen.normal, m::Vec2::new(1.0, 0.0));
    }

    #[test]
    fn exactly_antisymmetric() {
        let shapes = [
            ColliderShape::new_circle(0.5).unwrap(),
            ColliderShape::new_rect(1.0, 0.6).unwrap(),
            ColliderShape::new_capsule(1.0, 0.3).unwrap(),
            ColliderShape::new_segment(1.2).unwrap(),
            ColliderShape::new_polygon(vec![
                m::Vec2::new(-0.5, -0.4),
                m::Vec2::new(0.6, -0.3),
                m::Vec2::new(0.1, 0.7),
            ])
            .unwrap(),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..300 {
            let s1 = &shapes[rng.gen_range(0..shapes.len())];
            let s2 = &shapes[rng.gen_range(0..shapes.len())];
            let p1 = pose(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-180.0..180.0));
            let p2 = pose(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-180.0..180.0));
            let forward = Sat.penetration(s1, &p1, s2, &p2);
            let backward = Sat.penetration(s2, &p2, s1, &p1);
            match (forward, backward) {
                (Some(f), Some(b)) => {
                    assert_eq!(*f.normal, -*b.normal);
                    assert_eq!(f.depth, b.depth);
                }
                (None, None) => {}
                other => panic!("asymmetric result {other:?}"),
            }
        }
    }

    #[test]
    fn agrees_with_gjk_on_polygons() {
        let gjk = Gjk::new();
        let tri = ColliderShape::new_polygon(vec![
            m::Vec2::new(-0.5, -0.4),
            m::Vec2::new(0.6, -0.3),
            m::Vec2::new(0.1, 0.7),
        ])
        .unwrap();
        let rect = ColliderShape::new_rect(1.0, 0.6).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let p1 = pose(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-180.0..180.0));
            let p2 = pose(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-180.0..180.0));
            let sat = Sat.penetration(&tri, &p1, &rect, &p2);
            let epa = gjk.penetration(&tri, &p1, &rect, &p2);
            match (sat, epa) {
                (Some(s), Some(e)) => {
                    assert!((s.depth - e.depth).abs() < 1e-4, "{s:?} vs {e:?}");
                }
                (None, None) => {}
                // grazing contacts may land on either side of the tolerance
                (Some(s), None) => assert!(s.depth < 1e-4),
                (None, Some(e)) => assert!(e.depth < 1e-4),
            }
        }
    }
}
