//! Contact manifolds: the points where two penetrating shapes touch.

use super::{narrowphase::Penetration, ColliderShape, EdgeFeature, Feature, Vertex};
use crate::math::{self as m, Pose, Unit};

/// Identifies a contact point across steps so that solvers can warm start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManifoldPointId {
    /// The single point of a vertex contact.
    Distance,
    /// A point produced by clipping one edge against another.
    Indexed {
        reference_edge: usize,
        incident_edge: usize,
        incident_vertex: usize,
        /// Whether the reference edge belongs to the second shape.
        flipped: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ManifoldPoint {
    pub id: ManifoldPointId,
    /// Position in world space.
    pub point: m::Vec2,
    pub depth: f64,
}

/// Zero to two contact points, the most a pair of convex shapes can have in 2D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ManifoldPoints {
    Zero,
    One(ManifoldPoint),
    Two(ManifoldPoint, ManifoldPoint),
}

impl ManifoldPoints {
    pub fn iter(&self) -> ManifoldPointIter<'_> {
        ManifoldPointIter {
            points: self,
            idx: 0,
        }
    }

    /// Execute a function on every point.
    pub fn map(self, f: impl Fn(ManifoldPoint) -> ManifoldPoint) -> Self {
        match self {
            ManifoldPoints::Zero => ManifoldPoints::Zero,
            ManifoldPoints::One(p) => ManifoldPoints::One(f(p)),
            ManifoldPoints::Two(p1, p2) => ManifoldPoints::Two(f(p1), f(p2)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ManifoldPoints::Zero => 0,
            ManifoldPoints::One(_) => 1,
            ManifoldPoints::Two(_, _) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ManifoldPoints::Zero)
    }

    fn push(self, p: ManifoldPoint) -> Self {
        match self {
            ManifoldPoints::Zero => ManifoldPoints::One(p),
            ManifoldPoints::One(p1) => ManifoldPoints::Two(p1, p),
            // clipping never yields more than two
            full @ ManifoldPoints::Two(_, _) => full,
        }
    }
}

/// An iterator over the points in a [`ManifoldPoints`].
pub struct ManifoldPointIter<'a> {
    points: &'a ManifoldPoints,
    idx: u8,
}

impl<'a> Iterator for ManifoldPointIter<'a> {
    type Item = &'a ManifoldPoint;

    fn next(&mut self) -> Option<Self::Item> {
        self.idx += 1;
        use ManifoldPoints::*;
        match (self.points, self.idx - 1) {
            (Zero, _) => None,
            (One(p), 0) => Some(p),
            (One(_), _) => None,
            (Two(p1, _), 0) => Some(p1),
            (Two(_, p2), 1) => Some(p2),
            (Two(_, _), _) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Manifold {
    /// Points from the first shape towards the second.
    pub normal: Unit<m::Vec2>,
    pub points: ManifoldPoints,
}

/// Turns a penetration into contact points.
pub trait ManifoldSolver: Send + Sync {
    fn manifold(
        &self,
        penetration: &Penetration,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> Manifold;
}

/// Finds contact points by clipping the incident edge against the sides of the reference edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClippingManifoldSolver;

impl ClippingManifoldSolver {
    pub fn new() -> Self {
        ClippingManifoldSolver
    }
}

impl ManifoldSolver for ClippingManifoldSolver {
    fn manifold(
        &self,
        penetration: &Penetration,
        shape1: &ColliderShape,
        pose1: &Pose,
        shape2: &ColliderShape,
        pose2: &Pose,
    ) -> Manifold {
        let normal = penetration.normal;
        let vertex_contact = |v: Vertex| Manifold {
            normal,
            points: ManifoldPoints::One(ManifoldPoint {
                id: ManifoldPointId::Distance,
                point: v.point,
                depth: penetration.depth,
            }),
        };

        let edge1 = match shape1.farthest_feature(*normal, pose1) {
            Feature::Vertex(v) => return vertex_contact(v),
            Feature::Edge(e) => e,
        };
        let edge2 = match shape2.farthest_feature(-*normal, pose2) {
            Feature::Vertex(v) => return vertex_contact(v),
            Feature::Edge(e) => e,
        };

        // the edge closer to perpendicular to the normal is the reference
        let (reference, incident, flipped) = if alignment(&edge1, normal) > alignment(&edge2, normal)
        {
            (edge2, edge1, true)
        } else {
            (edge1, edge2, false)
        };

        // the clipped depths are measured along the reference face,
        // so that face's normal is reported, turned to point from shape 1 to shape 2
        let face_normal = Unit::try_new(m::right_normal(reference.edge), m::EPSILON)
            .map(|n| if flipped { -n } else { n })
            .unwrap_or(normal);
        Manifold {
            normal: face_normal,
            points: clip_edges(&reference, &incident, flipped),
        }
    }
}

/// How parallel an edge is to the normal.
fn alignment(edge: &EdgeFeature, normal: Unit<m::Vec2>) -> f64 {
    Unit::try_new(edge.edge, m::EPSILON)
        .map(|dir| dir.dot(*normal).abs())
        .unwrap_or(1.0)
}

fn clip_edges(reference: &EdgeFeature, incident: &EdgeFeature, flipped: bool) -> ManifoldPoints {
    let Some(ref_dir) = Unit::try_new(reference.edge, m::EPSILON) else {
        log::trace!("degenerate reference edge in manifold clipping");
        return ManifoldPoints::Zero;
    };

    let o1 = ref_dir.dot(reference.v1.point);
    let Some([c1, c2]) = clip(incident.v1, incident.v2, *ref_dir, o1) else {
        return ManifoldPoints::Zero;
    };
    let o2 = ref_dir.dot(reference.v2.point);
    let Some(clipped) = clip(c1, c2, -*ref_dir, -o2) else {
        return ManifoldPoints::Zero;
    };

    let front_normal = m::right_normal(*ref_dir);
    let front_offset = front_normal.dot(reference.max.point);
    clipped
        .iter()
        .filter_map(|v| {
            let depth = front_offset - front_normal.dot(v.point);
            (depth >= 0.0).then_some(ManifoldPoint {
                id: ManifoldPointId::Indexed {
                    reference_edge: reference.index,
                    incident_edge: incident.index,
                    incident_vertex: v.index,
                    flipped,
                },
                point: v.point,
                depth,
            })
        })
        .fold(ManifoldPoints::Zero, ManifoldPoints::push)
}

/// Clip the segment `v1 v2` to the half plane `dir . p >= offset`.
///
/// `None` if less than two points remain.
fn clip(v1: Vertex, v2: Vertex, dir: m::Vec2, offset: f64) -> Option<[Vertex; 2]> {
    let d1 = dir.dot(v1.point) - offset;
    let d2 = dir.dot(v2.point) - offset;
    match (d1 >= 0.0, d2 >= 0.0) {
        (true, true) => Some([v1, v2]),
        (false, false) => None,
        _ if d1 * d2 >= 0.0 => None,
        (kept_first, _) => {
            let u = d1 / (d1 - d2);
            let point = v1.point + (v2.point - v1.point) * u;
            // the new point takes the place of the clipped vertex
            Some(if kept_first {
                [
                    v1,
                    Vertex {
                        point,
                        index: v2.index,
                    },
                ]
            } else {
                [
                    v2,
                    Vertex {
                        point,
                        index: v1.index,
                    },
                ]
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::narrowphase::{Gjk, NarrowPhase, Sat};
    use crate::math::{Angle, PoseBuilder};

    #[test]
    fn capsule_end_on_capsule_side() {
        let capsule = ColliderShape::Capsule { hl: 0.25, r: 0.25 };
        let p1 = Pose::identity();
        let p2: Pose = PoseBuilder::new()
            .with_position([-0.5, 0.0])
            .with_rotation(Angle::Deg(90.0))
            .build();

        for pen in [
            Sat.penetration(&capsule, &p1, &capsule, &p2).unwrap(),
            Gjk::new().penetration(&capsule, &p1, &capsule, &p2).unwrap(),
        ] {
            assert!((pen.depth - 0.25).abs() < 1e-3);
            let manifold = ClippingManifoldSolver.manifold(&pen, &capsule, &p1, &capsule, &p2);
            assert!((*manifold.normal - m::Vec2::new(-1.0, 0.0)).mag() < 1e-3);
            assert_eq!(manifold.points.len(), 1);
            let point = manifold.points.iter().next().unwrap();
            assert_eq!(point.id, ManifoldPointId::Distance);
            assert!((point.point - m::Vec2::new(-0.5, 0.0)).mag() < 1e-3);
            assert!((point.depth - 0.25).abs() < 1e-3);
        }
    }

    #[test]
    fn box_resting_on_box() {
        let square = ColliderShape::new_square(2.0).unwrap();
        let p1 = Pose::identity();
        let p2: Pose = PoseBuilder::new().with_position([1.5, 0.2]).build();
        let pen = Sat.penetration(&square, &p1, &square, &p2).unwrap();
        let manifold = ClippingManifoldSolver.manifold(&pen, &square, &p1, &square, &p2);

        assert_eq!(*manifold.normal, m::Vec2::new(1.0, 0.0));
        assert_eq!(manifold.points.len(), 2);
        for p in manifold.points.iter() {
            assert!((p.depth - 0.5).abs() < 1e-9);
            assert!((p.point.x - 0.5).abs() < 1e-9);
            assert!(matches!(
                p.id,
                ManifoldPointId::Indexed { flipped: false, .. }
            ));
        }
        let mut ys: Vec<f64> = manifold.points.iter().map(|p| p.point.y).collect();
        ys.sort_by(f64::total_cmp);
        assert!((ys[0] + 0.8).abs() < 1e-9);
        assert!((ys[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tilted_reference_is_flipped() {
        // a wide floor under a slightly tilted box: the floor's face is the better reference
        // even when the box is passed first
        let floor = ColliderShape::new_rect(10.0, 1.0).unwrap();
        let block = ColliderShape::new_square(1.0).unwrap();
        let p_block: Pose = PoseBuilder::new()
            .with_position([0.0, 0.9])
            .with_rotation(Angle::Deg(5.0))
            .build();
        let p_floor = Pose::identity();
        let pen = Sat
            .penetration(&block, &p_block, &floor, &p_floor)
            .unwrap();
        assert!(pen.normal.y < -0.99);
        let manifold = ClippingManifoldSolver.manifold(&pen, &block, &p_block, &floor, &p_floor);
        // the floor's top face, pointing from the block into the floor
        assert_eq!(*manifold.normal, m::Vec2::new(0.0, -1.0));
        assert!(!manifold.points.is_empty());
        for p in manifold.points.iter() {
            assert!(p.depth >= 0.0);
            assert!(matches!(p.id, ManifoldPointId::Indexed { flipped: true, .. }));
        }
    }

    #[test]
    fn depths_are_never_negative() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let shapes = [
            ColliderShape::new_rect(1.0, 0.6).unwrap(),
            ColliderShape::new_capsule(1.0, 0.3).unwrap(),
            ColliderShape::new_circle(0.4).unwrap(),
            ColliderShape::new_polygon(vec![
                m::Vec2::new(-0.5, -0.4),
                m::Vec2::new(0.6, -0.3),
                m::Vec2::new(0.1, 0.7),
            ])
            .unwrap(),
        ];
        let gjk = Gjk::new();
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..300 {
            let s1 = &shapes[rng.gen_range(0..shapes.len())];
            let s2 = &shapes[rng.gen_range(0..shapes.len())];
            let p1: Pose = PoseBuilder::new()
                .with_position([rng.gen_range(-0.7..0.7), rng.gen_range(-0.7..0.7)])
                .with_rotation(Angle::Deg(rng.gen_range(-180.0..180.0)))
                .build();
            let p2: Pose = PoseBuilder::new()
                .with_rotation(Angle::Deg(rng.gen_range(-180.0..180.0)))
                .build();
            let Some(pen) = gjk.penetration(s1, &p1, s2, &p2) else {
                continue;
            };
            let manifold = ClippingManifoldSolver.manifold(&pen, s1, &p1, s2, &p2);
            assert!(manifold.points.len() <= 2);
            assert!(manifold.points.iter().all(|p| p.depth >= 0.0));
            assert!(manifold.normal.dot(*pen.normal) > 0.9, "{manifold:?} vs {pen:?}");
        }
    }

    #[test]
    fn clipping_keeps_the_inside() {
        let v = |x: f64, index: usize| Vertex {
            point: m::Vec2::new(x, 0.0),
            index,
        };
        let dir = m::Vec2::unit_x();
        assert_eq!(clip(v(1.0, 0), v(2.0, 1), dir, 0.0), Some([v(1.0, 0), v(2.0, 1)]));
        assert_eq!(clip(v(-2.0, 0), v(-1.0, 1), dir, 0.0), None);
        let [a, b] = clip(v(-1.0, 0), v(3.0, 1), dir, 0.0).unwrap();
        assert_eq!(a, v(3.0, 1));
        assert_eq!(b.index, 0);
        assert!(b.point.x.abs() < 1e-12);
    }

    #[test]
    fn points_iterate_in_order() {
        let p = |x: f64| ManifoldPoint {
            id: ManifoldPointId::Distance,
            point: m::Vec2::new(x, 0.0),
            depth: 0.0,
        };
        let two = ManifoldPoints::Two(p(1.0), p(2.0));
        let xs: Vec<f64> = two.iter().map(|p| p.point.x).collect();
        assert_eq!(xs, vec![1.0, 2.0]);
        let shifted = two.map(|mut p| {
            p.point.x += 1.0;
            p
        });
        assert_eq!(shifted.iter().map(|p| p.point.x).sum::<f64>(), 5.0);
        assert_eq!(ManifoldPoints::Zero.iter().count(), 0);
    }
}
