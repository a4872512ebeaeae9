use itertools::Itertools;

use super::shape::{EdgeFeature, Feature, Vertex};
use crate::{
    error::{check_positive, CollisionError},
    math::{self as m, Pose, EPSILON},
};

/// A convex polygon with counter-clockwise winding.
///
/// Vertices are given relative to the owning fixture's origin,
/// which does not need to be the centroid.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")
)]
pub struct ConvexPolygon {
    vertices: Vec<m::Vec2>,
    centroid: m::Vec2,
    radius: f64,
}

/// Turns with a smaller sine than this count as collinear.
const COLLINEAR_SINE: f64 = 1e-9;

impl ConvexPolygon {
    /// Create a polygon, checking that the vertices actually describe
    /// a strictly convex counter-clockwise shape.
    pub fn new(vertices: Vec<m::Vec2>) -> Result<Self, CollisionError> {
        let n = vertices.len();
        if n < 3 {
            return Err(CollisionError::TooFewVertices(n));
        }
        for (i, (a, b)) in vertices.iter().circular_tuple_windows().enumerate() {
            if (*b - *a).mag_sq() <= EPSILON * EPSILON {
                return Err(CollisionError::CoincidentVertices(i, (i + 1) % n));
            }
        }

        let mut turns_left = 0;
        let mut turns_right = 0;
        for (i, (a, b, c)) in vertices.iter().circular_tuple_windows().enumerate() {
            let (e1, e2) = (*b - *a, *c - *b);
            let turn = m::cross(e1, e2);
            // compare the sine of the turn angle so that scale doesn't matter
            if turn.abs() <= COLLINEAR_SINE * e1.mag() * e2.mag() {
                return Err(CollisionError::CollinearVertices((i + 1) % n));
            }
            if turn > 0.0 {
                turns_left += 1;
            } else {
                turns_right += 1;
            }
        }
        if turns_left > 0 && turns_right > 0 {
            return Err(CollisionError::NotConvex);
        }
        if turns_right > 0 {
            return Err(CollisionError::ClockwiseWinding);
        }

        let centroid = area_centroid(&vertices);
        let radius = vertices
            .iter()
            .map(|v| v.mag())
            .fold(0.0_f64, |acc, d| acc.max(d));

        Ok(ConvexPolygon {
            vertices,
            centroid,
            radius,
        })
    }

    /// A regular polygon with `count` vertices at distance `radius` from the origin,
    /// the first vertex lying on the positive x axis.
    pub fn regular(count: usize, radius: f64) -> Result<Self, CollisionError> {
        check_positive(radius, CollisionError::InvalidRadius)?;
        if count < 3 {
            return Err(CollisionError::TooFewVertices(count));
        }
        let step = 2.0 * std::f64::consts::PI / count as f64;
        let vertices = (0..count)
            .map(|i| {
                let angle = step * i as f64;
                m::Vec2::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect();
        Self::new(vertices)
    }

    #[inline]
    pub fn vertices(&self) -> &[m::Vec2] {
        &self.vertices
    }

    /// The center of area in fixture-local space.
    #[inline]
    pub fn centroid(&self) -> m::Vec2 {
        self.centroid
    }

    /// Distance of the farthest vertex from the local origin.
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl TryFrom<Vec<[f64; 2]>> for ConvexPolygon {
    type Error = CollisionError;

    fn try_from(points: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        Self::new(points.into_iter().map(m::Vec2::from).collect())
    }
}

impl From<ConvexPolygon> for Vec<[f64; 2]> {
    fn from(poly: ConvexPolygon) -> Self {
        poly.vertices.iter().map(|v| [v.x, v.y]).collect()
    }
}

fn area_centroid(vertices: &[m::Vec2]) -> m::Vec2 {
    // triangle fan from the first vertex, weighted by signed area
    let origin = vertices[0];
    let mut area = 0.0;
    let mut centroid = m::Vec2::zero();
    for (a, b) in vertices[1..].iter().tuple_windows() {
        let tri_area = 0.5 * m::cross(*a - origin, *b - origin);
        area += tri_area;
        centroid += tri_area * (origin + *a + *b) / 3.0;
    }
    if area <= EPSILON {
        vertices.iter().fold(m::Vec2::zero(), |acc, v| acc + *v) / vertices.len() as f64
    } else {
        centroid / area
    }
}

//
// Support functions shared by every shape that is a list of vertices
//

/// Index of the vertex farthest along a local-space direction.
/// Ties go to the lowest index.
pub(super) fn farthest_vertex_index(vertices: &[m::Vec2], local_dir: m::Vec2) -> usize {
    let mut best = 0;
    let mut best_dot = vertices[0].dot(local_dir);
    for (i, v) in vertices.iter().enumerate().skip(1) {
        let d = v.dot(local_dir);
        if d > best_dot {
            best = i;
            best_dot = d;
        }
    }
    best
}

/// Farthest edge of a counter-clockwise vertex loop in world space.
///
/// Picks the vertex farthest along the direction,
/// then whichever of its two adjacent edges faces the direction more.
pub(super) fn farthest_edge(vertices: &[m::Vec2], dir: m::Vec2, pose: &Pose) -> Feature {
    let n = vertices.len();
    let local_dir = pose.rotation.reversed() * dir;
    let i = farthest_vertex_index(vertices, local_dir);
    let next = (i + 1) % n;
    let prev = (i + n - 1) % n;

    let outward = |from: usize, to: usize| {
        m::right_normal(vertices[to] - vertices[from])
            .normalized()
            .dot(local_dir)
    };
    let (start, end) = if outward(i, next) >= outward(prev, i) {
        (i, next)
    } else {
        (prev, i)
    };

    let world = |idx: usize| Vertex {
        point: *pose * vertices[idx],
        index: idx,
    };
    Feature::Edge(EdgeFeature::new(world(start), world(end), world(i), start))
}

/// Project a vertex loop onto a world-space axis.
pub(super) fn project_vertices(vertices: &[m::Vec2], axis: m::Vec2, pose: &Pose) -> (f64, f64) {
    let local_axis = pose.rotation.reversed() * axis;
    let offset = pose.translation.dot(axis);
    let (min, max) = vertices
        .iter()
        .map(|v| v.dot(local_axis))
        .fold((f64::MAX, f64::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));
    (min + offset, max + offset)
}

/// Outward edge normals of a vertex loop in world space.
pub(super) fn edge_normals<'a>(
    vertices: &'a [m::Vec2],
    pose: &Pose,
) -> impl Iterator<Item = m::Vec2> + 'a {
    let rotation = pose.rotation;
    vertices
        .iter()
        .circular_tuple_windows()
        .map(move |(a, b)| rotation * m::right_normal(*b - *a).normalized())
}

/// Whether a local-space point is strictly inside a counter-clockwise vertex loop.
pub(super) fn loop_contains(vertices: &[m::Vec2], local_point: m::Vec2) -> bool {
    vertices
        .iter()
        .circular_tuple_windows()
        .all(|(a, b)| m::cross(*b - *a, local_point - *a) > 0.0)
}
