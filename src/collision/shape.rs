use super::{
    polygon::{self, ConvexPolygon},
    AABB,
};
use crate::{
    error::{check_positive, CollisionError},
    math::{self as m, Pose, Unit, EPSILON},
};

/// Cosine of the widest angle between a query direction and a capsule's side normal
/// at which the straight side is still reported as the farthest feature.
pub const CAPSULE_EDGE_FEATURE_SELECTION: f64 = 0.98;

/// The physical shape of a collider fixture.
///
/// Capsules and segments lie along the local x axis.
/// Lengths are stored halved because this makes most tests simpler.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ColliderShape {
    Circle { r: f64 },
    Rect { hw: f64, hh: f64 },
    Capsule { hl: f64, r: f64 },
    Segment { hl: f64 },
    Polygon(ConvexPolygon),
}

/// The kind of a [`ColliderShape`] without its dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ShapeKind {
    Circle,
    Rect,
    Capsule,
    Segment,
    Polygon,
}

/// A single point on a shape's boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub point: m::Vec2,
    /// Index of the vertex on its shape, stable between calls.
    pub index: usize,
}

/// An edge of a shape, oriented counter-clockwise so that
/// its outward normal is the right normal of `edge`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeFeature {
    pub v1: Vertex,
    pub v2: Vertex,
    /// Whichever endpoint was farthest along the query direction.
    pub max: Vertex,
    /// `v2 - v1`
    pub edge: m::Vec2,
    pub index: usize,
}

impl EdgeFeature {
    pub fn new(v1: Vertex, v2: Vertex, max: Vertex, index: usize) -> Self {
        EdgeFeature {
            v1,
            v2,
            max,
            edge: v2.point - v1.point,
            index,
        }
    }

    #[inline]
    pub fn outward_normal(&self) -> m::Vec2 {
        m::right_normal(self.edge).normalized()
    }
}

/// The part of a shape farthest along some direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Feature {
    Vertex(Vertex),
    Edge(EdgeFeature),
}

/// A shape projected onto an axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Length of the overlapping part, zero if there is none.
    #[inline]
    pub fn overlap(&self, other: &Interval) -> f64 {
        (self.max.min(other.max) - self.min.max(other.min)).max(0.0)
    }

    /// Whether `other` lies completely inside this interval.
    #[inline]
    pub fn contains(&self, other: &Interval) -> bool {
        self.min <= other.min && self.max >= other.max
    }

    #[inline]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }
}

impl ColliderShape {
    pub fn new_circle(radius: f64) -> Result<Self, CollisionError> {
        Ok(ColliderShape::Circle {
            r: check_positive(radius, CollisionError::InvalidRadius)?,
        })
    }

    /// Create a rect with both sides set to the same length.
    pub fn new_square(side_length: f64) -> Result<Self, CollisionError> {
        Self::new_rect(side_length, side_length)
    }

    pub fn new_rect(width: f64, height: f64) -> Result<Self, CollisionError> {
        let hw = check_positive(width, CollisionError::InvalidLength)? / 2.0;
        let hh = check_positive(height, CollisionError::InvalidLength)? / 2.0;
        Ok(ColliderShape::Rect { hw, hh })
    }

    /// Create a capsule whose straight middle part is `length` long.
    pub fn new_capsule(length: f64, radius: f64) -> Result<Self, CollisionError> {
        Ok(ColliderShape::Capsule {
            hl: check_positive(length, CollisionError::InvalidLength)? / 2.0,
            r: check_positive(radius, CollisionError::InvalidRadius)?,
        })
    }

    pub fn new_segment(length: f64) -> Result<Self, CollisionError> {
        Ok(ColliderShape::Segment {
            hl: check_positive(length, CollisionError::InvalidLength)? / 2.0,
        })
    }

    pub fn new_polygon(vertices: Vec<m::Vec2>) -> Result<Self, CollisionError> {
        ConvexPolygon::new(vertices).map(ColliderShape::Polygon)
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            ColliderShape::Circle { .. } => ShapeKind::Circle,
            ColliderShape::Rect { .. } => ShapeKind::Rect,
            ColliderShape::Capsule { .. } => ShapeKind::Capsule,
            ColliderShape::Segment { .. } => ShapeKind::Segment,
            ColliderShape::Polygon(_) => ShapeKind::Polygon,
        }
    }

    /// Maximum distance of any point of the shape from its local origin.
    pub fn radius(&self) -> f64 {
        match self {
            ColliderShape::Circle { r } => *r,
            ColliderShape::Rect { hw, hh } => (hw * hw + hh * hh).sqrt(),
            ColliderShape::Capsule { hl, r } => hl + r,
            ColliderShape::Segment { hl } => *hl,
            ColliderShape::Polygon(poly) => poly.radius(),
        }
    }

    /// The geometric center in shape-local space.
    pub fn local_center(&self) -> m::Vec2 {
        match self {
            ColliderShape::Polygon(poly) => poly.centroid(),
            _ => m::Vec2::zero(),
        }
    }

    #[inline]
    pub fn center(&self, pose: &Pose) -> m::Vec2 {
        *pose * self.local_center()
    }

    pub fn aabb(&self, pose: &Pose) -> AABB {
        let x = self.project(Unit::unit_x(), pose);
        let y = self.project(Unit::unit_y(), pose);
        AABB {
            min: m::Vec2::new(x.min, y.min),
            max: m::Vec2::new(x.max, y.max),
        }
    }

    /// The support function: the point of the shape farthest along `dir`.
    ///
    /// `dir` does not need to be normalized.
    pub fn farthest_point(&self, dir: m::Vec2, pose: &Pose) -> m::Vec2 {
        let local_dir = pose.rotation.reversed() * dir;
        let local_point = match self {
            ColliderShape::Circle { r } => *r * normalize_or_x(local_dir),
            ColliderShape::Rect { hw, hh } => m::Vec2::new(
                if local_dir.x >= 0.0 { *hw } else { -hw },
                if local_dir.y >= 0.0 { *hh } else { -hh },
            ),
            ColliderShape::Capsule { hl, r } => {
                let end = if local_dir.x >= 0.0 { *hl } else { -hl };
                m::Vec2::new(end, 0.0) + *r * normalize_or_x(local_dir)
            }
            ColliderShape::Segment { hl } => {
                m::Vec2::new(if local_dir.x >= 0.0 { *hl } else { -hl }, 0.0)
            }
            ColliderShape::Polygon(poly) => {
                poly.vertices()[polygon::farthest_vertex_index(poly.vertices(), local_dir)]
            }
        };
        *pose * local_point
    }

    /// The vertex or edge of the shape farthest along `dir`.
    pub fn farthest_feature(&self, dir: m::Vec2, pose: &Pose) -> Feature {
        match self {
            ColliderShape::Circle { .. } => Feature::Vertex(Vertex {
                point: self.farthest_point(dir, pose),
                index: 0,
            }),
            ColliderShape::Rect { hw, hh } => polygon::farthest_edge(&rect_vertices(*hw, *hh), dir, pose),
            ColliderShape::Polygon(poly) => polygon::farthest_edge(poly.vertices(), dir, pose),
            ColliderShape::Segment { hl } => {
                let local_dir = pose.rotation.reversed() * dir;
                let ends = [m::Vec2::new(-hl, 0.0), m::Vec2::new(*hl, 0.0)];
                // the right normal of left-to-right points down,
                // so flip the edge when the direction points up
                let (i1, i2) = if local_dir.y <= 0.0 { (0, 1) } else { (1, 0) };
                let vertex = |i: usize| Vertex {
                    point: *pose * ends[i],
                    index: i,
                };
                let max = if ends[i2].dot(local_dir) > ends[i1].dot(local_dir) {
                    i2
                } else {
                    i1
                };
                Feature::Edge(EdgeFeature::new(vertex(i1), vertex(i2), vertex(max), 0))
            }
            ColliderShape::Capsule { hl, r } => {
                let local_dir = normalize_or_x(pose.rotation.reversed() * dir);
                if local_dir.y.abs() >= CAPSULE_EDGE_FEATURE_SELECTION {
                    let verts = rect_vertices(*hl, *r);
                    let (i1, i2, edge_idx) = if local_dir.y > 0.0 { (2, 3, 1) } else { (0, 1, 0) };
                    let vertex = |i: usize| Vertex {
                        point: *pose * verts[i],
                        index: i,
                    };
                    let max = if verts[i2].dot(local_dir) > verts[i1].dot(local_dir) {
                        i2
                    } else {
                        i1
                    };
                    Feature::Edge(EdgeFeature::new(vertex(i1), vertex(i2), vertex(max), edge_idx))
                } else {
                    Feature::Vertex(Vertex {
                        point: self.farthest_point(dir, pose),
                        // after the four corners of the flat sides
                        index: if local_dir.x >= 0.0 { 5 } else { 4 },
                    })
                }
            }
        }
    }

    /// Check whether or not a point is inside the shape.
    pub fn contains_point(&self, point: m::Vec2, pose: &Pose) -> bool {
        let p = pose.inversed() * point;
        match self {
            ColliderShape::Circle { r } => p.mag_sq() < r * r,
            ColliderShape::Rect { hw, hh } => p.x.abs() < *hw && p.y.abs() < *hh,
            ColliderShape::Capsule { hl, r } => {
                let x_dist = (p.x.abs() - hl).max(0.0);
                let y_dist = p.y.abs();
                x_dist * x_dist + y_dist * y_dist < r * r
            }
            ColliderShape::Segment { hl } => p.y.abs() <= EPSILON && p.x.abs() <= *hl,
            ColliderShape::Polygon(poly) => polygon::loop_contains(poly.vertices(), p),
        }
    }

    /// Project the shape onto a world-space axis.
    pub fn project(&self, axis: Unit<m::Vec2>, pose: &Pose) -> Interval {
        let (min, max) = match self {
            ColliderShape::Circle { r } => {
                let c = pose.translation.dot(*axis);
                (c - r, c + r)
            }
            ColliderShape::Rect { hw, hh } => {
                let local = pose.rotation.reversed() * *axis;
                let extent = local.x.abs() * hw + local.y.abs() * hh;
                let c = pose.translation.dot(*axis);
                (c - extent, c + extent)
            }
            ColliderShape::Capsule { hl, r } => {
                let local = pose.rotation.reversed() * *axis;
                let extent = local.x.abs() * hl + r;
                let c = pose.translation.dot(*axis);
                (c - extent, c + extent)
            }
            ColliderShape::Segment { hl } => {
                let local = pose.rotation.reversed() * *axis;
                let extent = local.x.abs() * hl;
                let c = pose.translation.dot(*axis);
                (c - extent, c + extent)
            }
            ColliderShape::Polygon(poly) => polygon::project_vertices(poly.vertices(), *axis, pose),
        };
        Interval { min, max }
    }

    /// Centers of the rounded parts of the shape, in world space.
    ///
    /// Separating axes for a round feature come from these points
    /// towards the closest point on the other shape.
    pub fn foci(&self, pose: &Pose) -> Vec<m::Vec2> {
        match self {
            ColliderShape::Circle { .. } => vec![pose.translation],
            ColliderShape::Capsule { hl, .. } => vec![
                *pose * m::Vec2::new(-hl, 0.0),
                *pose * m::Vec2::new(*hl, 0.0),
            ],
            _ => Vec::new(),
        }
    }

    /// Candidate separating axes contributed by this shape,
    /// given the foci of the shape it is being tested against.
    pub fn sat_axes(&self, foci: &[m::Vec2], pose: &Pose) -> Vec<Unit<m::Vec2>> {
        let to_focus = |from: m::Vec2, focus: m::Vec2| Unit::try_new(focus - from, EPSILON);
        match self {
            ColliderShape::Circle { .. } => foci
                .iter()
                .filter_map(|f| to_focus(pose.translation, *f))
                .collect(),
            ColliderShape::Rect { hw, hh } => {
                vertex_loop_axes(&rect_vertices(*hw, *hh), foci, pose)
            }
            ColliderShape::Polygon(poly) => vertex_loop_axes(poly.vertices(), foci, pose),
            ColliderShape::Capsule { hl, .. } | ColliderShape::Segment { hl } => {
                let a = *pose * m::Vec2::new(-hl, 0.0);
                let b = *pose * m::Vec2::new(*hl, 0.0);
                let dir = pose.rotation * Unit::unit_x();
                let mut axes = vec![m::unit_left_normal(dir)];
                if matches!(self, ColliderShape::Segment { .. }) {
                    axes.push(dir);
                }
                axes.extend(
                    foci.iter()
                        .filter_map(|f| to_focus(m::closest_point_on_segment(*f, a, b), *f)),
                );
                axes
            }
        }
    }
}

/// Counter-clockwise corners of an axis-aligned box centered on the origin.
pub(super) fn rect_vertices(hw: f64, hh: f64) -> [m::Vec2; 4] {
    [
        m::Vec2::new(-hw, -hh),
        m::Vec2::new(hw, -hh),
        m::Vec2::new(hw, hh),
        m::Vec2::new(-hw, hh),
    ]
}

fn vertex_loop_axes(vertices: &[m::Vec2], foci: &[m::Vec2], pose: &Pose) -> Vec<Unit<m::Vec2>> {
    let mut axes: Vec<Unit<m::Vec2>> = polygon::edge_normals(vertices, pose)
        .map(Unit::new_unchecked)
        .collect();
    for focus in foci {
        let closest = vertices
            .iter()
            .map(|v| *pose * *v)
            .min_by(|a, b| (*a - *focus).mag_sq().total_cmp(&(*b - *focus).mag_sq()));
        if let Some(axis) = closest.and_then(|c| Unit::try_new(*focus - c, EPSILON)) {
            axes.push(axis);
        }
    }
    axes
}

fn normalize_or_x(v: m::Vec2) -> m::Vec2 {
    Unit::try_new(v, EPSILON)
        .map(Unit::into_inner)
        .unwrap_or_else(m::Vec2::unit_x)
}
