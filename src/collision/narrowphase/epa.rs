//! The Expanding Polytope Algorithm, finding penetration depth
//! from a GJK simplex that encloses the origin.

use std::{cmp::Ordering, collections::BinaryHeap};

use super::{default_distance_epsilon, gjk::MinkowskiDifference, Penetration, MIN_ITERATIONS};
use crate::{
    error::{check_iterations, check_positive, CollisionError},
    math::{self as m, Unit, EPSILON},
};

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct EpaParams {
    pub max_iterations: usize,
    /// Expansion stops once a new support point lies
    /// less than this far beyond the closest edge.
    pub distance_epsilon: f64,
}

impl Default for EpaParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            distance_epsilon: default_distance_epsilon(),
        }
    }
}

impl EpaParams {
    pub fn validate(&self) -> Result<(), CollisionError> {
        check_iterations(self.max_iterations, MIN_ITERATIONS)?;
        check_positive(self.distance_epsilon, CollisionError::InvalidEpsilon)?;
        Ok(())
    }
}

/// An edge of the polytope, ordered so that the heap pops the edge closest to the origin.
#[derive(Clone, Copy, Debug)]
struct PolytopeEdge {
    p1: m::Vec2,
    p2: m::Vec2,
    normal: Unit<m::Vec2>,
    distance: f64,
}

impl PolytopeEdge {
    /// `None` if the edge has no length and thus no normal.
    fn new(p1: m::Vec2, p2: m::Vec2, winding: f64) -> Option<Self> {
        let edge = p2 - p1;
        let outward = if winding < 0.0 {
            m::left_normal(edge)
        } else {
            m::right_normal(edge)
        };
        let normal = Unit::try_new(outward, EPSILON)?;
        Some(PolytopeEdge {
            p1,
            p2,
            normal,
            distance: p1.dot(*normal).abs(),
        })
    }
}

// reversed ordering to make BinaryHeap a min-heap

impl PartialEq for PolytopeEdge {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for PolytopeEdge {}
impl PartialOrd for PolytopeEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PolytopeEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance.total_cmp(&self.distance)
    }
}

/// Winding of a polytope containing the origin: positive for counter-clockwise.
fn winding(points: &[m::Vec2]) -> f64 {
    for (a, b) in points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .take(points.len())
    {
        let c = m::cross(*a, *b);
        if c > 0.0 {
            return 1.0;
        } else if c < 0.0 {
            return -1.0;
        }
    }
    0.0
}

pub(super) fn penetration(
    md: &MinkowskiDifference,
    simplex: &[m::Vec2],
    params: &EpaParams,
) -> Option<Penetration> {
    let winding = winding(simplex);
    let mut edges: BinaryHeap<PolytopeEdge> = BinaryHeap::with_capacity(params.max_iterations + 3);
    for (i, p1) in simplex.iter().enumerate() {
        let p2 = simplex[(i + 1) % simplex.len()];
        if let Some(edge) = PolytopeEdge::new(*p1, p2, winding) {
            edges.push(edge);
        }
    }

    let mut closest = None;
    for _ in 0..params.max_iterations {
        let Some(edge) = edges.pop() else {
            log::trace!("EPA ran out of polytope edges");
            return None;
        };
        let support = md.support(*edge.normal);
        let projection = support.dot(*edge.normal);
        if projection - edge.distance < params.distance_epsilon {
            return Some(Penetration {
                normal: edge.normal,
                depth: edge.distance,
            });
        }

        // split the edge at the new support point
        if let Some(e) = PolytopeEdge::new(edge.p1, support, winding) {
            edges.push(e);
        }
        if let Some(e) = PolytopeEdge::new(support, edge.p2, winding) {
            edges.push(e);
        }
        closest = Some(edge);
    }

    log::debug!(
        "EPA reached its limit of {} iterations",
        params.max_iterations
    );
    // the closest edge found so far is still a lower bound on the depth
    let edge = edges.peek().copied().or(closest)?;
    Some(Penetration {
        normal: edge.normal,
        depth: edge.distance,
    })
}
