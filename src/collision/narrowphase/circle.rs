//! Closed-form tests for shapes where the iterative algorithms
//! are slow or lose accuracy on the curved boundary.

use super::{Penetration, RaycastHit, Separation};
use crate::{
    collision::Ray,
    math::{self as m, Unit, EPSILON},
};

//
// CIRCLE <-> CIRCLE
//

pub(super) fn circle_circle_detect(c1: m::Vec2, r1: f64, c2: m::Vec2, r2: f64) -> bool {
    let r_sum = r1 + r2;
    (c2 - c1).mag_sq() < r_sum * r_sum
}

pub(super) fn circle_circle_penetration(
    c1: m::Vec2,
    r1: f64,
    c2: m::Vec2,
    r2: f64,
) -> Option<Penetration> {
    let dist = c2 - c1;
    let dist_sq = dist.mag_sq();
    let r_sum = r1 + r2;
    if dist_sq >= r_sum * r_sum {
        return None;
    }

    let normal = if dist_sq <= EPSILON {
        // same position, consider penetration to be on x axis
        Unit::unit_x()
    } else {
        Unit::new_normalize(dist)
    };
    Some(Penetration {
        normal,
        depth: r_sum - dist_sq.sqrt(),
    })
}

pub(super) fn circle_circle_distance(
    c1: m::Vec2,
    r1: f64,
    c2: m::Vec2,
    r2: f64,
) -> Option<Separation> {
    let dist = c2 - c1;
    let gap = dist.mag() - r1 - r2;
    if gap <= 0.0 {
        return None;
    }
    let normal = Unit::new_normalize(dist);
    Some(Separation {
        normal,
        distance: gap,
        points: [c1 + r1 * *normal, c2 - r2 * *normal],
    })
}

//
// RAYS
//

fn within_length(t: f64, max_length: f64) -> bool {
    max_length <= 0.0 || t <= max_length
}

pub(super) fn ray_circle(
    ray: Ray,
    max_length: f64,
    center: m::Vec2,
    r: f64,
) -> Option<RaycastHit> {
    let offset = ray.start - center;
    let b = offset.dot(*ray.dir);
    let c = offset.mag_sq() - r * r;
    // starting inside, or outside and pointing away
    if c <= 0.0 || b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    if t < 0.0 || !within_length(t, max_length) {
        return None;
    }
    let point = ray.point_at(t);
    Some(RaycastHit {
        point,
        normal: Unit::new_normalize(point - center),
        distance: t,
    })
}

pub(super) fn ray_segment(
    ray: Ray,
    max_length: f64,
    a: m::Vec2,
    b: m::Vec2,
) -> Option<RaycastHit> {
    let edge = b - a;
    let denom = m::cross(*ray.dir, edge);
    if denom.abs() <= EPSILON {
        // parallel, the ray can at most graze the segment
        return None;
    }
    let to_a = a - ray.start;
    let t = m::cross(to_a, edge) / denom;
    let u = m::cross(to_a, *ray.dir) / denom;
    if t < 0.0 || !(0.0..=1.0).contains(&u) || !within_length(t, max_length) {
        return None;
    }
    let normal = Unit::new_normalize(m::right_normal(edge));
    let normal = if normal.dot(*ray.dir) > 0.0 {
        -normal
    } else {
        normal
    };
    Some(RaycastHit {
        point: ray.point_at(t),
        normal,
        distance: t,
    })
}
