use super::Ray;
use crate::{error::CollisionError, math as m};

/// Axis-aligned bounding box.
///
/// `min` is never greater than `max` on either axis.
/// Zero-size boxes are fine.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AABB {
    pub min: m::Vec2,
    pub max: m::Vec2,
}

impl AABB {
    /// Create a box from its corners, refusing inverted ones.
    pub fn new(min: m::Vec2, max: m::Vec2) -> Result<Self, CollisionError> {
        let any_nan = min.x.is_nan() || min.y.is_nan() || max.x.is_nan() || max.y.is_nan();
        if any_nan || min.x > max.x || min.y > max.y {
            return Err(CollisionError::InvertedAabb {
                min: [min.x, min.y],
                max: [max.x, max.y],
            });
        }
        Ok(AABB { min, max })
    }

    /// A zero-size box at the origin.
    pub fn zero() -> Self {
        AABB {
            min: m::Vec2::zero(),
            max: m::Vec2::zero(),
        }
    }

    /// A zero-size box at the given point.
    pub fn at_point(p: m::Vec2) -> Self {
        AABB { min: p, max: p }
    }

    pub fn from_center_half_extents(center: m::Vec2, half_extents: m::Vec2) -> Self {
        let half_extents = half_extents.abs();
        AABB {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// The box covering a ray from its start to `max_length` along it.
    ///
    /// A non-positive or infinite length means the ray is unbounded.
    pub fn from_ray(ray: Ray, max_length: f64) -> Self {
        let length = if max_length > 0.0 && max_length.is_finite() {
            max_length
        } else {
            f64::MAX
        };
        // keep infinities out of the box when the ray is axis-aligned
        let reach = |start: f64, dir: f64| {
            let end = start + dir * length;
            if end.is_finite() {
                end
            } else {
                f64::MAX.copysign(dir)
            }
        };
        let end = m::Vec2::new(reach(ray.start.x, ray.dir.x), reach(ray.start.y, ray.dir.y));
        AABB {
            min: ray.start.min_by_component(end),
            max: ray.start.max_by_component(end),
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// The 2D equivalent of surface area, used as the cost metric in the AABB tree.
    #[inline]
    pub fn perimeter(&self) -> f64 {
        2.0 * (self.width() + self.height())
    }

    #[inline]
    pub fn center(&self) -> m::Vec2 {
        (self.min + self.max) * 0.5
    }

    /// The smallest box containing both boxes.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        AABB {
            min: self.min.min_by_component(other.min),
            max: self.max.max_by_component(other.max),
        }
    }

    /// The region shared by both boxes, if any.
    /// Boxes that only touch at their borders produce a zero-size intersection.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = self.min.max_by_component(other.min);
        let max = self.max.min_by_component(other.max);
        if min.x > max.x || min.y > max.y {
            None
        } else {
            Some(AABB { min, max })
        }
    }

    /// Whether the boxes overlap or touch.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Whether `other` lies completely inside this box.
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }

    #[inline]
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Grow the box by `expansion` in total along each axis,
    /// i.e. half of it on every side.
    ///
    /// A negative value shrinks the box, collapsing an axis to its center
    /// rather than turning it inside out.
    pub fn expanded(&self, expansion: f64) -> Self {
        let half = expansion * 0.5;
        let center = self.center();
        let shrink_axis = |min: f64, max: f64, c: f64| {
            if max - min + expansion < 0.0 {
                (c, c)
            } else {
                (min - half, max + half)
            }
        };
        let (min_x, max_x) = shrink_axis(self.min.x, self.max.x, center.x);
        let (min_y, max_y) = shrink_axis(self.min.y, self.max.y, center.y);
        AABB {
            min: m::Vec2::new(min_x, min_y),
            max: m::Vec2::new(max_x, max_y),
        }
    }

    /// Grow the box by `padding` on every side.
    #[inline]
    pub fn padded(&self, padding: f64) -> Self {
        self.expanded(2.0 * padding)
    }

    #[inline]
    pub fn translated(&self, shift: m::Vec2) -> Self {
        AABB {
            min: self.min + shift,
            max: self.max + shift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Unit;

    fn aabb(min: [f64; 2], max: [f64; 2]) -> AABB {
        AABB::new(min.into(), max.into()).unwrap()
    }

    #[test]
    fn rejects_inverted() {
        assert!(AABB::new(m::Vec2::new(1.0, 0.0), m::Vec2::new(0.0, 1.0)).is_err());
        assert!(AABB::new(m::Vec2::new(1.0, 1.0), m::Vec2::new(1.0, 1.0)).is_ok());
        assert!(AABB::new(m::Vec2::new(0.0, 0.0), m::Vec2::new(f64::NAN, 1.0)).is_err());
        assert!(AABB::new(m::Vec2::new(0.0, 0.0), m::Vec2::new(1.0, f64::NAN)).is_err());
        assert!(AABB::new(m::Vec2::new(f64::NAN, 0.0), m::Vec2::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn union_and_intersection() {
        let a = aabb([0.0, 0.0], [2.0, 2.0]);
        let b = aabb([1.0, -1.0], [3.0, 1.0]);
        assert_eq!(a.union(&b), aabb([0.0, -1.0], [3.0, 2.0]));
        assert_eq!(a.intersection(&b), Some(aabb([1.0, 0.0], [2.0, 1.0])));

        let far = aabb([5.0, 5.0], [6.0, 6.0]);
        assert_eq!(a.intersection(&far), None);
        assert!(!a.overlaps(&far));

        // touching borders count as overlapping
        let touching = aabb([2.0, 0.0], [3.0, 1.0]);
        assert!(a.overlaps(&touching));
        assert_eq!(a.intersection(&touching).map(|i| i.width()), Some(0.0));
    }

    #[test]
    fn containment() {
        let outer = aabb([0.0, 0.0], [4.0, 4.0]);
        let inner = aabb([1.0, 1.0], [2.0, 2.0]);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains(&outer));
        assert!(outer.contains_point(m::Vec2::new(4.0, 0.0)));
        assert!(!outer.contains_point(m::Vec2::new(4.1, 0.0)));
    }

    #[test]
    fn expansion_grows_and_shrinks() {
        let a = aabb([0.0, 0.0], [2.0, 1.0]);
        let grown = a.expanded(0.2);
        assert!((grown.min.x + 0.1).abs() < 1e-12);
        assert!((grown.max.y - 1.1).abs() < 1e-12);
        assert!(grown.contains(&a));
        assert!((grown.perimeter() - (a.perimeter() + 0.8)).abs() < 1e-12);

        let shrunk = a.expanded(-1.5);
        // x axis shrinks normally, y axis collapses to its center
        assert!((shrunk.width() - 0.5).abs() < 1e-12);
        assert_eq!(shrunk.height(), 0.0);
        assert_eq!(shrunk.min.y, 0.5);
        assert!(shrunk.min.x <= shrunk.max.x);
    }

    #[test]
    fn translation() {
        let a = aabb([0.0, 0.0], [1.0, 1.0]);
        assert_eq!(
            a.translated(m::Vec2::new(2.0, -1.0)),
            aabb([2.0, -1.0], [3.0, 0.0])
        );
    }

    #[test]
    fn ray_box() {
        let ray = Ray::new(m::Vec2::new(1.0, 1.0), Unit::new_normalize(m::Vec2::new(-1.0, 0.0)));
        let b = AABB::from_ray(ray, 3.0);
        assert_eq!(b, aabb([-2.0, 1.0], [1.0, 1.0]));

        let unbounded = AABB::from_ray(ray, 0.0);
        assert_eq!(unbounded.max.x, 1.0);
        assert!(unbounded.min.x < -1e300);
        assert!(unbounded.min.x.is_finite());
    }
}
