//! Errors raised when a shape, detector or parameter set is built from invalid values.

/// A caller handed in a value that no detector can work with.
///
/// These are only ever returned at construction time.
/// Queries that simply find nothing (no overlap, no hit) return `None` instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CollisionError {
    #[error("Radius must be positive and finite, got {0}")]
    InvalidRadius(f64),
    #[error("Length must be positive and finite, got {0}")]
    InvalidLength(f64),
    #[error("AABB expansion must be non-negative and finite, got {0}")]
    InvalidExpansion(f64),
    #[error("Capacity estimate must be non-negative and finite, and fractions at most 1, got {0}")]
    InvalidEstimate(f64),
    #[error("Epsilon must be positive and finite, got {0}")]
    InvalidEpsilon(f64),
    #[error("At least {min} iterations are required, got {given}")]
    TooFewIterations { min: usize, given: usize },
    #[error("A polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("Polygon vertices {0} and {1} coincide")]
    CoincidentVertices(usize, usize),
    #[error("Polygon vertices around index {0} are collinear")]
    CollinearVertices(usize),
    #[error("Polygon is not convex")]
    NotConvex,
    #[error("Polygon vertices must be in counter-clockwise order")]
    ClockwiseWinding,
    #[error("AABB minimum {min:?} exceeds maximum {max:?}")]
    InvertedAabb { min: [f64; 2], max: [f64; 2] },
    #[error("Time interval [{0}, {1}] must be ordered and lie within [0, 1]")]
    InvalidInterval(f64, f64),
}

pub(crate) fn check_positive(
    value: f64,
    err: impl FnOnce(f64) -> CollisionError,
) -> Result<f64, CollisionError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(err(value))
    }
}

pub(crate) fn check_iterations(given: usize, min: usize) -> Result<usize, CollisionError> {
    if given < min {
        Err(CollisionError::TooFewIterations { min, given })
    } else {
        Ok(given)
    }
}
