//! Geometry primitives for the toolpath pipeline.
//!
//! This module provides the fundamental geometric types used throughout:
//! - [`Point2`] and [`Point3`] - 2D and 3D points in millimeters
//! - [`Segment`] - Unordered 2D line segment
//! - [`Loop`] - Closed cyclic outline with implicit last-to-first edge
//! - [`OpenPath`] - Open sequence of connected points
//! - [`Limits`] - Axis-aligned 3D bounding box
//!
//! All coordinates are IEEE-754 doubles in millimeters. Coincidence tests
//! use the crate-wide [`EPSILON`](crate::EPSILON) tolerance.

mod limits;
mod loops;
mod point;
mod segment;

pub use limits::Limits;
pub use loops::{Loop, LoopList, OpenPath, OpenPathList};
pub use point::{Point2, Point3};
pub use segment::Segment;

use crate::Scalar;

/// Cross product of two 2D vectors (returns the scalar Z component).
#[inline]
pub fn cross2(a: Point2, b: Point2) -> Scalar {
    a.x * b.y - a.y * b.x
}

/// Dot product of two 2D vectors.
#[inline]
pub fn dot2(a: Point2, b: Point2) -> Scalar {
    a.x * b.x + a.y * b.y
}

/// Linear interpolation between two 2D points.
#[inline]
pub fn lerp2(a: Point2, b: Point2, t: Scalar) -> Point2 {
    Point2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// Check if a value is approximately equal to another within epsilon.
#[inline]
pub fn approx_eq(a: Scalar, b: Scalar, epsilon: Scalar) -> bool {
    (a - b).abs() < epsilon
}

/// Cosine of the turning angle at `b` when walking a -> b -> c.
///
/// Returns 1 for a straight continuation, -1 for a full reversal.
/// Degenerate (zero-length) legs count as straight.
pub fn turn_cos(a: Point2, b: Point2, c: Point2) -> Scalar {
    let u = b - a;
    let v = c - b;
    let lu = u.length();
    let lv = v.length();
    if lu < crate::EPSILON || lv < crate::EPSILON {
        return 1.0;
    }
    (dot2(u, v) / (lu * lv)).clamp(-1.0, 1.0)
}

/// Bounded 2D segment/segment intersection.
///
/// Returns the intersection point and the two curve parameters in [0, 1],
/// or None for parallel or non-overlapping segments.
pub fn segment_intersection(
    a0: Point2,
    a1: Point2,
    b0: Point2,
    b1: Point2,
) -> Option<(Point2, Scalar, Scalar)> {
    let da = a1 - a0;
    let db = b1 - b0;
    let denom = cross2(da, db);
    if denom.abs() < crate::EPSILON {
        return None;
    }
    let d = b0 - a0;
    let t = cross2(d, db) / denom;
    let u = cross2(d, da) / denom;
    let eps = crate::EPSILON;
    if t >= -eps && t <= 1.0 + eps && u >= -eps && u <= 1.0 + eps {
        let tc = t.clamp(0.0, 1.0);
        Some((lerp2(a0, a1, tc), tc, u.clamp(0.0, 1.0)))
    } else {
        None
    }
}
