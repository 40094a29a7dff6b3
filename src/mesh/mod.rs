//! Triangle mesh input.
//!
//! The pipeline consumes a plain triangle soup: an array of triangles plus
//! the overall bounding limits. Triangles need not be deduplicated;
//! degenerate (zero-area) triangles are tolerated and skipped downstream.

mod stl;

pub use stl::load_stl;

use crate::geometry::{Limits, Point3};
use crate::Scalar;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single triangle in model space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub v0: Point3,
    pub v1: Point3,
    pub v2: Point3,
}

impl Triangle {
    #[inline]
    pub fn new(v0: Point3, v1: Point3, v2: Point3) -> Self {
        Self { v0, v1, v2 }
    }

    /// The three vertices ordered by ascending Z.
    pub fn z_sort(&self) -> (Point3, Point3, Point3) {
        let mut v = [self.v0, self.v1, self.v2];
        v.sort_by(|a, b| a.z.partial_cmp(&b.z).unwrap_or(std::cmp::Ordering::Equal));
        (v[0], v[1], v[2])
    }

    /// Unit surface normal, or None for a degenerate triangle.
    pub fn normal(&self) -> Option<Point3> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2).normalized()
    }

    /// True if the triangle has (near) zero area.
    pub fn is_degenerate(&self) -> bool {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2).length() < crate::EPSILON
    }

    /// Lowest and highest vertex Z.
    pub fn z_range(&self) -> (Scalar, Scalar) {
        let lo = self.v0.z.min(self.v1.z).min(self.v2.z);
        let hi = self.v0.z.max(self.v1.z).max(self.v2.z);
        (lo, hi)
    }
}

/// A triangle soup with its bounding limits.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    triangles: Vec<Triangle>,
    limits: Limits,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
            limits: Limits::new(),
        }
    }

    /// Build a mesh from a triangle list, computing limits.
    pub fn from_triangles(triangles: Vec<Triangle>) -> Self {
        let mut limits = Limits::new();
        for t in &triangles {
            limits.grow(t.v0);
            limits.grow(t.v1);
            limits.grow(t.v2);
        }
        Self { triangles, limits }
    }

    /// Load a mesh from an STL file (binary or ASCII, auto-detected).
    pub fn from_stl<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        load_stl(path.as_ref())
    }

    pub fn push(&mut self, t: Triangle) {
        self.limits.grow(t.v0);
        self.limits.grow(t.v1);
        self.limits.grow(t.v2);
        self.triangles.push(t);
    }

    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Axis-aligned box mesh used by tests and demos.
    pub fn cube(origin: Point3, edge: Scalar) -> Self {
        let o = origin;
        let e = edge;
        let p = |dx: Scalar, dy: Scalar, dz: Scalar| Point3::new(o.x + dx, o.y + dy, o.z + dz);
        // 12 triangles, outward-facing windings
        let quads: [[Point3; 4]; 6] = [
            // bottom (normal -Z)
            [p(0.0, 0.0, 0.0), p(0.0, e, 0.0), p(e, e, 0.0), p(e, 0.0, 0.0)],
            // top (normal +Z)
            [p(0.0, 0.0, e), p(e, 0.0, e), p(e, e, e), p(0.0, e, e)],
            // front (normal -Y)
            [p(0.0, 0.0, 0.0), p(e, 0.0, 0.0), p(e, 0.0, e), p(0.0, 0.0, e)],
            // back (normal +Y)
            [p(0.0, e, 0.0), p(0.0, e, e), p(e, e, e), p(e, e, 0.0)],
            // left (normal -X)
            [p(0.0, 0.0, 0.0), p(0.0, 0.0, e), p(0.0, e, e), p(0.0, e, 0.0)],
            // right (normal +X)
            [p(e, 0.0, 0.0), p(e, e, 0.0), p(e, e, e), p(e, 0.0, e)],
        ];
        let mut triangles = Vec::with_capacity(12);
        for q in &quads {
            triangles.push(Triangle::new(q[0], q[1], q[2]));
            triangles.push(Triangle::new(q[0], q[2], q[3]));
        }
        Self::from_triangles(triangles)
    }
}
