//! Axis-aligned 3D bounding box.

use super::Point3;
use crate::Scalar;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box over model space.
///
/// A fresh `Limits` is inverted (min = +inf, max = -inf) so that the first
/// `grow` establishes a valid box.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Limits {
    pub x_min: Scalar,
    pub x_max: Scalar,
    pub y_min: Scalar,
    pub y_max: Scalar,
    pub z_min: Scalar,
    pub z_max: Scalar,
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

impl Limits {
    /// Create an empty (inverted) box.
    pub fn new() -> Self {
        Self {
            x_min: Scalar::INFINITY,
            x_max: Scalar::NEG_INFINITY,
            y_min: Scalar::INFINITY,
            y_max: Scalar::NEG_INFINITY,
            z_min: Scalar::INFINITY,
            z_max: Scalar::NEG_INFINITY,
        }
    }

    /// Expand the box to contain a point.
    pub fn grow(&mut self, p: Point3) {
        self.x_min = self.x_min.min(p.x);
        self.x_max = self.x_max.max(p.x);
        self.y_min = self.y_min.min(p.y);
        self.y_max = self.y_max.max(p.y);
        self.z_min = self.z_min.min(p.z);
        self.z_max = self.z_max.max(p.z);
    }

    /// Widen each axis by the given margins.
    pub fn inflate(&mut self, dx: Scalar, dy: Scalar, dz: Scalar) {
        self.x_min -= dx;
        self.x_max += dx;
        self.y_min -= dy;
        self.y_max += dy;
        self.z_min -= dz;
        self.z_max += dz;
    }

    /// Collapse Z to a zero-height strip. Used when clipping rays against
    /// the build-plane footprint.
    pub fn tubularize(&mut self) {
        self.z_min = 0.0;
        self.z_max = 0.0;
    }

    /// True if no point has been grown into the box yet.
    pub fn is_empty(&self) -> bool {
        self.x_min > self.x_max
    }

    /// Center of the box.
    pub fn center(&self) -> Point3 {
        Point3::new(
            (self.x_min + self.x_max) * 0.5,
            (self.y_min + self.y_max) * 0.5,
            (self.z_min + self.z_max) * 0.5,
        )
    }

    pub fn x_span(&self) -> Scalar {
        self.x_max - self.x_min
    }

    pub fn y_span(&self) -> Scalar {
        self.y_max - self.y_min
    }

    pub fn z_span(&self) -> Scalar {
        self.z_max - self.z_min
    }
}
