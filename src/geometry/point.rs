//! 2D and 3D point types.

use crate::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A point (or vector) in the slice plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: Scalar,
    pub y: Scalar,
}

impl Point2 {
    #[inline]
    pub fn new(x: Scalar, y: Scalar) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Euclidean length when treated as a vector.
    #[inline]
    pub fn length(&self) -> Scalar {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Squared length; cheaper when only comparisons are needed.
    #[inline]
    pub fn length_squared(&self) -> Scalar {
        self.x * self.x + self.y * self.y
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point2) -> Scalar {
        (*other - *self).length()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(&self, other: &Point2) -> Scalar {
        (*other - *self).length_squared()
    }

    /// Unit vector in the same direction, or None for a near-zero vector.
    pub fn normalized(&self) -> Option<Point2> {
        let len = self.length();
        if len < crate::EPSILON {
            None
        } else {
            Some(Point2::new(self.x / len, self.y / len))
        }
    }

    /// Perpendicular vector, rotated 90 degrees counter-clockwise.
    #[inline]
    pub fn perp(&self) -> Point2 {
        Point2::new(-self.y, self.x)
    }

    /// Check coincidence within the given tolerance.
    #[inline]
    pub fn same_as(&self, other: &Point2, epsilon: Scalar) -> bool {
        self.distance_squared(other) < epsilon * epsilon
    }
}

impl Add for Point2 {
    type Output = Point2;
    #[inline]
    fn add(self, rhs: Point2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Point2;
    #[inline]
    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<Scalar> for Point2 {
    type Output = Point2;
    #[inline]
    fn mul(self, rhs: Scalar) -> Point2 {
        Point2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<Scalar> for Point2 {
    type Output = Point2;
    #[inline]
    fn div(self, rhs: Scalar) -> Point2 {
        Point2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Point2 {
    type Output = Point2;
    #[inline]
    fn neg(self) -> Point2 {
        Point2::new(-self.x, -self.y)
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// A point in model space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: Scalar,
    pub y: Scalar,
    pub z: Scalar,
}

impl Point3 {
    #[inline]
    pub fn new(x: Scalar, y: Scalar, z: Scalar) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Euclidean length when treated as a vector.
    #[inline]
    pub fn length(&self) -> Scalar {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Cross product with another vector.
    #[inline]
    pub fn cross(&self, other: &Point3) -> Point3 {
        Point3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector in the same direction, or None for a near-zero vector.
    pub fn normalized(&self) -> Option<Point3> {
        let len = self.length();
        if len < crate::EPSILON {
            None
        } else {
            Some(Point3::new(self.x / len, self.y / len, self.z / len))
        }
    }

    /// Project onto the build plane, dropping Z.
    #[inline]
    pub fn xy(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

impl Add for Point3 {
    type Output = Point3;
    #[inline]
    fn add(self, rhs: Point3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Point3;
    #[inline]
    fn sub(self, rhs: Point3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<Scalar> for Point3 {
    type Output = Point3;
    #[inline]
    fn mul(self, rhs: Scalar) -> Point3 {
        Point3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point2_arithmetic() {
        let a = Point2::new(1.0, 2.0);
        let b = Point2::new(3.0, 5.0);
        assert_eq!(a + b, Point2::new(4.0, 7.0));
        assert_eq!(b - a, Point2::new(2.0, 3.0));
        assert_eq!(a * 2.0, Point2::new(2.0, 4.0));
        assert_eq!(b / 2.0, Point2::new(1.5, 2.5));
    }

    #[test]
    fn test_point2_normalized() {
        let v = Point2::new(3.0, 4.0);
        let n = v.normalized().unwrap();
        approx::assert_relative_eq!(n.length(), 1.0);
        approx::assert_relative_eq!(n.x, 0.6);
        assert!(Point2::zero().normalized().is_none());
    }

    #[test]
    fn test_point2_same_as() {
        let a = Point2::new(1.0, 1.0);
        let b = Point2::new(1.0 + 1e-8, 1.0);
        assert!(a.same_as(&b, 1e-6));
        assert!(!a.same_as(&Point2::new(1.1, 1.0), 1e-6));
    }

    #[test]
    fn test_point3_cross() {
        let x = Point3::new(1.0, 0.0, 0.0);
        let y = Point3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(&y), Point3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_point3_xy() {
        assert_eq!(Point3::new(1.0, 2.0, 3.0).xy(), Point2::new(1.0, 2.0));
    }
}
