//! Rectilinear infill grid.
//!
//! The grid owns two families of rays spanning the build area: horizontal
//! rays at fixed Y values and vertical rays at fixed X values. Per layer,
//! each selected ray is intersected with the interior loops to produce the
//! inside intervals ([`GridRanges`]), which later become the rectilinear
//! raster paths.

use crate::geometry::{Limits, Loop, OpenPath, OpenPathList, Point2};
use crate::Scalar;

/// One inside-the-outline interval along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalarRange {
    pub min: Scalar,
    pub max: Scalar,
}

impl ScalarRange {
    pub fn new(min: Scalar, max: Scalar) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> Scalar {
        self.max - self.min
    }
}

/// Per-layer ray intervals, parallel to the grid's coordinate lists.
/// Rays skipped by the density stride hold empty interval lists.
#[derive(Clone, Debug, Default)]
pub struct GridRanges {
    pub x_rays: Vec<Vec<ScalarRange>>,
    pub y_rays: Vec<Vec<ScalarRange>>,
}

impl GridRanges {
    pub fn is_empty(&self) -> bool {
        self.x_rays.iter().all(|r| r.is_empty()) && self.y_rays.iter().all(|r| r.is_empty())
    }
}

/// Evenly spaced ray coordinates covering the build footprint.
#[derive(Clone, Debug)]
pub struct Grid {
    /// Y coordinates of the horizontal (x-aligned) rays.
    y_values: Vec<Scalar>,
    /// X coordinates of the vertical (y-aligned) rays.
    x_values: Vec<Scalar>,
}

impl Grid {
    /// Lay rays over the given footprint at `spacing`. Limits should be
    /// tubularized and slightly inflated by the caller so boundary
    /// geometry is never missed.
    pub fn new(limits: &Limits, spacing: Scalar) -> Self {
        Self {
            y_values: ray_coordinates(limits.y_min, limits.y_max, spacing),
            x_values: ray_coordinates(limits.x_min, limits.x_max, spacing),
        }
    }

    pub fn y_values(&self) -> &[Scalar] {
        &self.y_values
    }

    pub fn x_values(&self) -> &[Scalar] {
        &self.x_values
    }

    /// Intersect every `stride`-th ray with the interior loops.
    pub fn intersect(&self, interiors: &[Loop], stride: usize) -> GridRanges {
        let stride = stride.max(1);
        let mut ranges = GridRanges {
            x_rays: vec![Vec::new(); self.y_values.len()],
            y_rays: vec![Vec::new(); self.x_values.len()],
        };
        if interiors.is_empty() {
            return ranges;
        }
        for (i, &y) in self.y_values.iter().enumerate() {
            if i % stride == 0 {
                ranges.x_rays[i] = cast_ray(interiors, y, Axis::X);
            }
        }
        for (i, &x) in self.x_values.iter().enumerate() {
            if i % stride == 0 {
                ranges.y_rays[i] = cast_ray(interiors, x, Axis::Y);
            }
        }
        ranges
    }

    /// Turn one axis of the ranges into raster paths. Interval traversal
    /// direction alternates ray to ray so consecutive paths snake back
    /// and forth.
    pub fn paths_from_ranges(&self, ranges: &GridRanges, along_x: bool) -> OpenPathList {
        let mut paths = OpenPathList::new();
        let (coords, rays) = if along_x {
            (&self.y_values, &ranges.x_rays)
        } else {
            (&self.x_values, &ranges.y_rays)
        };

        let mut forward = true;
        for (ray, &coord) in rays.iter().zip(coords.iter()) {
            if ray.is_empty() {
                continue;
            }
            let mut intervals: Vec<&ScalarRange> = ray.iter().collect();
            if !forward {
                intervals.reverse();
            }
            for r in intervals {
                let (lo, hi) = if forward { (r.min, r.max) } else { (r.max, r.min) };
                let path = if along_x {
                    OpenPath::from_points(vec![Point2::new(lo, coord), Point2::new(hi, coord)])
                } else {
                    OpenPath::from_points(vec![Point2::new(coord, lo), Point2::new(coord, hi)])
                };
                paths.push(path);
            }
            forward = !forward;
        }
        paths
    }
}

/// Rays sit at the centers of spacing-wide cells, so a bead laid on a ray
/// reaches the cell edges.
fn ray_coordinates(min: Scalar, max: Scalar, spacing: Scalar) -> Vec<Scalar> {
    let mut values = Vec::new();
    if spacing <= 0.0 || max < min {
        return values;
    }
    let mut v = min + spacing * 0.5;
    while v < max {
        values.push(v);
        v += spacing;
    }
    values
}

enum Axis {
    X,
    Y,
}

/// Even-odd crossings of one ray with the loop set, paired into inside
/// intervals.
fn cast_ray(loops: &[Loop], at: Scalar, axis: Axis) -> Vec<ScalarRange> {
    let mut crossings = Vec::new();
    for lp in loops {
        for (a, b) in lp.edges() {
            let (a_pos, a_along, b_pos, b_along) = match axis {
                Axis::X => (a.y, a.x, b.y, b.x),
                Axis::Y => (a.x, a.y, b.x, b.y),
            };
            // half-open rule: each edge owns its start endpoint only
            if (a_pos > at) != (b_pos > at) {
                let t = (at - a_pos) / (b_pos - a_pos);
                crossings.push(a_along + (b_along - a_along) * t);
            }
        }
    }
    crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    crossings
        .chunks_exact(2)
        .map(|pair| ScalarRange::new(pair[0], pair[1]))
        .filter(|r| r.span() > crate::EPSILON)
        .collect()
}
