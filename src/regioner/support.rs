//! Support region computation.
//!
//! Downward-facing triangles are projected onto the build plane and
//! accumulated from the top of the model down: the support region for a
//! layer is everything that overhangs somewhere above it, minus the
//! layer's own cross-section widened by a clearance margin.

use crate::clipper;
use crate::geometry::{Loop, LoopList};
use crate::layer::LayerMeasure;
use crate::mesh::Mesh;
use crate::Scalar;
use log::debug;

/// Configuration for overhang detection.
#[derive(Clone, Copy, Debug)]
pub struct SupportConfig {
    /// A triangle needs support when its unit normal Z falls below
    /// -cos(threshold). 45 degrees by default.
    pub threshold_cos: Scalar,
    /// Horizontal clearance kept between support and model walls (mm).
    pub margin: Scalar,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            threshold_cos: (45.0_f64).to_radians().cos(),
            margin: 1.0,
        }
    }
}

/// Compute the support loops for every layer.
///
/// `outlines` holds each layer's sliced cross-section; the result is
/// parallel to it.
pub fn support_loops_per_layer(
    mesh: &Mesh,
    measure: &LayerMeasure,
    outlines: &[LoopList],
    config: &SupportConfig,
) -> Vec<LoopList> {
    let layer_count = outlines.len();
    let mut result = vec![LoopList::new(); layer_count];
    if layer_count == 0 {
        return result;
    }

    // bucket overhang footprints by the layer where the overhang begins
    let mut overhangs: Vec<LoopList> = vec![LoopList::new(); layer_count];
    let mut overhang_triangles = 0usize;
    for t in mesh.triangles() {
        let normal = match t.normal() {
            Some(n) => n,
            None => continue,
        };
        if normal.z >= -config.threshold_cos {
            continue;
        }
        let (z_lo, _) = t.z_range();
        let layer = measure.z_to_layer_above(z_lo).min(layer_count - 1);
        if layer == 0 {
            continue; // resting on the build plate
        }
        if let Some(footprint) = projected_footprint(t) {
            overhangs[layer].push(footprint);
            overhang_triangles += 1;
        }
    }
    if overhang_triangles == 0 {
        return result;
    }
    debug!("{} overhang triangles need support", overhang_triangles);

    // walk down from the top, accumulating everything overhanging above
    let mut accumulated = LoopList::new();
    for layer in (0..layer_count).rev() {
        if !accumulated.is_empty() {
            let clearance = clipper::offset(&outlines[layer], config.margin);
            result[layer] = clipper::difference(&accumulated, &clearance);
        }
        for footprint in &overhangs[layer] {
            accumulated = clipper::union(&accumulated, std::slice::from_ref(footprint));
        }
    }
    result
}

/// Build-plane projection of a triangle, oriented counter-clockwise.
fn projected_footprint(t: &crate::mesh::Triangle) -> Option<Loop> {
    let points = vec![t.v0.xy(), t.v1.xy(), t.v2.xy()];
    let mut lp = Loop::from_points(points);
    if lp.area() < crate::EPSILON {
        return None; // vertical wall, no footprint
    }
    if lp.clockwise() {
        lp.reverse();
    }
    Some(lp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point2, Point3};
    use crate::mesh::Triangle;
    use crate::slicer::Slicer;

    /// A 2x2 slab floating from z=2 to z=3: pure overhang.
    fn floating_slab() -> Mesh {
        Mesh::cube(Point3::new(0.0, 0.0, 2.0), 2.0)
    }

    fn slice_all(mesh: &Mesh, measure: &LayerMeasure, layers: usize) -> Vec<LoopList> {
        let slicer = Slicer::new();
        (0..layers)
            .map(|i| {
                slicer
                    .slice(mesh.triangles(), measure.layer_position(i), i)
                    .outlines
            })
            .collect()
    }

    #[test]
    fn test_floating_slab_gets_support_below() {
        let mesh = floating_slab();
        let measure = LayerMeasure::new(0.0, 0.5, 0.5);
        let outlines = slice_all(&mesh, &measure, 8);
        let support =
            support_loops_per_layer(&mesh, &measure, &outlines, &SupportConfig::default());

        // layers under the slab carry support
        assert!(!support[0].is_empty());
        assert!(!support[2].is_empty());
        let area: Scalar = support[0].iter().map(|l| l.area()).sum();
        assert!((area - 4.0).abs() < 0.1, "support area {}", area);
    }

    #[test]
    fn test_no_support_inside_model() {
        // a plain cube on the plate needs no support anywhere
        let mesh = Mesh::cube(Point3::zero(), 2.0);
        let measure = LayerMeasure::new(0.0, 0.5, 0.5);
        let outlines = slice_all(&mesh, &measure, 4);
        let support =
            support_loops_per_layer(&mesh, &measure, &outlines, &SupportConfig::default());
        assert!(support.iter().all(|l| l.is_empty()));
    }

    #[test]
    fn test_support_respects_clearance_margin() {
        // a table: leg cube 0..2, overhanging top slab 2..3 spanning 0..6
        let mut mesh = Mesh::cube(Point3::new(0.0, 0.0, 0.0), 2.0);
        for t in Mesh::cube(Point3::new(0.0, 0.0, 2.0), 6.0).triangles() {
            // squash the top cube into a slab 6 x 6 x 1
            let squash = |p: Point3| Point3::new(p.x, p.y, 2.0 + (p.z - 2.0) / 6.0);
            mesh.push(Triangle::new(squash(t.v0), squash(t.v1), squash(t.v2)));
        }
        let measure = LayerMeasure::new(0.0, 0.5, 0.5);
        let outlines = slice_all(&mesh, &measure, 7);
        let config = SupportConfig {
            margin: 1.0,
            ..Default::default()
        };
        let support = support_loops_per_layer(&mesh, &measure, &outlines, &config);

        // support exists under the slab but stays a margin away from the leg
        assert!(!support[1].is_empty());
        let leg_interior = Point2::new(1.0, 1.0);
        let containing = support[1]
            .iter()
            .filter(|lp| lp.contains(leg_interior))
            .count();
        assert_eq!(containing % 2, 0, "support overlaps the leg");
    }

    #[test]
    fn test_projected_footprint_skips_walls() {
        let wall = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
        );
        assert!(projected_footprint(&wall).is_none());
    }
}
