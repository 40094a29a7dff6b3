//! Slicer - intersects triangles with slice planes and stitches the
//! resulting segments into closed outline loops.
//!
//! Segmentation classifies each vertex as above, below or on the plane
//! within the crate tolerance, then interpolates crossing edges. Stitching
//! walks the unordered segment soup endpoint-to-endpoint; chains that fail
//! to close are counted as orphans and dropped, so a non-manifold input
//! degrades to the closed portion of the layer instead of failing the job.

use crate::geometry::{lerp2, turn_cos, Loop, LoopList, Point2, Segment};
use crate::mesh::Triangle;
use crate::{Scalar, EPSILON};
use log::{debug, warn};

/// Vertex classification against a slice plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Above,
    Below,
    On,
}

fn classify(z: Scalar, plane_z: Scalar) -> Side {
    let d = z - plane_z;
    if d.abs() < EPSILON {
        Side::On
    } else if d > 0.0 {
        Side::Above
    } else {
        Side::Below
    }
}

/// Result of slicing one layer.
#[derive(Clone, Debug, Default)]
pub struct SlicedLayer {
    /// Closed outline loops, outer boundaries counter-clockwise and holes
    /// clockwise.
    pub outlines: LoopList,
    /// Segments that could not be chained into a closed loop.
    pub orphan_count: usize,
}

/// Per-layer slicing stage.
#[derive(Debug)]
pub struct Slicer {
    epsilon: Scalar,
}

impl Default for Slicer {
    fn default() -> Self {
        Self::new()
    }
}

impl Slicer {
    pub fn new() -> Self {
        Self { epsilon: EPSILON }
    }

    /// Widen the stitching tolerance; used by tests exercising noisy input.
    pub fn with_epsilon(epsilon: Scalar) -> Self {
        Self { epsilon }
    }

    /// Slice the given triangles at height `z`, producing the layer's
    /// outline loops.
    pub fn slice(&self, triangles: &[Triangle], z: Scalar, slice_index: usize) -> SlicedLayer {
        let mut segments = Vec::new();
        for t in triangles {
            if let Some(seg) = cut_triangle(t, z) {
                if !seg.is_degenerate(self.epsilon) {
                    segments.push(seg);
                }
            }
        }
        debug!("slice {}: {} segments", slice_index, segments.len());

        let (mut outlines, orphan_count) = self.stitch(segments);
        if orphan_count > 0 {
            warn!(
                "{}",
                crate::Error::UnclosableLoop {
                    slice: slice_index,
                    orphans: orphan_count,
                }
            );
        }
        orient_by_nesting(&mut outlines);
        SlicedLayer {
            outlines,
            orphan_count,
        }
    }

    /// Chain a segment soup into closed loops.
    ///
    /// Repeatedly seeds from the first unused segment and walks forward,
    /// at each step picking the unused segment with an endpoint nearest
    /// the chain tail (within epsilon). Among equally near candidates the
    /// one turning least wins, which keeps loops simple. A chain closes
    /// when the tail returns to the seed start; a stalled chain is
    /// discarded and its segments counted as orphans.
    fn stitch(&self, segments: Vec<Segment>) -> (LoopList, usize) {
        let mut used = vec![false; segments.len()];
        let mut loops = LoopList::new();
        let mut orphans = 0;

        for seed in 0..segments.len() {
            if used[seed] {
                continue;
            }
            used[seed] = true;
            let mut chain = vec![segments[seed].a, segments[seed].b];
            let mut chain_segments = 1usize;
            let mut closed = false;

            loop {
                let tail = chain[chain.len() - 1];
                if chain.len() > 2 && tail.same_as(&chain[0], self.epsilon) {
                    chain.pop(); // the closing point is implicit in a Loop
                    closed = true;
                    break;
                }

                match self.best_continuation(&segments, &used, &chain) {
                    Some((next, far)) => {
                        used[next] = true;
                        chain.push(far);
                        chain_segments += 1;
                    }
                    None => break,
                }
            }

            if closed && chain.len() >= 3 {
                loops.push(Loop::from_points(chain));
            } else {
                orphans += chain_segments;
            }
        }

        (loops, orphans)
    }

    /// Best unused segment continuing the chain, and its far endpoint.
    fn best_continuation(
        &self,
        segments: &[Segment],
        used: &[bool],
        chain: &[Point2],
    ) -> Option<(usize, Point2)> {
        let tail = chain[chain.len() - 1];
        let prev = chain[chain.len() - 2];
        let mut best: Option<(usize, Point2)> = None;
        let mut best_dist = self.epsilon;
        let mut best_turn = Scalar::NEG_INFINITY;

        for (i, seg) in segments.iter().enumerate() {
            if used[i] {
                continue;
            }
            for (near, far) in [(seg.a, seg.b), (seg.b, seg.a)] {
                let d = tail.distance(&near);
                if d > self.epsilon {
                    continue;
                }
                let turn = turn_cos(prev, tail, far);
                // closest endpoint first; straighter continuation on ties
                let better = d < best_dist - EPSILON * EPSILON
                    || ((d - best_dist).abs() <= EPSILON * EPSILON && turn > best_turn);
                if best.is_none() || better {
                    best = Some((i, far));
                    best_dist = d;
                    best_turn = turn;
                }
            }
        }
        best
    }
}

/// Intersect one triangle with the plane at `z`.
///
/// A triangle with an edge lying on the plane contributes that edge; a
/// lone on-plane vertex is a point and produces nothing; a straddling
/// triangle contributes the segment between its two edge crossings.
fn cut_triangle(t: &Triangle, z: Scalar) -> Option<Segment> {
    let verts = [t.v0, t.v1, t.v2];
    let sides = [
        classify(t.v0.z, z),
        classify(t.v1.z, z),
        classify(t.v2.z, z),
    ];
    let on_count = sides.iter().filter(|s| **s == Side::On).count();

    match on_count {
        3 => None, // horizontal facet; its boundary comes from the walls
        2 => {
            // the on-plane edge, verbatim
            let mut pts = verts
                .iter()
                .zip(sides.iter())
                .filter(|(_, s)| **s == Side::On)
                .map(|(v, _)| v.xy());
            let a = pts.next()?;
            let b = pts.next()?;
            Some(Segment::new(a, b))
        }
        1 => {
            // on-vertex plus a crossing of the opposite edge, or a lone point
            let on_idx = sides.iter().position(|s| *s == Side::On)?;
            let u = verts[(on_idx + 1) % 3];
            let v = verts[(on_idx + 2) % 3];
            let su = sides[(on_idx + 1) % 3];
            let sv = sides[(on_idx + 2) % 3];
            if su == sv {
                return None; // both remaining vertices on one side: a point
            }
            let crossing = edge_crossing(u, v, z);
            Some(Segment::new(verts[on_idx].xy(), crossing))
        }
        _ => {
            // two crossing edges or nothing
            let mut crossings = Vec::with_capacity(2);
            for i in 0..3 {
                let a = verts[i];
                let b = verts[(i + 1) % 3];
                let sa = sides[i];
                let sb = sides[(i + 1) % 3];
                if (sa == Side::Above && sb == Side::Below)
                    || (sa == Side::Below && sb == Side::Above)
                {
                    crossings.push(edge_crossing(a, b, z));
                }
            }
            if crossings.len() == 2 {
                Some(Segment::new(crossings[0], crossings[1]))
            } else {
                None
            }
        }
    }
}

/// Interpolated crossing of edge a-b with the plane at `z`.
fn edge_crossing(a: crate::geometry::Point3, b: crate::geometry::Point3, z: Scalar) -> Point2 {
    let t = (z - a.z) / (b.z - a.z);
    lerp2(a.xy(), b.xy(), t)
}

/// Orient loops so that outer boundaries run counter-clockwise and holes
/// clockwise. A loop contained in an odd number of siblings is a hole.
fn orient_by_nesting(loops: &mut LoopList) {
    let depths: Vec<usize> = (0..loops.len())
        .map(|i| {
            let probe = loops[i][0];
            loops
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && other.contains(probe))
                .count()
        })
        .collect();

    for (lp, depth) in loops.iter_mut().zip(depths) {
        let is_hole = depth % 2 == 1;
        if is_hole == lp.counter_clockwise() {
            lp.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;
    use crate::mesh::Mesh;

    #[test]
    fn test_cut_straddling_triangle() {
        let t = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 2.0),
        );
        let seg = cut_triangle(&t, 1.0).expect("cut expected");
        // crossings at x=0 and x=1
        let xs = [seg.a.x.min(seg.b.x), seg.a.x.max(seg.b.x)];
        assert!((xs[0] - 0.0).abs() < 1e-12);
        assert!((xs[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cut_on_edge() {
        let t = Triangle::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 2.0),
        );
        let seg = cut_triangle(&t, 1.0).expect("edge on plane");
        assert!((seg.length() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_cut_single_vertex_dropped() {
        let t = Triangle::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 2.0),
            Point3::new(0.0, 1.0, 3.0),
        );
        assert!(cut_triangle(&t, 1.0).is_none());
    }

    #[test]
    fn test_cut_horizontal_dropped() {
        let t = Triangle::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        );
        assert!(cut_triangle(&t, 1.0).is_none());
    }

    #[test]
    fn test_cut_vertex_through_opposite_edge() {
        let t = Triangle::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 2.0),
        );
        let seg = cut_triangle(&t, 1.0).expect("vertex-edge cut");
        assert!(seg.a.same_as(&Point2::new(0.0, 0.0), 1e-9) || seg.b.same_as(&Point2::new(0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_slice_cube_yields_square() {
        let mesh = Mesh::cube(Point3::zero(), 1.0);
        let slicer = Slicer::new();
        let layer = slicer.slice(mesh.triangles(), 0.5, 0);
        assert_eq!(layer.orphan_count, 0);
        assert_eq!(layer.outlines.len(), 1);
        let outline = &layer.outlines[0];
        assert!((outline.area() - 1.0).abs() < 1e-9);
        assert!((outline.perimeter() - 4.0).abs() < 1e-9);
        assert!(outline.counter_clockwise());
    }

    #[test]
    fn test_slice_two_disjoint_cubes() {
        let mut mesh = Mesh::cube(Point3::zero(), 1.0);
        for t in Mesh::cube(Point3::new(5.0, 0.0, 0.0), 1.0).triangles() {
            mesh.push(*t);
        }
        let layer = Slicer::new().slice(mesh.triangles(), 0.5, 0);
        assert_eq!(layer.outlines.len(), 2);
        assert_eq!(layer.orphan_count, 0);
    }

    #[test]
    fn test_non_manifold_counts_orphans() {
        let mut triangles: Vec<Triangle> = Mesh::cube(Point3::zero(), 1.0)
            .triangles()
            .to_vec();
        // punch a hole in one wall: the wall's segments can no longer close
        let removed = triangles
            .iter()
            .position(|t| t.v0.y == 0.0 && t.v1.y == 0.0 && t.v2.y == 0.0)
            .expect("front wall triangle");
        triangles.remove(removed);
        let layer = Slicer::new().slice(&triangles, 0.5, 0);
        assert!(layer.orphan_count > 0);
    }

    #[test]
    fn test_orient_by_nesting_flips_hole() {
        // outer square CCW, inner square also CCW: inner must flip to CW
        let outer = Loop::from_points(vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ]);
        let inner = Loop::from_points(vec![
            Point2::new(1.0, 1.0),
            Point2::new(3.0, 1.0),
            Point2::new(3.0, 3.0),
            Point2::new(1.0, 3.0),
        ]);
        let mut loops = vec![outer, inner];
        orient_by_nesting(&mut loops);
        assert!(loops[0].counter_clockwise());
        assert!(loops[1].clockwise());
    }

    #[test]
    fn test_stitch_determinism() {
        let mesh = Mesh::cube(Point3::zero(), 1.0);
        let slicer = Slicer::new();
        let a = slicer.slice(mesh.triangles(), 0.5, 0);
        let b = slicer.slice(mesh.triangles(), 0.5, 0);
        assert_eq!(a.outlines, b.outlines);
    }
}
