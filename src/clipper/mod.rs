//! Polygon boolean operations via the geo-clipper library.
//!
//! Support-region math needs robust union and difference over arbitrary
//! polygon sets; those go through geo-clipper here rather than through the
//! bisector offsetter used for shells. Everything crossing this boundary
//! is converted between our [`Loop`](crate::geometry::Loop) lists and
//! geo's `MultiPolygon`.

use crate::geometry::{Loop, LoopList, Point2};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::Clipper;

/// Integer scaling factor applied by geo-clipper internally. One unit of
/// quantization error at this factor is a nanometer.
const CLIPPER_FACTOR: f64 = 1e6;

fn ring(points: &[Point2]) -> LineString<f64> {
    let mut coords: Vec<GeoCoord<f64>> =
        points.iter().map(|p| GeoCoord { x: p.x, y: p.y }).collect();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    LineString::new(coords)
}

/// Assemble oriented loops (outers counter-clockwise, holes clockwise)
/// into geo polygons, attaching each hole to its smallest containing
/// outer.
pub fn loops_to_multipolygon(loops: &[Loop]) -> MultiPolygon<f64> {
    let outers: Vec<&Loop> = loops.iter().filter(|l| !l.clockwise()).collect();
    let holes: Vec<&Loop> = loops.iter().filter(|l| l.clockwise()).collect();

    let mut polygons = Vec::with_capacity(outers.len());
    for (oi, outer) in outers.iter().enumerate() {
        let interiors: Vec<LineString<f64>> = holes
            .iter()
            .filter(|h| !h.is_empty() && outer.contains(h[0]))
            .filter(|h| {
                // the smallest containing outer claims the hole
                !outers.iter().enumerate().any(|(oj, o)| {
                    oj != oi && o.contains(h[0]) && o.area() < outer.area()
                })
            })
            .map(|h| ring(h.points()))
            .collect();
        polygons.push(GeoPolygon::new(ring(outer.points()), interiors));
    }
    MultiPolygon::new(polygons)
}

/// Convert a geo multipolygon back into oriented loops.
pub fn multipolygon_to_loops(mp: &MultiPolygon<f64>) -> LoopList {
    let mut loops = LoopList::new();
    for poly in &mp.0 {
        if let Some(outer) = ring_to_loop(poly.exterior(), false) {
            loops.push(outer);
        }
        for hole in poly.interiors() {
            if let Some(h) = ring_to_loop(hole, true) {
                loops.push(h);
            }
        }
    }
    loops
}

fn ring_to_loop(ring: &LineString<f64>, want_clockwise: bool) -> Option<Loop> {
    let mut points: Vec<Point2> = ring.coords().map(|c| Point2::new(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() < 3 {
        return None;
    }
    let mut lp = Loop::from_points(points);
    if lp.clockwise() != want_clockwise {
        lp.reverse();
    }
    Some(lp)
}

/// Union of two loop sets.
pub fn union(a: &[Loop], b: &[Loop]) -> LoopList {
    if a.is_empty() {
        return b.to_vec();
    }
    if b.is_empty() {
        return a.to_vec();
    }
    let result = loops_to_multipolygon(a).union(&loops_to_multipolygon(b), CLIPPER_FACTOR);
    multipolygon_to_loops(&result)
}

/// Parts of `a` not covered by `b`.
pub fn difference(a: &[Loop], b: &[Loop]) -> LoopList {
    if a.is_empty() || b.is_empty() {
        return a.to_vec();
    }
    let result = loops_to_multipolygon(a).difference(&loops_to_multipolygon(b), CLIPPER_FACTOR);
    multipolygon_to_loops(&result)
}

/// Grow (positive delta) or shrink (negative) a loop set.
pub fn offset(loops: &[Loop], delta: f64) -> LoopList {
    if loops.is_empty() {
        return LoopList::new();
    }
    let result = loops_to_multipolygon(loops).offset(
        delta,
        geo_clipper::JoinType::Miter(2.0),
        geo_clipper::EndType::ClosedPolygon,
        CLIPPER_FACTOR,
    );
    multipolygon_to_loops(&result)
}
