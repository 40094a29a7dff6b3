//! Inward loop offsetting for shell generation.
//!
//! Each outline vertex is displaced along the interior of the corner by
//! intersecting the two adjacent offset edges (a miter, capped for near
//! reversals). The raw offset ring is then reknit: self-intersections are
//! split recursively into sub-loops, and sub-loops whose winding flipped
//! (collapsed features) are dropped. Surviving loops below the minimum
//! area are too thin to hold a filament bead and are re-emitted as their
//! centerline spur.

use crate::geometry::{
    cross2, lerp2, segment_intersection, Loop, LoopList, OpenPath, OpenPathList, Point2,
};
use crate::{Scalar, EPSILON};

/// Cosine bound past which a corner counts as a reversal and gets a flat
/// cap instead of a divergent miter.
const FLAT_CAP_COS: Scalar = -0.98;

/// Miter length bound as a multiple of the offset distance; longer miters
/// turn into bevels.
const MITER_LIMIT: Scalar = 4.0;

/// Result of offsetting a set of outline loops inward.
#[derive(Clone, Debug, Default)]
pub struct InsetOutcome {
    /// Loops wide enough to print.
    pub loops: LoopList,
    /// Centerlines of regions that collapsed below the area threshold.
    pub spurs: OpenPathList,
}

/// Offset every loop of `outlines` toward the material interior by
/// `distance`, splitting self-intersections and separating spurs.
///
/// Outlines must be oriented material-left: outer boundaries counter-
/// clockwise, holes clockwise. `min_area` is the smallest loop worth
/// keeping as a printable region.
pub fn inset_loops(outlines: &[Loop], distance: Scalar, min_area: Scalar) -> InsetOutcome {
    let mut outcome = InsetOutcome::default();
    for outline in outlines {
        offset_single(outline, distance, min_area, &mut outcome);
    }
    outcome
}

fn offset_single(outline: &Loop, distance: Scalar, min_area: Scalar, out: &mut InsetOutcome) {
    let points = dedup(outline.points());
    if points.len() < 3 {
        return;
    }

    let raw = match raw_offset(&points, distance) {
        Some(raw) => raw,
        None => return,
    };

    // reknit: split at self-intersections, keep matching-winding sub-loops
    let winding = signed_area(&points).signum();
    let mut pieces = Vec::new();
    reknit(&raw, winding, &mut pieces);

    for piece in pieces {
        let lp = Loop::from_points(piece);
        if lp.area() < min_area {
            if let Some(spur) = centerline(&lp) {
                out.spurs.push(spur);
            }
        } else {
            out.loops.push(lp);
        }
    }
}

/// Drop consecutive near-duplicate vertices, wrap-around included.
fn dedup(points: &[Point2]) -> Vec<Point2> {
    let mut result: Vec<Point2> = Vec::with_capacity(points.len());
    for &p in points {
        if result.last().map(|q| p.same_as(q, EPSILON)).unwrap_or(false) {
            continue;
        }
        result.push(p);
    }
    if result.len() > 1 && result[0].same_as(&result[result.len() - 1], EPSILON) {
        result.pop();
    }
    result
}

/// Displace every edge along its material-side normal and join consecutive
/// offset edges at miters, bevels or flat caps.
fn raw_offset(points: &[Point2], distance: Scalar) -> Option<Vec<Point2>> {
    let n = points.len();
    let mut dirs = Vec::with_capacity(n);
    let mut shifted: Vec<(Point2, Point2)> = Vec::with_capacity(n);
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let dir = (b - a).normalized()?;
        let normal = dir.perp(); // material side for our winding convention
        let d = normal * distance;
        shifted.push((a + d, b + d));
        dirs.push(dir);
    }

    let mut raw = Vec::with_capacity(n * 2);
    for i in 0..n {
        let prev = if i == 0 { n - 1 } else { i - 1 };
        push_corner(&mut raw, shifted[prev], shifted[i], dirs[prev], dirs[i], distance);
    }
    if raw.len() < 3 {
        None
    } else {
        Some(raw)
    }
}

fn push_corner(
    raw: &mut Vec<Point2>,
    prev: (Point2, Point2),
    next: (Point2, Point2),
    dir_prev: Point2,
    dir_next: Point2,
    distance: Scalar,
) {
    let cos_angle = dir_prev.x * dir_next.x + dir_prev.y * dir_next.y;
    if cos_angle < FLAT_CAP_COS {
        raw.push(prev.1);
        raw.push(next.0);
        return;
    }

    let corner = match line_intersection(prev.1, dir_prev, next.0, dir_next) {
        Some(p) => p,
        None => {
            // collinear continuation
            raw.push(next.0);
            return;
        }
    };

    // original corner sits where the two source edges met
    let source_corner = next.0 - dir_next.perp() * distance;
    let limit = MITER_LIMIT * distance.abs();
    if corner.distance_squared(&source_corner) > limit * limit {
        raw.push(prev.1);
        raw.push(next.0);
    } else {
        raw.push(corner);
    }
}

fn line_intersection(p1: Point2, d1: Point2, p2: Point2, d2: Point2) -> Option<Point2> {
    let denom = cross2(d1, d2);
    if denom.abs() < EPSILON {
        return None;
    }
    let d = p2 - p1;
    let t = cross2(d, d2) / denom;
    Some(p1 + d1 * t)
}

fn signed_area(points: &[Point2]) -> Scalar {
    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        sum += cross2(points[i], points[(i + 1) % n]);
    }
    sum * 0.5
}

/// Recursively split a ring at its first self-intersection, keeping every
/// sub-loop whose winding matches the source outline. Opposite-winding
/// pieces are the collapsed (negative-length) features and are dropped.
fn reknit(points: &[Point2], winding: Scalar, out: &mut Vec<Vec<Point2>>) {
    let pts = dedup(points);
    if pts.len() < 3 {
        return;
    }
    match first_self_intersection(&pts) {
        None => {
            if signed_area(&pts) * winding > 0.0 {
                out.push(pts);
            }
        }
        Some((i, j, p)) => {
            let (a, b) = split_ring(&pts, i, j, p);
            reknit(&a, winding, out);
            reknit(&b, winding, out);
        }
    }
}

fn first_self_intersection(points: &[Point2]) -> Option<(usize, usize, Point2)> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    let eps = EPSILON * 100.0;
    for i in 0..n {
        let i_next = (i + 1) % n;
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue; // adjacent across the wrap
            }
            let j_next = (j + 1) % n;
            if let Some((p, t, u)) = segment_intersection(
                points[i],
                points[i_next],
                points[j],
                points[j_next],
            ) {
                let t_end = t < eps || t > 1.0 - eps;
                let u_end = u < eps || u > 1.0 - eps;
                if t_end && u_end {
                    continue; // shared vertex, not a crossing
                }
                return Some((i, j, p));
            }
        }
    }
    None
}

fn split_ring(
    points: &[Point2],
    seg_i: usize,
    seg_j: usize,
    crossing: Point2,
) -> (Vec<Point2>, Vec<Point2>) {
    let n = points.len();
    let mut a = Vec::with_capacity(seg_j - seg_i + 1);
    a.push(crossing);
    a.extend_from_slice(&points[(seg_i + 1)..=seg_j]);

    let mut b = Vec::with_capacity(n - (seg_j - seg_i) + 1);
    b.push(crossing);
    let mut idx = (seg_j + 1) % n;
    loop {
        b.push(points[idx]);
        if idx == seg_i {
            break;
        }
        idx = (idx + 1) % n;
    }
    (a, b)
}

/// Centerline of a thin loop: the two farthest vertices split the ring
/// into two sides, which are resampled at matching arc-length fractions
/// and averaged.
fn centerline(lp: &Loop) -> Option<OpenPath> {
    let pts = lp.points();
    let n = pts.len();
    if n < 3 {
        return None;
    }

    let (mut vi, mut vj, mut best) = (0, 0, -1.0);
    for i in 0..n {
        for j in (i + 1)..n {
            let d = pts[i].distance_squared(&pts[j]);
            if d > best {
                best = d;
                vi = i;
                vj = j;
            }
        }
    }
    if best < EPSILON * EPSILON {
        return None;
    }

    let side_a: Vec<Point2> = (vi..=vj).map(|k| pts[k]).collect();
    let mut side_b: Vec<Point2> = (vj..vj + n - (vj - vi) + 1).map(|k| pts[k % n]).collect();
    side_b.reverse(); // both sides now run vi -> vj

    let samples = side_a.len().max(side_b.len());
    let mut mid = Vec::with_capacity(samples);
    for s in 0..samples {
        let t = s as Scalar / (samples - 1).max(1) as Scalar;
        mid.push(lerp2(sample_at(&side_a, t), sample_at(&side_b, t), 0.5));
    }
    Some(OpenPath::from_points(mid))
}

/// Point at arc-length fraction `t` along a polyline.
fn sample_at(points: &[Point2], t: Scalar) -> Point2 {
    let total: Scalar = points.windows(2).map(|w| w[0].distance(&w[1])).sum();
    if total < EPSILON {
        return points[0];
    }
    let mut target = t.clamp(0.0, 1.0) * total;
    for w in points.windows(2) {
        let len = w[0].distance(&w[1]);
        if target <= len {
            return lerp2(w[0], w[1], if len < EPSILON { 0.0 } else { target / len });
        }
        target -= len;
    }
    points[points.len() - 1]
}
