//! Path ordering optimizers.
//!
//! Both strategies share one capability set: seed with boundary loops
//! travels should not cross, add labeled paths, then optimize into an
//! emission sequence. The optimizer is the only stateful object in the
//! middle of the pipeline; its state advances linearly and misuse (adding
//! paths after optimizing) is a programmer error surfaced as
//! [`Error::InvalidState`].

use super::{LabeledOpenPath, PathOwner, PathType};
use crate::geometry::{segment_intersection, Loop, LoopList, Point2};
use crate::{Error, Result, Scalar};

/// Travel cost added per boundary edge a straight travel would cross;
/// stands in for the cost of a retract.
pub const CROSSING_PENALTY: Scalar = 30.0;

/// Linear optimizer lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizerState {
    Empty,
    BoundariesSet,
    PathsAdded,
    Optimizing,
    Optimized,
}

impl OptimizerState {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerState::Empty => "EMPTY",
            OptimizerState::BoundariesSet => "BOUNDARIES_SET",
            OptimizerState::PathsAdded => "PATHS_ADDED",
            OptimizerState::Optimizing => "OPTIMIZING",
            OptimizerState::Optimized => "OPTIMIZED",
        }
    }
}

/// Capability set shared by the ordering strategies.
pub trait PathOptimizer {
    /// Seed boundary loops that travels are penalized for crossing.
    fn add_boundaries(&mut self, boundaries: &[Loop]) -> Result<()>;
    /// Add paths that must be visited.
    fn add_paths(&mut self, paths: Vec<LabeledOpenPath>) -> Result<()>;
    fn clear_boundaries(&mut self);
    fn clear_paths(&mut self);
    /// Order all added paths starting from `position`, returning them in
    /// emission order with their final point orientation.
    fn optimize(&mut self, position: Point2) -> Result<Vec<LabeledOpenPath>>;
}

/// Greedy nearest-endpoint strategy.
///
/// Paths are bucketed so that type and owner ordering holds (outlines,
/// then insets inner-to-outer, then infill; support clustered after the
/// model), then each bucket is emitted by repeatedly taking the path
/// whose nearest endpoint is cheapest to reach from the gantry position,
/// boundary crossings penalized.
pub struct NearestPathOptimizer {
    state: OptimizerState,
    boundaries: LoopList,
    paths: Vec<LabeledOpenPath>,
    /// Emit shell 0 (the visible outer wall) before inner shells instead
    /// of after.
    pub outer_shell_first: bool,
}

impl NearestPathOptimizer {
    pub fn new(outer_shell_first: bool) -> Self {
        Self {
            state: OptimizerState::Empty,
            boundaries: LoopList::new(),
            paths: Vec::new(),
            outer_shell_first,
        }
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    fn check_add(&self, expected: &'static str) -> Result<()> {
        match self.state {
            OptimizerState::Optimizing | OptimizerState::Optimized => Err(Error::InvalidState {
                expected,
                actual: self.state.name(),
            }),
            _ => Ok(()),
        }
    }
}

impl PathOptimizer for NearestPathOptimizer {
    fn add_boundaries(&mut self, boundaries: &[Loop]) -> Result<()> {
        self.check_add("EMPTY or BOUNDARIES_SET")?;
        self.boundaries.extend_from_slice(boundaries);
        if self.state == OptimizerState::Empty {
            self.state = OptimizerState::BoundariesSet;
        }
        Ok(())
    }

    fn add_paths(&mut self, paths: Vec<LabeledOpenPath>) -> Result<()> {
        self.check_add("BOUNDARIES_SET or PATHS_ADDED")?;
        self.paths.extend(paths);
        self.state = OptimizerState::PathsAdded;
        Ok(())
    }

    fn clear_boundaries(&mut self) {
        self.boundaries.clear();
        if self.state == OptimizerState::BoundariesSet {
            self.state = OptimizerState::Empty;
        }
    }

    fn clear_paths(&mut self) {
        self.paths.clear();
        self.state = if self.boundaries.is_empty() {
            OptimizerState::Empty
        } else {
            OptimizerState::BoundariesSet
        };
    }

    fn optimize(&mut self, position: Point2) -> Result<Vec<LabeledOpenPath>> {
        self.state = OptimizerState::Optimizing;
        let buckets = bucket_paths(std::mem::take(&mut self.paths), self.outer_shell_first);
        let mut ordered = Vec::new();
        let mut cursor = position;
        for bucket in buckets {
            greedy_order(bucket, &self.boundaries, &mut cursor, &mut ordered);
        }
        self.state = OptimizerState::Optimized;
        Ok(ordered)
    }
}

/// Split paths into ordered buckets enforcing the group constraints:
/// model before support, outlines before insets before infill, shells
/// inner-to-outer (or outer first when configured). Bucket keys are
/// stable so source order breaks remaining ties.
pub fn bucket_paths(
    paths: Vec<LabeledOpenPath>,
    outer_shell_first: bool,
) -> Vec<Vec<LabeledOpenPath>> {
    let mut keyed: Vec<(u64, usize, LabeledOpenPath)> = paths
        .into_iter()
        .enumerate()
        .map(|(i, p)| (bucket_key(&p, outer_shell_first), i, p))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut buckets: Vec<Vec<LabeledOpenPath>> = Vec::new();
    let mut last_key = None;
    for (key, _, path) in keyed {
        if last_key != Some(key) {
            buckets.push(Vec::new());
            last_key = Some(key);
        }
        buckets.last_mut().expect("bucket exists").push(path);
    }
    buckets
}

fn bucket_key(path: &LabeledOpenPath, outer_shell_first: bool) -> u64 {
    let owner_rank: u64 = match path.label.owner {
        PathOwner::Model => 0,
        PathOwner::Support => 1,
    };
    let type_rank: u64 = match path.label.kind {
        PathType::Outline => 0,
        PathType::Inset | PathType::Connection => 1,
        PathType::Infill => 2,
    };
    // shells visit inner-to-outer so the nozzle smooths the outer wall
    // last, unless the job asks for outer first
    let shell = path.label.shell.max(0) as u64;
    let shell_rank = if matches!(path.label.kind, PathType::Inset | PathType::Connection) {
        if outer_shell_first {
            shell
        } else {
            u32::MAX as u64 - shell
        }
    } else {
        0
    };
    (owner_rank << 48) | (type_rank << 40) | shell_rank
}

/// Emit one bucket greedily by nearest endpoint.
fn greedy_order(
    mut remaining: Vec<LabeledOpenPath>,
    boundaries: &[Loop],
    cursor: &mut Point2,
    out: &mut Vec<LabeledOpenPath>,
) {
    while !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_rev = false;
        let mut best_cost = Scalar::INFINITY;
        for (i, candidate) in remaining.iter().enumerate() {
            let (cost, reversed) = entry_cost(*cursor, candidate, boundaries);
            if cost < best_cost {
                best_cost = cost;
                best_idx = i;
                best_rev = reversed;
            }
        }
        let mut chosen = remaining.remove(best_idx);
        orient_for_entry(&mut chosen, *cursor, best_rev);
        *cursor = chosen.path.last_point();
        out.push(chosen);
    }
}

/// Cheapest way to reach a path from `from`: its start, or its end with
/// the path reversed. Closed paths re-seam at their nearest vertex, so
/// entry cost is the distance to that vertex.
pub fn entry_cost(from: Point2, path: &LabeledOpenPath, boundaries: &[Loop]) -> (Scalar, bool) {
    if path.path.is_closed() {
        let seam = nearest_loop_vertex(&path.path, from);
        let cost = travel_cost(from, seam, boundaries);
        return (cost, false);
    }
    let start_cost = travel_cost(from, path.path.first_point(), boundaries);
    let end_cost = travel_cost(from, path.path.last_point(), boundaries);
    if end_cost < start_cost {
        (end_cost, true)
    } else {
        (start_cost, false)
    }
}

/// Rotate a closed path to seam at the vertex nearest `from`, or reverse
/// an open path entered from its far end.
pub fn orient_for_entry(path: &mut LabeledOpenPath, from: Point2, reversed: bool) {
    if path.path.is_closed() {
        let points = path.path.points();
        let mut best = 0;
        let mut best_d = Scalar::INFINITY;
        for (i, p) in points[..points.len() - 1].iter().enumerate() {
            let d = from.distance_squared(p);
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        if best != 0 {
            let cycle = &points[..points.len() - 1];
            let mut rotated = Vec::with_capacity(points.len());
            for k in 0..cycle.len() {
                rotated.push(cycle[(best + k) % cycle.len()]);
            }
            rotated.push(cycle[best]);
            path.path = crate::geometry::OpenPath::from_points(rotated);
        }
    } else if reversed {
        path.path.reverse();
    }
}

fn nearest_loop_vertex(path: &crate::geometry::OpenPath, from: Point2) -> Point2 {
    let points = path.points();
    let mut best = points[0];
    let mut best_d = Scalar::INFINITY;
    for p in &points[..points.len() - 1] {
        let d = from.distance_squared(p);
        if d < best_d {
            best_d = d;
            best = *p;
        }
    }
    best
}

/// Straight-line travel cost with boundary crossings penalized.
pub fn travel_cost(from: Point2, to: Point2, boundaries: &[Loop]) -> Scalar {
    let base = from.distance(&to);
    let crossings = boundary_crossings(from, to, boundaries);
    base + crossings as Scalar * CROSSING_PENALTY
}

/// Count boundary edges strictly crossed by the travel from `a` to `b`.
/// Touches at the travel endpoints do not count; leaving a path endpoint
/// that sits on its own outline is not a crossing.
pub fn boundary_crossings(a: Point2, b: Point2, boundaries: &[Loop]) -> usize {
    let eps = crate::EPSILON * 100.0;
    let mut count = 0;
    for lp in boundaries {
        for (p, q) in lp.edges() {
            if let Some((_, t, _)) = segment_intersection(a, b, p, q) {
                if t > eps && t < 1.0 - eps {
                    count += 1;
                }
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::OpenPath;
    use crate::pather::PathLabel;

    fn open(label: PathLabel, pts: &[(Scalar, Scalar)]) -> LabeledOpenPath {
        LabeledOpenPath {
            label,
            path: OpenPath::from_points(pts.iter().map(|&(x, y)| Point2::new(x, y)).collect()),
        }
    }

    fn infill(pts: &[(Scalar, Scalar)]) -> LabeledOpenPath {
        open(PathLabel::infill(PathOwner::Model), pts)
    }

    #[test]
    fn test_state_machine_rejects_late_adds() {
        let mut opt = NearestPathOptimizer::new(false);
        assert_eq!(opt.state(), OptimizerState::Empty);
        opt.add_boundaries(&[]).unwrap();
        assert_eq!(opt.state(), OptimizerState::BoundariesSet);
        opt.add_paths(vec![infill(&[(0.0, 0.0), (1.0, 0.0)])]).unwrap();
        assert_eq!(opt.state(), OptimizerState::PathsAdded);
        opt.optimize(Point2::zero()).unwrap();
        assert_eq!(opt.state(), OptimizerState::Optimized);
        assert!(matches!(
            opt.add_paths(vec![]),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_clear_paths_resets() {
        let mut opt = NearestPathOptimizer::new(false);
        opt.add_paths(vec![infill(&[(0.0, 0.0), (1.0, 0.0)])]).unwrap();
        opt.optimize(Point2::zero()).unwrap();
        opt.clear_paths();
        assert_eq!(opt.state(), OptimizerState::Empty);
        opt.add_paths(vec![infill(&[(0.0, 0.0), (1.0, 0.0)])]).unwrap();
        assert_eq!(opt.state(), OptimizerState::PathsAdded);
    }

    #[test]
    fn test_greedy_picks_nearest_and_reverses() {
        let mut opt = NearestPathOptimizer::new(false);
        opt.add_paths(vec![
            infill(&[(10.0, 0.0), (20.0, 0.0)]),
            // nearest endpoint to origin is this path's *end*
            infill(&[(5.0, 0.0), (1.0, 0.0)]),
        ])
        .unwrap();
        let ordered = opt.optimize(Point2::zero()).unwrap();
        assert_eq!(ordered[0].path.first_point(), Point2::new(1.0, 0.0));
        assert_eq!(ordered[0].path.last_point(), Point2::new(5.0, 0.0));
        assert_eq!(ordered[1].path.first_point(), Point2::new(10.0, 0.0));
    }

    #[test]
    fn test_type_ordering_outlines_insets_infill() {
        let mut opt = NearestPathOptimizer::new(false);
        opt.add_paths(vec![
            infill(&[(0.0, 0.0), (1.0, 0.0)]),
            open(PathLabel::outline(PathOwner::Model), &[(2.0, 0.0), (3.0, 0.0)]),
            open(PathLabel::inset(PathOwner::Model, 0), &[(4.0, 0.0), (5.0, 0.0)]),
        ])
        .unwrap();
        let ordered = opt.optimize(Point2::zero()).unwrap();
        assert_eq!(ordered[0].label.kind, PathType::Outline);
        assert_eq!(ordered[1].label.kind, PathType::Inset);
        assert_eq!(ordered[2].label.kind, PathType::Infill);
    }

    #[test]
    fn test_outer_shell_emitted_last_by_default() {
        let mut opt = NearestPathOptimizer::new(false);
        opt.add_paths(vec![
            open(PathLabel::inset(PathOwner::Model, 0), &[(0.0, 0.0), (1.0, 0.0)]),
            open(PathLabel::inset(PathOwner::Model, 1), &[(2.0, 0.0), (3.0, 0.0)]),
        ])
        .unwrap();
        let ordered = opt.optimize(Point2::zero()).unwrap();
        assert_eq!(ordered[0].label.shell, 1);
        assert_eq!(ordered[1].label.shell, 0);

        let mut opt = NearestPathOptimizer::new(true);
        opt.add_paths(vec![
            open(PathLabel::inset(PathOwner::Model, 0), &[(0.0, 0.0), (1.0, 0.0)]),
            open(PathLabel::inset(PathOwner::Model, 1), &[(2.0, 0.0), (3.0, 0.0)]),
        ])
        .unwrap();
        let ordered = opt.optimize(Point2::zero()).unwrap();
        assert_eq!(ordered[0].label.shell, 0);
    }

    #[test]
    fn test_support_clusters_after_model() {
        let mut opt = NearestPathOptimizer::new(false);
        opt.add_paths(vec![
            open(PathLabel::infill(PathOwner::Support), &[(0.1, 0.0), (1.0, 0.0)]),
            infill(&[(50.0, 0.0), (51.0, 0.0)]),
            open(PathLabel::infill(PathOwner::Support), &[(0.2, 5.0), (1.0, 5.0)]),
        ])
        .unwrap();
        let ordered = opt.optimize(Point2::zero()).unwrap();
        assert_eq!(ordered[0].label.owner, PathOwner::Model);
        assert_eq!(ordered[1].label.owner, PathOwner::Support);
        assert_eq!(ordered[2].label.owner, PathOwner::Support);
    }

    #[test]
    fn test_boundary_crossing_penalized() {
        let mut opt = NearestPathOptimizer::new(false);
        // wall between the cursor and the slightly-nearer path
        let wall = Loop::from_points(vec![
            Point2::new(2.0, -10.0),
            Point2::new(2.0, 10.0),
            Point2::new(2.1, 10.0),
            Point2::new(2.1, -10.0),
        ]);
        opt.add_boundaries(std::slice::from_ref(&wall)).unwrap();
        opt.add_paths(vec![
            infill(&[(3.0, 0.0), (4.0, 0.0)]),  // behind the wall
            infill(&[(0.0, 4.0), (0.0, 5.0)]),  // farther but clear
        ])
        .unwrap();
        let ordered = opt.optimize(Point2::zero()).unwrap();
        assert_eq!(ordered[0].path.first_point(), Point2::new(0.0, 4.0));
    }

    #[test]
    fn test_closed_path_reseams_near_cursor() {
        let mut opt = NearestPathOptimizer::new(false);
        let square = crate::geometry::Loop::from_points(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ]);
        opt.add_paths(vec![LabeledOpenPath {
            label: PathLabel::outline(PathOwner::Model),
            path: square.to_open_path(0),
        }])
        .unwrap();
        let ordered = opt.optimize(Point2::new(9.0, 9.0)).unwrap();
        assert_eq!(ordered[0].path.first_point(), Point2::new(10.0, 10.0));
        assert!(ordered[0].path.is_closed());
    }
}
