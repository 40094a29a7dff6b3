//! Graph-based path ordering.
//!
//! Endpoint graph over the same buckets the greedy strategy uses: nodes
//! are path endpoints, edges are feasible travels weighted by Euclidean
//! length (boundary crossings penalized as retracts) plus a direction
//! change penalty `direction_weight * (1 - cos theta)`. The tour starts
//! from the greedy construction and improves with 2-opt reversals under a
//! fixed evaluation budget, so its cost never exceeds the greedy cost.
//!
//! Paths own their points; the tour works on indices only and the graph
//! is discarded after each layer.

use super::optimizer::{
    bucket_paths, entry_cost, orient_for_entry, travel_cost, OptimizerState, PathOptimizer,
};
use super::LabeledOpenPath;
use crate::geometry::{Loop, LoopList, Point2};
use crate::{Error, Result, Scalar};

/// Cap on 2-opt swap evaluations per bucket.
const TWO_OPT_BUDGET: usize = 4096;

/// Graph strategy with 2-opt local search.
pub struct GraphPathOptimizer {
    state: OptimizerState,
    boundaries: LoopList,
    paths: Vec<LabeledOpenPath>,
    direction_weight: Scalar,
    outer_shell_first: bool,
}

impl GraphPathOptimizer {
    pub fn new(direction_weight: Scalar, outer_shell_first: bool) -> Self {
        Self {
            state: OptimizerState::Empty,
            boundaries: LoopList::new(),
            paths: Vec::new(),
            direction_weight,
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

    /// Travel cost from the end of `prev` to the start of `next`,
    /// including the direction change penalty at the junction.
    fn edge_cost(&self, prev: &LabeledOpenPath, next: &LabeledOpenPath) -> Scalar {
        let from = prev.path.last_point();
        let to = next.path.first_point();
        let mut cost = travel_cost(from, to, &self.boundaries);
        if self.direction_weight > 0.0 {
            if let (Some(out_dir), Some(in_dir)) = (leaving_direction(prev), entering_direction(next))
            {
                let cos_theta = (out_dir.x * in_dir.x + out_dir.y * in_dir.y).clamp(-1.0, 1.0);
                cost += self.direction_weight * (1.0 - cos_theta);
            }
        }
        cost
    }

    fn tour_cost(&self, start: Point2, tour: &[LabeledOpenPath]) -> Scalar {
        let mut cost = match tour.first() {
            Some(first) => travel_cost(start, first.path.first_point(), &self.boundaries),
            None => return 0.0,
        };
        for pair in tour.windows(2) {
            cost += self.edge_cost(&pair[0], &pair[1]);
        }
        cost
    }

    /// Improve one bucket's tour in place with bounded 2-opt.
    fn two_opt(&self, start: Point2, tour: &mut Vec<LabeledOpenPath>, budget: &mut usize) {
        if tour.len() < 3 {
            return;
        }
        let mut best = self.tour_cost(start, tour);
        let mut improved = true;
        while improved && *budget > 0 {
            improved = false;
            for i in 0..tour.len() - 1 {
                for j in (i + 1)..tour.len() {
                    if *budget == 0 {
                        return;
                    }
                    *budget -= 1;
                    let mut candidate = tour.clone();
                    reverse_span(&mut candidate, i, j);
                    let cost = self.tour_cost(start, &candidate);
                    if cost + crate::EPSILON < best {
                        *tour = candidate;
                        best = cost;
                        improved = true;
                    }
                }
            }
        }
    }
}

/// Reverse the visit order of tour[i..=j], flipping open paths so the
/// head still enters each at the correct end. Closed paths keep their
/// seam.
fn reverse_span(tour: &mut [LabeledOpenPath], i: usize, j: usize) {
    tour[i..=j].reverse();
    for p in &mut tour[i..=j] {
        if !p.path.is_closed() {
            p.path.reverse();
        }
    }
}

fn leaving_direction(path: &LabeledOpenPath) -> Option<Point2> {
    let pts = path.path.points();
    if pts.len() < 2 {
        return None;
    }
    (pts[pts.len() - 1] - pts[pts.len() - 2]).normalized()
}

fn entering_direction(path: &LabeledOpenPath) -> Option<Point2> {
    let pts = path.path.points();
    if pts.len() < 2 {
        return None;
    }
    (pts[1] - pts[0]).normalized()
}

impl PathOptimizer for GraphPathOptimizer {
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
        let mut budget = TWO_OPT_BUDGET;

        for bucket in buckets {
            // greedy construction
            let mut tour = Vec::with_capacity(bucket.len());
            let mut remaining = bucket;
            let mut walk = cursor;
            while !remaining.is_empty() {
                let mut best_idx = 0;
                let mut best_rev = false;
                let mut best_cost = Scalar::INFINITY;
                for (i, candidate) in remaining.iter().enumerate() {
                    let (cost, reversed) = entry_cost(walk, candidate, &self.boundaries);
                    if cost < best_cost {
                        best_cost = cost;
                        best_idx = i;
                        best_rev = reversed;
                    }
                }
                let mut chosen = remaining.remove(best_idx);
                orient_for_entry(&mut chosen, walk, best_rev);
                walk = chosen.path.last_point();
                tour.push(chosen);
            }

            // local search
            self.two_opt(cursor, &mut tour, &mut budget);

            if let Some(last) = tour.last() {
                cursor = last.path.last_point();
            }
            ordered.extend(tour);
        }

        self.state = OptimizerState::Optimized;
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::OpenPath;
    use crate::pather::optimizer::NearestPathOptimizer;
    use crate::pather::{PathLabel, PathOwner};

    fn infill(pts: &[(Scalar, Scalar)]) -> LabeledOpenPath {
        LabeledOpenPath {
            label: PathLabel::infill(PathOwner::Model),
            path: OpenPath::from_points(pts.iter().map(|&(x, y)| Point2::new(x, y)).collect()),
        }
    }

    fn raster(n: usize) -> Vec<LabeledOpenPath> {
        // n horizontal rasters listed in an unhelpful order
        let mut paths = Vec::new();
        for i in 0..n {
            let y = ((i * 7) % n) as Scalar;
            paths.push(infill(&[(0.0, y), (10.0, y)]));
        }
        paths
    }

    fn travel_total(start: Point2, tour: &[LabeledOpenPath], boundaries: &[Loop]) -> Scalar {
        let mut total = 0.0;
        let mut cursor = start;
        for p in tour {
            total += travel_cost(cursor, p.path.first_point(), boundaries);
            cursor = p.path.last_point();
        }
        total
    }

    #[test]
    fn test_graph_not_worse_than_greedy() {
        let paths = raster(12);

        let mut greedy = NearestPathOptimizer::new(false);
        greedy.add_paths(paths.clone()).unwrap();
        let greedy_tour = greedy.optimize(Point2::zero()).unwrap();

        let mut graph = GraphPathOptimizer::new(0.0, false);
        graph.add_paths(paths).unwrap();
        let graph_tour = graph.optimize(Point2::zero()).unwrap();

        let greedy_travel = travel_total(Point2::zero(), &greedy_tour, &[]);
        let graph_travel = travel_total(Point2::zero(), &graph_tour, &[]);
        assert!(
            graph_travel <= greedy_travel + 1e-9,
            "graph {} > greedy {}",
            graph_travel,
            greedy_travel
        );
    }

    #[test]
    fn test_graph_visits_every_path_once() {
        let paths = raster(9);
        let mut graph = GraphPathOptimizer::new(0.1, false);
        graph.add_paths(paths).unwrap();
        let tour = graph.optimize(Point2::zero()).unwrap();
        assert_eq!(tour.len(), 9);
        let mut ys: Vec<i64> = tour
            .iter()
            .map(|p| p.path.first_point().y.round() as i64)
            .collect();
        ys.sort_unstable();
        assert_eq!(ys, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_graph_state_machine() {
        let mut graph = GraphPathOptimizer::new(0.0, false);
        graph.add_paths(vec![infill(&[(0.0, 0.0), (1.0, 0.0)])]).unwrap();
        graph.optimize(Point2::zero()).unwrap();
        assert!(matches!(
            graph.add_boundaries(&[]),
            Err(Error::InvalidState { .. })
        ));
    }

    #[test]
    fn test_direction_weight_aligns_junctions() {
        // greedy enters the middle raster at its near end, which forces a
        // reversal at both junctions; 2-opt with direction weighting flips
        // it so every junction continues forward
        let first = infill(&[(0.0, 0.0), (10.0, 0.0)]);
        let back_raster = infill(&[(10.0, 2.0), (0.0, 2.0)]);
        let onward = infill(&[(12.0, 0.0), (22.0, 0.0)]);

        let mut graph = GraphPathOptimizer::new(50.0, false);
        graph
            .add_paths(vec![first, back_raster, onward])
            .unwrap();
        let tour = graph.optimize(Point2::zero()).unwrap();
        assert_eq!(tour[1].path.first_point(), Point2::new(0.0, 2.0));
        for pair in tour.windows(2) {
            let out_dir = leaving_direction(&pair[0]).unwrap();
            let in_dir = entering_direction(&pair[1]).unwrap();
            assert!(out_dir.x * in_dir.x + out_dir.y * in_dir.y > 0.0);
        }
    }
}
