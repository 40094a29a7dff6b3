//! Pather - orders and conditions the per-layer paths for emission.
//!
//! Regions come in as loops and raster intervals; this stage labels them,
//! hands them to an ordering optimizer (greedy or graph, per config),
//! then runs the join pass and the simplifier over the winning sequence.
//! The infill raster direction alternates layer to layer, except inside
//! an aligned raft.

mod graph;
pub mod optimizer;

pub use graph::GraphPathOptimizer;
pub use optimizer::{NearestPathOptimizer, OptimizerState, PathOptimizer};

use crate::geometry::{turn_cos, OpenPath, Point2};
use crate::layer::LayerMeasure;
use crate::regioner::{Grid, Region};
use crate::{Result, Scalar};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// What a path lays down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathType {
    Outline,
    Inset,
    Infill,
    Connection,
}

/// Which body of material a path belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathOwner {
    Model,
    Support,
}

/// Label carried by every emitted path.
///
/// `shell` identifies the inset depth a path belongs to; negative values
/// mark non-shell paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathLabel {
    pub kind: PathType,
    pub owner: PathOwner,
    pub shell: i32,
}

impl PathLabel {
    pub fn new(kind: PathType, owner: PathOwner, shell: i32) -> Self {
        Self { kind, owner, shell }
    }

    pub fn outline(owner: PathOwner) -> Self {
        Self::new(PathType::Outline, owner, -1)
    }

    pub fn inset(owner: PathOwner, shell: i32) -> Self {
        Self::new(PathType::Inset, owner, shell)
    }

    pub fn infill(owner: PathOwner) -> Self {
        Self::new(PathType::Infill, owner, -1)
    }

    /// Two labels may be concatenated into one path only when both are
    /// inset-like; outlines and infill always stay separate.
    pub fn compatible_for_joining(&self, other: &PathLabel) -> bool {
        matches!(self.kind, PathType::Inset | PathType::Connection)
            && matches!(other.kind, PathType::Inset | PathType::Connection)
    }
}

/// A path plus the label the emitter needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledOpenPath {
    pub label: PathLabel,
    pub path: OpenPath,
}

/// One extruder's worth of ordered paths for a layer.
#[derive(Clone, Debug, Default)]
pub struct ExtruderLayer {
    pub extruder_id: usize,
    pub paths: Vec<LabeledOpenPath>,
}

/// One printed layer.
#[derive(Clone, Debug)]
pub struct Layer {
    pub z: Scalar,
    pub thickness: Scalar,
    pub width: Scalar,
    pub extruders: Vec<ExtruderLayer>,
}

/// The pather's output: every layer in emission order.
#[derive(Clone, Debug, Default)]
pub struct LayerPaths {
    pub layers: Vec<Layer>,
}

impl LayerPaths {
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Pather settings distilled from the job configuration.
#[derive(Clone, Copy, Debug)]
pub struct PatherConfig {
    /// Geometric tolerance for joining and simplification (mm).
    pub coarseness: Scalar,
    /// Weight of direction changes in ordering and smoothing.
    pub direction_weight: Scalar,
    /// Select the graph strategy over greedy nearest-neighbor.
    pub do_graph_optimization: bool,
    /// Drop paths shorter than half the coarseness during the join pass.
    pub drop_short_paths: bool,
    /// Number of raft layers at the bottom of the job.
    pub raft_layers: usize,
    /// Keep the raster direction fixed across the raft body.
    pub raft_aligned: bool,
    /// Emit the outer shell before inner shells.
    pub outer_shell_first: bool,
    /// Extruder the whole job prints with.
    pub default_extruder: usize,
}

impl Default for PatherConfig {
    fn default() -> Self {
        Self {
            coarseness: 0.05,
            direction_weight: 1.0,
            do_graph_optimization: false,
            drop_short_paths: false,
            raft_layers: 0,
            raft_aligned: false,
            outer_shell_first: false,
            default_extruder: 0,
        }
    }
}

/// Path generation stage. Holds the raster direction flip and the gantry
/// position estimate across the whole job.
pub struct Pather {
    config: PatherConfig,
    direction: bool,
    position: Point2,
}

impl Pather {
    pub fn new(config: PatherConfig) -> Self {
        Self {
            config,
            direction: false,
            position: Point2::zero(),
        }
    }

    /// Order every region into a [`LayerPaths`].
    pub fn generate_paths(
        &mut self,
        regions: &[Region],
        measure: &LayerMeasure,
        grid: &Grid,
        support_grid: &Grid,
    ) -> Result<LayerPaths> {
        let mut layerpaths = LayerPaths::default();
        for (index, region) in regions.iter().enumerate() {
            // raster direction alternates, but holds steady through the
            // body of an aligned raft
            let raft_hold =
                self.config.raft_aligned && index >= 2 && index < self.config.raft_layers;
            if !raft_hold {
                self.direction = !self.direction;
            }

            // a failed layer yields empty output; the rest of the job
            // still paths
            let paths = match self.order_layer(region, grid, support_grid) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!("layer {}: path ordering failed: {}", index, e);
                    Vec::new()
                }
            };
            layerpaths.layers.push(Layer {
                z: measure.layer_position(index),
                thickness: measure.layer_thickness(index),
                width: measure.layer_width(index),
                extruders: vec![ExtruderLayer {
                    extruder_id: self.config.default_extruder,
                    paths,
                }],
            });
        }
        Ok(layerpaths)
    }

    fn order_layer(
        &mut self,
        region: &Region,
        grid: &Grid,
        support_grid: &Grid,
    ) -> Result<Vec<LabeledOpenPath>> {
        let mut labeled = Vec::new();

        for lp in &region.outlines {
            labeled.push(LabeledOpenPath {
                label: PathLabel::outline(PathOwner::Model),
                path: lp.to_open_path(0),
            });
        }
        for (depth, loops) in region.inset_loops.iter().enumerate() {
            for lp in loops {
                labeled.push(LabeledOpenPath {
                    label: PathLabel::inset(PathOwner::Model, depth as i32),
                    path: lp.to_open_path(0),
                });
            }
        }
        for (depth, spurs) in region.spur_paths.iter().enumerate() {
            for spur in spurs {
                labeled.push(LabeledOpenPath {
                    label: PathLabel::inset(PathOwner::Model, depth as i32),
                    path: spur.clone(),
                });
            }
        }
        for path in grid.paths_from_ranges(&region.infill, self.direction) {
            labeled.push(LabeledOpenPath {
                label: PathLabel::infill(PathOwner::Model),
                path,
            });
        }
        for lp in &region.support_loops {
            labeled.push(LabeledOpenPath {
                label: PathLabel::outline(PathOwner::Support),
                path: lp.to_open_path(0),
            });
        }
        for path in support_grid.paths_from_ranges(&region.support_infill, self.direction) {
            labeled.push(LabeledOpenPath {
                label: PathLabel::infill(PathOwner::Support),
                path,
            });
        }

        let mut ordered = if self.config.do_graph_optimization {
            let mut opt = GraphPathOptimizer::new(
                self.config.direction_weight,
                self.config.outer_shell_first,
            );
            opt.add_boundaries(&region.outlines)?;
            opt.add_paths(labeled)?;
            opt.optimize(self.position)?
        } else {
            let mut opt = NearestPathOptimizer::new(self.config.outer_shell_first);
            opt.add_boundaries(&region.outlines)?;
            opt.add_paths(labeled)?;
            opt.optimize(self.position)?
        };

        clean_paths(&mut ordered, &self.config);
        smooth_collection(&mut ordered, &self.config);

        if let Some(last) = ordered.last() {
            self.position = last.path.last_point();
        }
        debug!("layer ordered into {} paths", ordered.len());
        Ok(ordered)
    }
}

/// Join pass over an ordered sequence.
///
/// Adjacent paths are concatenated when the gap between them is within
/// the coarseness, their labels are compatible, and neither is a closed
/// multi-point loop. An inset label survives the join. Short-path
/// dropping only runs when configured.
pub fn clean_paths(paths: &mut Vec<LabeledOpenPath>, config: &PatherConfig) {
    if config.drop_short_paths {
        paths.retain(|p| p.path.length() >= 0.5 * config.coarseness);
    }

    let mut result: Vec<LabeledOpenPath> = Vec::with_capacity(paths.len());
    for next in paths.drain(..) {
        let joinable = match result.last() {
            Some(current) => {
                current.label.compatible_for_joining(&next.label)
                    && !(current.path.is_closed() && current.path.len() > 2)
                    && !(next.path.is_closed() && next.path.len() > 2)
                    && current
                        .path
                        .last_point()
                        .distance(&next.path.first_point())
                        <= config.coarseness
            }
            None => false,
        };
        if joinable {
            let current = result.last_mut().expect("joinable implies a current path");
            current.path.join(&next.path);
            if next.label.kind == PathType::Inset {
                current.label = next.label;
            }
        } else {
            result.push(next);
        }
    }
    *paths = result;
}

/// Simplifier pass: a vertex between its kept predecessor and its
/// successor is dropped when it deviates less than the coarseness from
/// the straight line and turns less than the direction-weighted angle
/// threshold.
pub fn smooth_collection(paths: &mut [LabeledOpenPath], config: &PatherConfig) {
    for labeled in paths.iter_mut() {
        smooth_path(&mut labeled.path, config.coarseness, config.direction_weight);
    }
}

fn smooth_path(path: &mut OpenPath, tolerance: Scalar, direction_weight: Scalar) {
    if path.len() < 3 {
        return;
    }
    // heavier direction weighting preserves more corners
    let max_turn = 0.5 / (1.0 + direction_weight.max(0.0));
    let min_turn_cos = max_turn.cos();

    let points = path.points();
    let mut kept: Vec<Point2> = vec![points[0]];
    for i in 1..points.len() - 1 {
        let u = kept[kept.len() - 1];
        let v = points[i];
        let w = points[i + 1];
        let deviation = perpendicular_distance(v, u, w);
        let straight = turn_cos(u, v, w) >= min_turn_cos;
        if !(deviation < tolerance && straight) {
            kept.push(v);
        }
    }
    kept.push(points[points.len() - 1]);
    *path = OpenPath::from_points(kept);
}

/// Distance from `p` to the segment a-b.
fn perpendicular_distance(p: Point2, a: Point2, b: Point2) -> Scalar {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 < crate::EPSILON * crate::EPSILON {
        return p.distance(&a);
    }
    let t = (crate::geometry::dot2(p - a, ab) / len2).clamp(0.0, 1.0);
    p.distance(&(a + ab * t))
}
