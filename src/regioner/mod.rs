//! Regioner - derives printable regions from outline loops.
//!
//! Per layer this stage produces the inset shells, the interior boundary,
//! the rectilinear infill intervals and the support intervals. Shell
//! offsetting goes through the bisector offsetter in [`inset`]; support
//! area math goes through the clipper bindings.

mod grid;
mod inset;
mod support;

pub use grid::{Grid, GridRanges, ScalarRange};
pub use inset::{inset_loops, InsetOutcome};
pub use support::{support_loops_per_layer, SupportConfig};

use crate::geometry::{Limits, LoopList, OpenPathList};
use crate::layer::LayerMeasure;
use crate::Scalar;
use log::debug;

/// Everything the pather needs for one layer.
#[derive(Clone, Debug, Default)]
pub struct Region {
    /// The sliced outline loops.
    pub outlines: LoopList,
    /// Support boundary loops for this layer.
    pub support_loops: LoopList,
    /// Inset loops, one list per shell depth (outermost first).
    pub inset_loops: Vec<LoopList>,
    /// Spur centerlines, one list per shell depth.
    pub spur_paths: Vec<OpenPathList>,
    /// Innermost offset boundary enclosing the infill.
    pub interiors: LoopList,
    /// Infill ray intervals.
    pub infill: GridRanges,
    /// Support ray intervals.
    pub support_infill: GridRanges,
}

/// Regioner settings distilled from the job configuration.
#[derive(Clone, Copy, Debug)]
pub struct RegionerConfig {
    /// Number of inset shells per outline.
    pub n_shells: usize,
    /// Infill fraction in [0, 1]; 0 disables infill.
    pub infill_density: Scalar,
    /// Solid layers at the top of the model.
    pub roof_layer_count: usize,
    /// Solid layers at the bottom of the model.
    pub floor_layer_count: usize,
    /// When false, no shells are generated and infill fills the whole
    /// outline region.
    pub do_insets: bool,
    pub do_infills: bool,
    pub do_support: bool,
}

impl Default for RegionerConfig {
    fn default() -> Self {
        Self {
            n_shells: 2,
            infill_density: 0.2,
            roof_layer_count: 3,
            floor_layer_count: 3,
            do_insets: true,
            do_infills: true,
            do_support: false,
        }
    }
}

/// Per-layer region derivation stage.
#[derive(Debug)]
pub struct Regioner {
    config: RegionerConfig,
    layer_w: Scalar,
    grid: Grid,
    support_grid: Grid,
}

impl Regioner {
    /// Build the regioner and its ray grids over the model footprint.
    pub fn new(config: RegionerConfig, limits: &Limits, measure: &LayerMeasure) -> Self {
        let layer_w = measure.layer_width(0);
        let mut footprint = *limits;
        footprint.tubularize();
        footprint.inflate(layer_w, layer_w, 0.0);
        // support rays are coarser; scaffolding does not need solid fill
        let support_spacing = layer_w * 2.0;
        Self {
            config,
            layer_w,
            grid: Grid::new(&footprint, layer_w),
            support_grid: Grid::new(&footprint, support_spacing),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn support_grid(&self) -> &Grid {
        &self.support_grid
    }

    /// Derive the region for one layer.
    ///
    /// `layer_count` is the total number of layers in the job; it decides
    /// which layers count as roof or floor and print solid.
    pub fn region_layer(
        &self,
        slice_index: usize,
        layer_count: usize,
        outlines: LoopList,
        support_loops: LoopList,
    ) -> Region {
        let w = self.layer_w;
        // too small to hold even a short bead
        let min_area = 0.25 * w * w;

        let mut inset_lists = Vec::new();
        let mut spur_lists = Vec::new();
        let interiors = if self.config.do_insets {
            for shell in 0..self.config.n_shells {
                let distance = (shell as Scalar + 0.5) * w;
                let outcome = inset_loops(&outlines, distance, min_area);
                inset_lists.push(outcome.loops);
                spur_lists.push(outcome.spurs);
            }
            let interior_distance = (self.config.n_shells as Scalar + 0.5) * w;
            inset_loops(&outlines, interior_distance, min_area).loops
        } else {
            // no shells: infill runs to the outline itself
            outlines.clone()
        };

        let infill = if self.config.do_infills && self.config.infill_density > 0.0 {
            let stride = self.infill_stride(slice_index, layer_count);
            self.grid.intersect(&interiors, stride)
        } else {
            GridRanges::default()
        };

        let support_infill = if self.config.do_support && !support_loops.is_empty() {
            self.support_grid.intersect(&support_loops, 1)
        } else {
            GridRanges::default()
        };

        debug!(
            "region {}: {} outlines, {} shells, {} interiors",
            slice_index,
            outlines.len(),
            inset_lists.iter().map(|l| l.len()).sum::<usize>(),
            interiors.len()
        );

        Region {
            outlines,
            support_loops,
            inset_loops: inset_lists,
            spur_paths: spur_lists,
            interiors,
            infill,
            support_infill,
        }
    }

    /// Ray subsampling stride for this layer: roof and floor layers fill
    /// solid, everything else thins by the density.
    fn infill_stride(&self, slice_index: usize, layer_count: usize) -> usize {
        let solid = slice_index < self.config.floor_layer_count
            || slice_index + self.config.roof_layer_count >= layer_count;
        if solid {
            1
        } else {
            (1.0 / self.config.infill_density).round().max(1.0) as usize
        }
    }
}
