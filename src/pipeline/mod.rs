//! Pipeline - runs a mesh through every stage to a G-code stream.
//!
//! ```text
//! Mesh -> Segmenter -> Slicer -> Regioner -> Pather -> GCoder -> text
//! ```
//!
//! Stages share one immutable [`LayerMeasure`]. Recoverable per-layer
//! problems (unclosable loops, empty slices) are logged and the layer
//! proceeds with whatever geometry survived; configuration and IO
//! problems end the job.

use crate::config::JobConfig;
use crate::gcode::GCoder;
use crate::geometry::LoopList;
use crate::mesh::Mesh;
use crate::pather::{LayerPaths, Pather};
use crate::regioner::{support_loops_per_layer, Region, Regioner};
use crate::segmenter::Segmenter;
use crate::slicer::Slicer;
use crate::Result;
use log::{info, warn};
use std::io::Write;

/// One slicing job: configuration plus the pipeline driver.
pub struct SliceJob {
    config: JobConfig,
}

impl SliceJob {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run the full pipeline and write the G-code stream.
    pub fn run<W: Write>(&self, mesh: &Mesh, out: &mut W, title: &str) -> Result<()> {
        let layerpaths = self.generate(mesh)?;
        let mut gcoder = GCoder::new(self.config.clone())?;
        gcoder.write_gcode_file(&layerpaths, out, title)
    }

    /// Run the geometric stages, stopping short of G-code emission.
    pub fn generate(&self, mesh: &Mesh) -> Result<LayerPaths> {
        self.config.validate()?;
        let measure = self.config.layer_measure();

        // bucket triangles by slice
        let mut segmenter = Segmenter::new(measure);
        segmenter.tablaturize(mesh);
        let table = segmenter.slice_table();
        info!("{} candidate slices", table.len());

        // slice every layer; non-manifold layers keep their closed loops
        let slicer = Slicer::new();
        let mut outlines: Vec<LoopList> = Vec::with_capacity(table.len());
        let mut orphan_total = 0usize;
        for slice_index in 0..table.len() {
            let z = measure.layer_position(slice_index);
            let triangles: Vec<crate::mesh::Triangle> = table
                .triangles(slice_index)
                .iter()
                .map(|&i| mesh.triangles()[i])
                .collect();
            let sliced = slicer.slice(&triangles, z, slice_index);
            orphan_total += sliced.orphan_count;
            outlines.push(sliced.outlines);
        }
        if orphan_total > 0 {
            warn!("{} orphan segments across the job", orphan_total);
        }

        // fencepost conservatism can leave empty slices past the model top
        while outlines.last().map(|l| l.is_empty()).unwrap_or(false) {
            outlines.pop();
        }
        let layer_count = outlines.len();
        info!("{} layers after slicing", layer_count);

        // support regions need the whole outline stack
        let support = if self.config.do_support {
            support_loops_per_layer(mesh, &measure, &outlines, &self.config.support_config())
        } else {
            vec![LoopList::new(); layer_count]
        };

        // per-layer regions
        let regioner = Regioner::new(self.config.regioner_config(), mesh.limits(), &measure);
        let regions: Vec<Region> = outlines
            .into_iter()
            .zip(support)
            .enumerate()
            .map(|(i, (outline, support_loops))| {
                regioner.region_layer(i, layer_count, outline, support_loops)
            })
            .collect();

        // order everything
        let mut pather = Pather::new(self.config.pather_config());
        pather.generate_paths(&regions, &measure, regioner.grid(), regioner.support_grid())
    }
}
