//! Segmenter - buckets triangles by the slices they may intersect.
//!
//! For every triangle this stage records the contiguous range of slice
//! indices whose planes could cross it. The range is widened with
//! conservative fencepost adjustments so that a vertex sitting exactly on
//! a slice plane still reaches the slicer for that plane.

use crate::layer::{LayerMeasure, SliceTable};
use crate::mesh::Mesh;
use log::debug;

/// Z-bucketing stage. Owns the resulting [`SliceTable`].
#[derive(Debug)]
pub struct Segmenter {
    measure: LayerMeasure,
    table: SliceTable,
}

impl Segmenter {
    pub fn new(measure: LayerMeasure) -> Self {
        Self {
            measure,
            table: SliceTable::new(),
        }
    }

    /// Bucket every triangle of the mesh.
    pub fn tablaturize(&mut self, mesh: &Mesh) {
        debug!("segmenting {} triangles", mesh.len());
        for i in 0..mesh.len() {
            self.bucket_triangle(mesh, i);
        }
        debug!("slice table holds {} slices", self.table.len());
    }

    /// The completed table.
    pub fn slice_table(&self) -> &SliceTable {
        &self.table
    }

    pub fn layer_measure(&self) -> &LayerMeasure {
        &self.measure
    }

    fn bucket_triangle(&mut self, mesh: &Mesh, id: usize) {
        let (a, _, c) = mesh.triangles()[id].z_sort();

        // Fencepost adjustments against float classification at slice
        // boundaries: a triangle whose top vertex lies exactly on a plane
        // must still be seen by that slice. The min side always backs off
        // one slice; the max side only when the range spans more than one.
        let mut min_idx = self.measure.z_to_layer_above(a.z);
        if min_idx > 0 {
            min_idx -= 1;
        }

        let mut max_idx = self.measure.z_to_layer_above(c.z);
        if max_idx - min_idx > 1 {
            max_idx -= 1;
        }

        self.table.resize(max_idx + 1);
        for slice in min_idx..=max_idx {
            self.table.push(slice, id);
        }
    }
}
