//! Layer bookkeeping shared by every pipeline stage.
//!
//! [`LayerMeasure`] is the tape measure from slice index to physical Z,
//! thickness and extrusion width. [`SliceTable`] buckets triangle indices
//! by the slices they may intersect.

use crate::{Scalar, EPSILON};
use serde::{Deserialize, Serialize};

/// Maps slice indices to physical layer geometry.
///
/// Layer heights are fixed for the whole job: Z(i+1) = Z(i) + layer_h.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LayerMeasure {
    first_layer_z: Scalar,
    layer_h: Scalar,
    layer_w: Scalar,
}

impl LayerMeasure {
    pub fn new(first_layer_z: Scalar, layer_h: Scalar, layer_w: Scalar) -> Self {
        Self {
            first_layer_z,
            layer_h,
            layer_w,
        }
    }

    /// Nominal Z of slice `index`.
    #[inline]
    pub fn layer_position(&self, index: usize) -> Scalar {
        self.first_layer_z + self.layer_h * index as Scalar
    }

    /// Layer thickness at slice `index`. Constant per job.
    #[inline]
    pub fn layer_thickness(&self, _index: usize) -> Scalar {
        self.layer_h
    }

    /// Extrusion width at slice `index`. Constant per job.
    #[inline]
    pub fn layer_width(&self, _index: usize) -> Scalar {
        self.layer_w
    }

    /// Index of the first layer whose position is at or above `z`.
    ///
    /// Heights below the first layer clamp to index 0. A small tolerance
    /// keeps vertices sitting exactly on a slice plane from rounding up.
    pub fn z_to_layer_above(&self, z: Scalar) -> usize {
        if z <= self.first_layer_z {
            return 0;
        }
        ((z - self.first_layer_z - EPSILON) / self.layer_h).ceil() as usize
    }
}

/// For each slice, the indices of triangles whose Z-range may intersect it.
///
/// A triangle may appear in several entries; entries are append-only while
/// the segmenter runs.
#[derive(Clone, Debug, Default)]
pub struct SliceTable {
    entries: Vec<Vec<usize>>,
}

impl SliceTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Grow to hold at least `len` slices.
    pub fn resize(&mut self, len: usize) {
        if len > self.entries.len() {
            self.entries.resize_with(len, Vec::new);
        }
    }

    /// Append a triangle index to slice `slice`.
    pub fn push(&mut self, slice: usize, triangle: usize) {
        self.entries[slice].push(triangle);
    }

    /// The triangle indices bucketed for slice `slice`.
    #[inline]
    pub fn triangles(&self, slice: usize) -> &[usize] {
        &self.entries[slice]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<usize>> {
        self.entries.iter()
    }
}
