//! # Toolpath
//!
//! A fused-filament toolpath generator: triangle meshes in, G-code out.
//!
//! This library provides the complete mesh-to-machine pipeline:
//! - Triangle mesh loading (binary and ASCII STL)
//! - Z-bucketing of triangles into slice candidates
//! - Plane/triangle intersection and outline loop stitching
//! - Inset shell generation, rectilinear infill, support regions
//! - Travel-minimizing path ordering with join and smoothing passes
//! - Stateful G-code emission with extrusion volume tracking
//!
//! ## Example
//!
//! ```rust,ignore
//! use toolpath::{config::JobConfig, mesh::Mesh, pipeline::SliceJob};
//!
//! let mesh = Mesh::from_stl("model.stl")?;
//! let config = JobConfig::default();
//! let mut out = std::fs::File::create("output.gcode")?;
//! SliceJob::new(config).run(&mesh, &mut out)?;
//! ```

pub mod clipper;
pub mod config;
pub mod gcode;
pub mod geometry;
pub mod layer;
pub mod mesh;
pub mod pather;
pub mod pipeline;
pub mod regioner;
pub mod segmenter;
pub mod slicer;

pub use config::{ExtruderConfig, ExtrusionProfile, JobConfig};
pub use gcode::{Extrusion, GCoder, Gantry};
pub use geometry::{Limits, Loop, LoopList, OpenPath, OpenPathList, Point2, Point3, Segment};
pub use layer::{LayerMeasure, SliceTable};
pub use mesh::{Mesh, Triangle};
pub use pather::{LabeledOpenPath, LayerPaths, PathLabel, PathOwner, PathType, Pather};
pub use pipeline::SliceJob;
pub use regioner::{Region, Regioner};
pub use segmenter::Segmenter;
pub use slicer::Slicer;

/// Scalar type used throughout the pipeline. All geometry is in millimeters.
pub type Scalar = f64;

/// Geometric tolerance for coincidence tests (mm).
///
/// Two points closer than this are the same point; a vertex within this
/// distance of a slice plane lies on it.
pub const EPSILON: Scalar = 1e-6;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("unclosable loop: {orphans} orphan segments in slice {slice}")]
    UnclosableLoop { slice: usize, orphans: usize },

    #[error("missing extrusion profile: {0}")]
    MissingProfile(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid optimizer state: expected {expected}, was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
