//! Job configuration.
//!
//! Everything the pipeline consumes is collected in [`JobConfig`], which
//! loads from JSON. Stage-specific views are derived from it rather than
//! threading the whole struct through every stage.

use crate::layer::LayerMeasure;
use crate::pather::PatherConfig;
use crate::regioner::{RegionerConfig, SupportConfig};
use crate::{Error, Result, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A named feedrate/width bundle selectable per group and per layer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExtrusionProfile {
    /// Feedrate in mm/min before global scaling.
    pub feedrate: Scalar,
    /// Bead cross-section width (mm).
    pub width: Scalar,
}

/// Static description of one extruder.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtruderConfig {
    /// Tool code letter emitted in tool-select comments.
    pub code: char,
    /// Feedstock filament diameter (mm).
    pub feed_diameter: Scalar,
    /// Volumetric drives take loop endpoints verbatim; linear drives get
    /// lead-in/lead-out ramps.
    pub is_volumetric: bool,
    /// Lead-in distance along the first polygon edge (mm).
    pub lead_in: Scalar,
    /// Lead-out distance along the last polygon edge (mm).
    pub lead_out: Scalar,
    /// Filament pulled back by a snort (mm of feedstock).
    pub retract_distance: Scalar,
    /// Feedrate for snort and squirt moves (mm/min).
    pub retract_rate: Scalar,
    /// Profile used for every group on the first layer.
    pub first_layer_extrusion_profile: String,
    pub outlines_extrusion_profile: String,
    pub insets_extrusion_profile: String,
    pub infills_extrusion_profile: String,
}

impl Default for ExtruderConfig {
    fn default() -> Self {
        Self {
            code: 'A',
            feed_diameter: 1.75,
            is_volumetric: false,
            lead_in: 0.0,
            lead_out: 0.0,
            retract_distance: 1.0,
            retract_rate: 1800.0,
            first_layer_extrusion_profile: "firstlayer".to_string(),
            outlines_extrusion_profile: "plain".to_string(),
            insets_extrusion_profile: "plain".to_string(),
            infills_extrusion_profile: "plain".to_string(),
        }
    }
}

impl ExtruderConfig {
    /// Feedstock cross-section; the filament is a cylinder.
    pub fn feed_cross_section_area(&self) -> Scalar {
        let radius = self.feed_diameter / 2.0;
        std::f64::consts::PI * radius * radius
    }
}

/// The full job configuration consumed by the pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    // slice geometry
    /// Z of the first slice plane (mm).
    pub first_layer_z: Scalar,
    /// Layer height (mm).
    pub layer_h: Scalar,
    /// Extrusion width (mm).
    pub layer_w: Scalar,

    // regions
    /// Number of inset shells.
    pub n_shells: usize,
    /// Infill fraction in [0, 1]; 0 disables infill.
    pub infill_density: Scalar,
    /// Solid layers at the top.
    pub roof_layer_count: usize,
    /// Solid layers at the bottom.
    pub floor_layer_count: usize,

    // group toggles
    pub do_outlines: bool,
    pub do_insets: bool,
    pub do_infills: bool,
    pub do_support: bool,
    pub do_raft: bool,

    // raft
    pub raft_layers: usize,
    /// Keep the infill raster direction fixed across the raft body.
    pub raft_aligned: bool,

    // path conditioning
    /// Geometric tolerance for joining and simplification (mm).
    pub coarseness: Scalar,
    /// Weight of direction changes in ordering and smoothing.
    pub direction_weight: Scalar,
    /// Select the graph optimizer over greedy nearest-neighbor.
    pub do_graph_optimization: bool,
    /// Drop near-zero-length paths during the join pass.
    pub drop_short_paths: bool,
    /// Emit the outer shell before inner shells.
    pub outer_shell_first: bool,

    // support
    /// Overhang angle threshold in degrees.
    pub support_angle: Scalar,
    /// Clearance between support and model walls (mm).
    pub support_margin: Scalar,

    // machine
    pub default_extruder: usize,
    pub extruders: Vec<ExtruderConfig>,
    /// Named extrusion profiles referenced by the extruders.
    pub extrusion_profiles: BTreeMap<String, ExtrusionProfile>,
    /// Feedrate for rapid Z moves (mm/min) before global scaling.
    pub rapid_move_feed_rate_z: Scalar,
    /// Global feedrate multiplier.
    pub scaling_factor: Scalar,

    // layer-0 anchor
    pub starting_x: Scalar,
    pub starting_y: Scalar,
    pub do_anchor: bool,

    // fan
    /// Layer at which the cooling fan turns on.
    pub fan_layer: usize,
    pub do_fan_command: bool,

    // stream dressing
    /// File inlined verbatim after the banner.
    pub header: Option<PathBuf>,
    /// File inlined verbatim at the end of the stream.
    pub footer: Option<PathBuf>,
    pub do_print_progress: bool,
    pub do_print_layer_messages: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "plain".to_string(),
            ExtrusionProfile {
                feedrate: 1800.0,
                width: 0.5,
            },
        );
        profiles.insert(
            "firstlayer".to_string(),
            ExtrusionProfile {
                feedrate: 900.0,
                width: 0.5,
            },
        );
        Self {
            first_layer_z: 0.0,
            layer_h: 0.27,
            layer_w: 0.43,
            n_shells: 2,
            infill_density: 0.2,
            roof_layer_count: 3,
            floor_layer_count: 3,
            do_outlines: true,
            do_insets: true,
            do_infills: true,
            do_support: false,
            do_raft: false,
            raft_layers: 0,
            raft_aligned: false,
            coarseness: 0.05,
            direction_weight: 1.0,
            do_graph_optimization: false,
            drop_short_paths: false,
            outer_shell_first: false,
            support_angle: 45.0,
            support_margin: 1.0,
            default_extruder: 0,
            extruders: vec![ExtruderConfig::default()],
            extrusion_profiles: profiles,
            rapid_move_feed_rate_z: 1400.0,
            scaling_factor: 1.0,
            starting_x: -30.0,
            starting_y: -30.0,
            do_anchor: false,
            fan_layer: 1,
            do_fan_command: false,
            header: None,
            footer: None,
            do_print_progress: false,
            do_print_layer_messages: false,
        }
    }
}

impl JobConfig {
    /// Load from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: JobConfig = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.layer_h <= 0.0 {
            return Err(Error::Config(format!(
                "layer height must be positive, got {}",
                self.layer_h
            )));
        }
        if self.layer_w <= 0.0 {
            return Err(Error::Config(format!(
                "layer width must be positive, got {}",
                self.layer_w
            )));
        }
        if !(0.0..=1.0).contains(&self.infill_density) {
            return Err(Error::Config(format!(
                "infill density must be in [0, 1], got {}",
                self.infill_density
            )));
        }
        if self.extruders.is_empty() {
            return Err(Error::Config("no extruders configured".to_string()));
        }
        if self.default_extruder >= self.extruders.len() {
            return Err(Error::Config(format!(
                "default extruder {} out of range ({} configured)",
                self.default_extruder,
                self.extruders.len()
            )));
        }
        if self.scaling_factor <= 0.0 {
            return Err(Error::Config(format!(
                "scaling factor must be positive, got {}",
                self.scaling_factor
            )));
        }
        Ok(())
    }

    pub fn layer_measure(&self) -> LayerMeasure {
        LayerMeasure::new(self.first_layer_z, self.layer_h, self.layer_w)
    }

    pub fn regioner_config(&self) -> RegionerConfig {
        RegionerConfig {
            n_shells: self.n_shells,
            infill_density: self.infill_density,
            roof_layer_count: self.roof_layer_count,
            floor_layer_count: self.floor_layer_count,
            do_insets: self.do_insets,
            do_infills: self.do_infills,
            do_support: self.do_support,
        }
    }

    pub fn pather_config(&self) -> PatherConfig {
        PatherConfig {
            coarseness: self.coarseness,
            direction_weight: self.direction_weight,
            do_graph_optimization: self.do_graph_optimization,
            drop_short_paths: self.drop_short_paths,
            raft_layers: if self.do_raft { self.raft_layers } else { 0 },
            raft_aligned: self.raft_aligned,
            outer_shell_first: self.outer_shell_first,
            default_extruder: self.default_extruder,
        }
    }

    pub fn support_config(&self) -> SupportConfig {
        SupportConfig {
            threshold_cos: self.support_angle.to_radians().cos(),
            margin: self.support_margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(JobConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_layer_height_rejected() {
        let config = JobConfig {
            layer_h: -0.2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_extruder_rejected() {
        let config = JobConfig {
            default_extruder: 3,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_density_out_of_range_rejected() {
        let config = JobConfig {
            infill_density: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = JobConfig {
            n_shells: 4,
            do_graph_optimization: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: JobConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.n_shells, 4);
        assert!(back.do_graph_optimization);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let back: JobConfig = serde_json::from_str(r#"{"layer_h": 0.3}"#).unwrap();
        assert_eq!(back.layer_h, 0.3);
        assert_eq!(back.n_shells, 2);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_raft_layers_gated_by_do_raft() {
        let config = JobConfig {
            raft_layers: 3,
            do_raft: false,
            ..Default::default()
        };
        assert_eq!(config.pather_config().raft_layers, 0);
    }

    #[test]
    fn test_feed_cross_section_area() {
        let extruder = ExtruderConfig {
            feed_diameter: 2.0,
            ..Default::default()
        };
        assert!((extruder.feed_cross_section_area() - std::f64::consts::PI).abs() < 1e-12);
    }
}
