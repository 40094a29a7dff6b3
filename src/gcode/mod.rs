//! G-code emission.
//!
//! The [`GCoder`] traverses a [`LayerPaths`] in order and writes the
//! machine stream: a banner and optional header file, per-layer slice
//! comments, fan and progress commands, and for every path group the
//! retract/travel/prime sequence followed by extruding moves whose E
//! deltas conserve bead volume against the feedstock cross-section.
//!
//! Output is plain 7-bit ASCII, three decimals fixed point, comments in
//! parentheses.

mod gantry;

pub use gantry::Gantry;

use crate::config::{ExtruderConfig, ExtrusionProfile, JobConfig};
use crate::geometry::Point2;
use crate::pather::{ExtruderLayer, LabeledOpenPath, Layer, LayerPaths, PathOwner, PathType};
use crate::{Error, Result, Scalar, EPSILON};
use log::{error, info};
use std::io::Write;

/// A resolved extrusion: profile feedrate after global scaling, plus the
/// bead width the profile asks for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extrusion {
    pub feedrate: Scalar,
    pub width: Scalar,
}

impl Extrusion {
    pub fn from_profile(profile: &ExtrusionProfile, scaling_factor: Scalar) -> Self {
        Self {
            feedrate: profile.feedrate * scaling_factor,
            width: profile.width,
        }
    }
}

/// Cross-section of a laid bead: a rectangle of width `w` capped by two
/// semicircles of diameter `h`.
pub fn cross_section_area(h: Scalar, w: Scalar) -> Scalar {
    let radius = h / 2.0;
    std::f64::consts::PI * radius * radius + h * (w - h)
}

/// Emission groups, in per-layer order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathGroup {
    Outlines,
    Insets,
    Infills,
    Support,
}

impl PathGroup {
    fn of(path: &LabeledOpenPath) -> Self {
        if path.label.owner == PathOwner::Support {
            return PathGroup::Support;
        }
        match path.label.kind {
            PathType::Outline => PathGroup::Outlines,
            PathType::Inset | PathType::Connection => PathGroup::Insets,
            PathType::Infill => PathGroup::Infills,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PathGroup::Outlines => "outlines",
            PathGroup::Insets => "insets",
            PathGroup::Infills => "infills",
            PathGroup::Support => "support",
        }
    }
}

/// The stateful G-code emitter. One per job; holds the gantry for its
/// entire life.
pub struct GCoder {
    config: JobConfig,
    gantry: Gantry,
    progress_percent: Option<u64>,
}

impl GCoder {
    pub fn new(config: JobConfig) -> Result<Self> {
        config.validate()?;
        let gantry = Gantry::init_to_start(
            config.extruders.len(),
            config.starting_x,
            config.starting_y,
        );
        Ok(Self {
            config,
            gantry,
            progress_percent: None,
        })
    }

    /// The machine state, observable for tests and diagnostics.
    pub fn gantry(&self) -> &Gantry {
        &self.gantry
    }

    /// Write the whole job.
    pub fn write_gcode_file<W: Write>(
        &mut self,
        layerpaths: &LayerPaths,
        out: &mut W,
        title: &str,
    ) -> Result<()> {
        self.write_start(out, title)?;
        let total = layerpaths.len();
        for (sequence, layer) in layerpaths.layers.iter().enumerate() {
            if self.config.do_anchor && sequence == 0 {
                self.write_anchor(out, layer)?;
            }
            self.write_slice(out, layer, sequence, total)?;
        }
        if self.config.do_fan_command {
            self.gantry
                .set_fan(out, false, self.config.default_extruder)?;
        }
        self.write_end(out)?;
        info!("wrote {} layers of gcode", total);
        Ok(())
    }

    fn write_start<W: Write>(&mut self, out: &mut W, title: &str) -> Result<()> {
        writeln!(out, "(Toolpath {})", crate::VERSION)?;
        writeln!(
            out,
            "(This file contains digital fabrication directives in gcode format)"
        )?;
        writeln!(out, "(source: {})", title)?;
        let count = self.config.extruders.len();
        writeln!(
            out,
            "({} extruder{})",
            count,
            if count == 1 { "" } else { "s" }
        )?;
        writeln!(out, "(Extrude outlines: {})", self.config.do_outlines)?;
        writeln!(out, "(Extrude insets: {})", self.config.do_insets)?;
        writeln!(out, "(Extrude infills: {})", self.config.do_infills)?;
        writeln!(out)?;

        if let Some(path) = self.config.header.clone() {
            let contents = std::fs::read_to_string(&path)?;
            writeln!(out, "(header [{}] begin)", path.display())?;
            out.write_all(contents.as_bytes())?;
            writeln!(out, "(header [{}] end)", path.display())?;
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_end<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if let Some(path) = self.config.footer.clone() {
            let contents = std::fs::read_to_string(&path)?;
            writeln!(out, "(footer [{}] begin)", path.display())?;
            out.write_all(contents.as_bytes())?;
            writeln!(out, "(footer [{}] end)", path.display())?;
        }
        Ok(())
    }

    /// Layer-0 anchor: park, prime, and drag a bead to the first path so
    /// the print starts from a stuck blob.
    fn write_anchor<W: Write>(&mut self, out: &mut W, layer: &Layer) -> Result<()> {
        let first_extruder = match layer.extruders.first() {
            Some(ex) => ex,
            None => return Ok(()),
        };
        let target = first_extruder
            .paths
            .iter()
            .find(|p| !p.path.is_empty())
            .map(|p| p.path.first_point());
        let target = match target {
            Some(t) => t,
            None => return Ok(()),
        };
        self.check_extruder(first_extruder.extruder_id)?;
        let extruder = self.config.extruders[first_extruder.extruder_id].clone();
        let extrusion = self.resolve_extrusion(&extruder, PathGroup::Infills, 0)?;

        self.gantry.set_current_extruder(first_extruder.extruder_id);
        let z = layer.z + layer.thickness;
        let h = layer.thickness;
        let w = layer.width * 2.0;

        self.gantry
            .snort(out, extruder.retract_distance, extruder.retract_rate)?;
        self.gantry.travel(
            out,
            self.config.starting_x,
            self.config.starting_y,
            z,
            extrusion.feedrate,
            "Anchor Start",
        )?;
        self.gantry
            .squirt(out, extruder.retract_distance, extruder.retract_rate)?;
        let (gx, gy, _) = self.gantry.position();
        let delta_e = cross_section_area(h, w) * Point2::new(gx, gy).distance(&target)
            / extruder.feed_cross_section_area();
        self.gantry
            .extrude_to(out, target.x, target.y, delta_e, extrusion.feedrate, "Anchor End")?;
        Ok(())
    }

    fn write_slice<W: Write>(
        &mut self,
        out: &mut W,
        layer: &Layer,
        sequence: usize,
        total: usize,
    ) -> Result<()> {
        let extruder_count = layer.extruders.len();
        writeln!(
            out,
            "(Slice {}, {} Extruder{})",
            sequence,
            extruder_count,
            if extruder_count == 1 { "" } else { "s" }
        )?;
        writeln!(out, "(Layer Height: {:.3})", layer.thickness)?;
        writeln!(out, "(Layer Width: {:.3})", layer.width)?;

        self.write_progress(out, sequence, total)?;
        if self.config.do_print_layer_messages {
            writeln!(out, "M70 P20 (Layer: {})", sequence)?;
        }
        if self.config.do_fan_command && sequence == self.config.fan_layer {
            self.gantry
                .set_fan(out, true, self.config.default_extruder)?;
        }

        for extruder_layer in &layer.extruders {
            self.write_extruder_layer(out, layer, extruder_layer, sequence)?;
        }
        Ok(())
    }

    fn write_extruder_layer<W: Write>(
        &mut self,
        out: &mut W,
        layer: &Layer,
        extruder_layer: &ExtruderLayer,
        sequence: usize,
    ) -> Result<()> {
        self.check_extruder(extruder_layer.extruder_id)?;
        let extruder = self.config.extruders[extruder_layer.extruder_id].clone();
        self.gantry.set_current_extruder(extruder_layer.extruder_id);

        let z = layer.z + layer.thickness;
        let z_feedrate = self.config.rapid_move_feed_rate_z * self.config.scaling_factor;
        self.gantry.move_z(out, z, z_feedrate)?;

        for run in group_runs(&extruder_layer.paths) {
            let group = PathGroup::of(run[0]);
            if !self.group_enabled(group) {
                continue;
            }
            writeln!(out, "({}: {})", group.name(), run.len())?;
            let extrusion = match self.resolve_extrusion(&extruder, group, sequence) {
                Ok(extrusion) => extrusion,
                Err(e) => {
                    // the group is lost, the layer goes on
                    error!(
                        "slice {} extruder {}: {}",
                        sequence, extruder_layer.extruder_id, e
                    );
                    writeln!(out, "(ERROR: {})", e)?;
                    continue;
                }
            };
            for path in run {
                self.write_path(out, layer, &extruder, &extrusion, path)?;
            }
        }
        Ok(())
    }

    /// One labeled path: retract and travel to its start if the gantry is
    /// elsewhere, prime, then extrude along it with volume-conserving E
    /// deltas. Non-volumetric extruders approach through a lead-in and
    /// release through a lead-out along the end edges.
    fn write_path<W: Write>(
        &mut self,
        out: &mut W,
        layer: &Layer,
        extruder: &ExtruderConfig,
        extrusion: &Extrusion,
        labeled: &LabeledOpenPath,
    ) -> Result<()> {
        let points = labeled.path.points();
        if points.len() < 2 {
            return Ok(());
        }

        let (entry, exit) = lead_points(points, extruder);
        let z = layer.z + layer.thickness;
        let bead = cross_section_area(layer.thickness, layer.width);
        let feed_area = extruder.feed_cross_section_area();

        let (gx, gy, _) = self.gantry.position();
        if !Point2::new(gx, gy).same_as(&entry, EPSILON) {
            self.gantry
                .snort(out, extruder.retract_distance, extruder.retract_rate)?;
            self.gantry
                .travel(out, entry.x, entry.y, z, extrusion.feedrate, "travel")?;
            self.gantry
                .squirt(out, extruder.retract_distance, extruder.retract_rate)?;
        }

        let comment = match labeled.label.kind {
            PathType::Outline => "outline",
            PathType::Inset | PathType::Connection => "inset",
            PathType::Infill => "infill",
        };
        let mut previous = entry;
        for target in points.iter().copied().chain(std::iter::once(exit)) {
            let length = previous.distance(&target);
            if length < EPSILON {
                continue;
            }
            let delta_e = bead * length / feed_area;
            self.gantry
                .extrude_to(out, target.x, target.y, delta_e, extrusion.feedrate, comment)?;
            previous = target;
        }
        Ok(())
    }

    fn write_progress<W: Write>(&mut self, out: &mut W, sequence: usize, total: usize) -> Result<()> {
        if !self.config.do_print_progress || total == 0 {
            return Ok(());
        }
        let percent = ((sequence + 1) * 100 / total) as u64;
        if self.progress_percent != Some(percent) {
            writeln!(
                out,
                "M73 P{} (progress ({}%): {}/{})",
                percent,
                percent,
                sequence + 1,
                total
            )?;
            self.progress_percent = Some(percent);
        }
        Ok(())
    }

    fn group_enabled(&self, group: PathGroup) -> bool {
        match group {
            PathGroup::Outlines => self.config.do_outlines,
            PathGroup::Insets => self.config.do_insets,
            PathGroup::Infills => self.config.do_infills,
            PathGroup::Support => self.config.do_support,
        }
    }

    /// Resolve the extrusion profile for a group; every group uses the
    /// first-layer profile on layer 0.
    fn resolve_extrusion(
        &self,
        extruder: &ExtruderConfig,
        group: PathGroup,
        sequence: usize,
    ) -> Result<Extrusion> {
        let name = if sequence == 0 {
            &extruder.first_layer_extrusion_profile
        } else {
            match group {
                PathGroup::Outlines => &extruder.outlines_extrusion_profile,
                PathGroup::Insets => &extruder.insets_extrusion_profile,
                PathGroup::Infills | PathGroup::Support => &extruder.infills_extrusion_profile,
            }
        };
        let profile = self
            .config
            .extrusion_profiles
            .get(name)
            .ok_or_else(|| Error::MissingProfile(name.clone()))?;
        Ok(Extrusion::from_profile(profile, self.config.scaling_factor))
    }

    fn check_extruder(&self, id: usize) -> Result<()> {
        if id >= self.config.extruders.len() {
            return Err(Error::Config(format!(
                "extruder {} out of range ({} configured)",
                id,
                self.config.extruders.len()
            )));
        }
        Ok(())
    }
}

/// Contiguous runs of paths sharing an emission group.
fn group_runs(paths: &[LabeledOpenPath]) -> Vec<Vec<&LabeledOpenPath>> {
    let mut runs: Vec<Vec<&LabeledOpenPath>> = Vec::new();
    for path in paths {
        let group = PathGroup::of(path);
        match runs.last_mut() {
            Some(run) if PathGroup::of(run[0]) == group => run.push(path),
            _ => runs.push(vec![path]),
        }
    }
    runs
}

/// Entry and exit points for a path: loop endpoints verbatim for
/// volumetric drives, otherwise extended along the first and last edges.
fn lead_points(points: &[Point2], extruder: &ExtruderConfig) -> (Point2, Point2) {
    let first = points[0];
    let last = points[points.len() - 1];
    if extruder.is_volumetric {
        return (first, last);
    }
    let entry = match (points[1] - first).normalized() {
        Some(dir) => first - dir * extruder.lead_in,
        None => first,
    };
    let exit = match (last - points[points.len() - 2]).normalized() {
        Some(dir) => last + dir * extruder.lead_out,
        None => last,
    };
    (entry, exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::OpenPath;
    use crate::pather::PathLabel;

    fn square_path() -> LabeledOpenPath {
        LabeledOpenPath {
            label: PathLabel::outline(PathOwner::Model),
            path: OpenPath::from_points(vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
                Point2::new(0.0, 0.0),
            ]),
        }
    }

    fn one_layer(paths: Vec<LabeledOpenPath>) -> LayerPaths {
        LayerPaths {
            layers: vec![Layer {
                z: 0.0,
                thickness: 0.5,
                width: 0.5,
                extruders: vec![ExtruderLayer {
                    extruder_id: 0,
                    paths,
                }],
            }],
        }
    }

    fn generate(config: JobConfig, paths: &LayerPaths) -> (GCoder, String) {
        let mut gcoder = GCoder::new(config).unwrap();
        let mut out = Vec::new();
        gcoder.write_gcode_file(paths, &mut out, "test").unwrap();
        (gcoder, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_cross_section_area() {
        // semicircle caps of a square bead: pi*(h/2)^2 when w == h
        let h = 0.5;
        approx::assert_relative_eq!(cross_section_area(h, h), std::f64::consts::PI * 0.0625);
        // wider bead adds the rectangle
        approx::assert_relative_eq!(
            cross_section_area(0.5, 1.0),
            std::f64::consts::PI * 0.0625 + 0.25
        );
    }

    #[test]
    fn test_square_outline_extrusion_volume() {
        let (gcoder, text) = generate(JobConfig::default(), &one_layer(vec![square_path()]));
        assert!(text.contains("(outlines: 1)"));
        // total E equals bead area * path length / feed area; snort and
        // squirt cancel
        let expected = cross_section_area(0.5, 0.5) * 4.0
            / JobConfig::default().extruders[0].feed_cross_section_area();
        assert!(
            (gcoder.gantry().extruder_e(0) - expected).abs() < 1e-9,
            "E {} expected {}",
            gcoder.gantry().extruder_e(0),
            expected
        );
    }

    #[test]
    fn test_ascii_and_comment_format() {
        let (_, text) = generate(JobConfig::default(), &one_layer(vec![square_path()]));
        assert!(text.is_ascii());
        assert!(text.contains("(Slice 0, 1 Extruder)"));
        assert!(text.contains("(Layer Height: 0.500)"));
        for line in text.lines() {
            if line.starts_with("G1") {
                assert!(line.contains('('), "uncommented move: {}", line);
            }
        }
    }

    #[test]
    fn test_fan_commands_once() {
        let mut layers = one_layer(vec![square_path()]);
        // three layers, fan on at layer 2
        let layer = layers.layers[0].clone();
        for i in 1..4 {
            let mut l = layer.clone();
            l.z = 0.5 * i as Scalar;
            layers.layers.push(l);
        }
        let config = JobConfig {
            do_fan_command: true,
            fan_layer: 2,
            ..Default::default()
        };
        let (_, text) = generate(config, &layers);
        assert_eq!(text.matches("M126").count(), 1);
        assert_eq!(text.matches("M127").count(), 1);
        let on = text.find("M126").unwrap();
        let off = text.find("M127").unwrap();
        assert!(on < off);
        assert!(text[..on].contains("(Slice 2,"));
    }

    #[test]
    fn test_missing_profile_skips_group_and_continues() {
        let mut config = JobConfig::default();
        config.extruders[0].outlines_extrusion_profile = "solid".to_string();
        let mut layers = one_layer(vec![square_path()]);
        // second layer so the non-first-layer profile path is exercised
        let l = layers.layers[0].clone();
        layers.layers.push(Layer { z: 0.5, ..l });

        let (_, text) = generate(config, &layers);
        assert!(text.contains("(ERROR: missing extrusion profile: solid)"));
        // layer 0 still printed with the first-layer profile
        assert!(text.contains("(Slice 1,"));
    }

    #[test]
    fn test_unknown_extruder_is_fatal() {
        let mut layers = one_layer(vec![square_path()]);
        layers.layers[0].extruders[0].extruder_id = 5;
        let mut gcoder = GCoder::new(JobConfig::default()).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            gcoder.write_gcode_file(&layers, &mut out, "test"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_progress_lines() {
        let mut layers = one_layer(vec![square_path()]);
        let layer = layers.layers[0].clone();
        for i in 1..4 {
            let mut l = layer.clone();
            l.z = 0.5 * i as Scalar;
            layers.layers.push(l);
        }
        let config = JobConfig {
            do_print_progress: true,
            ..Default::default()
        };
        let (_, text) = generate(config, &layers);
        assert!(text.contains("M73 P25"));
        assert!(text.contains("M73 P100"));
    }

    #[test]
    fn test_layer_messages() {
        let config = JobConfig {
            do_print_layer_messages: true,
            ..Default::default()
        };
        let (_, text) = generate(config, &one_layer(vec![square_path()]));
        assert!(text.contains("M70 P20 (Layer: 0)"));
    }

    #[test]
    fn test_anchor_on_first_layer() {
        let config = JobConfig {
            do_anchor: true,
            starting_x: -10.0,
            starting_y: -10.0,
            ..Default::default()
        };
        let (_, text) = generate(config, &one_layer(vec![square_path()]));
        assert!(text.contains("(Anchor Start)"));
        assert!(text.contains("(Anchor End)"));
        let anchor = text.find("(Anchor Start)").unwrap();
        let slice = text.find("(Slice 0,").unwrap();
        assert!(anchor < slice);
        assert!(text.contains("X-10.000 Y-10.000"));
    }

    #[test]
    fn test_lead_in_and_out_extend_entry() {
        let mut config = JobConfig::default();
        config.extruders[0].lead_in = 2.0;
        config.extruders[0].lead_out = 1.0;
        let path = LabeledOpenPath {
            label: PathLabel::infill(PathOwner::Model),
            path: OpenPath::from_points(vec![Point2::new(0.0, 0.0), Point2::new(5.0, 0.0)]),
        };
        let (_, text) = generate(config, &one_layer(vec![path.clone()]));
        // entry extended backward along the first edge
        assert!(text.contains("X-2.000"), "{}", text);
        // exit extended forward along the last edge
        assert!(text.contains("X6.000"), "{}", text);

        // volumetric drives take the endpoints verbatim
        let mut config = JobConfig::default();
        config.extruders[0].lead_in = 2.0;
        config.extruders[0].is_volumetric = true;
        let (_, text) = generate(config, &one_layer(vec![path]));
        assert!(!text.contains("X-2.000"));
    }

    #[test]
    fn test_header_footer_markers() {
        let dir = std::env::temp_dir().join("toolpath-gcode-test");
        std::fs::create_dir_all(&dir).unwrap();
        let header = dir.join("start.gcode");
        let footer = dir.join("end.gcode");
        std::fs::write(&header, "G28 (home)\n").unwrap();
        std::fs::write(&footer, "M104 S0 (cool down)\n").unwrap();

        let config = JobConfig {
            header: Some(header.clone()),
            footer: Some(footer.clone()),
            ..Default::default()
        };
        let (_, text) = generate(config, &one_layer(vec![square_path()]));
        assert!(text.contains(&format!("(header [{}] begin)", header.display())));
        assert!(text.contains("G28 (home)"));
        assert!(text.contains(&format!("(footer [{}] end)", footer.display())));
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let config = JobConfig {
            header: Some("/nonexistent/header.gcode".into()),
            ..Default::default()
        };
        let mut gcoder = GCoder::new(config).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            gcoder.write_gcode_file(&one_layer(vec![square_path()]), &mut out, "t"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_group_toggles_skip_output() {
        let config = JobConfig {
            do_outlines: false,
            ..Default::default()
        };
        let (gcoder, text) = generate(config, &one_layer(vec![square_path()]));
        assert!(!text.contains("(outlines:"));
        assert!(gcoder.gantry().extruder_e(0).abs() < 1e-9);
    }
}
