//! Physical machine state.
//!
//! One [`Gantry`] lives for the whole job. Every emitted motion is a
//! delta against this state, written as an absolute-coordinate command;
//! axes that did not move stay off the line, and the feedrate is only
//! written when it changes.

use crate::{Result, Scalar, EPSILON};
use std::io::Write;

/// Moving-head state: position, per-extruder filament axis, feedrate and
/// fan.
#[derive(Debug)]
pub struct Gantry {
    x: Scalar,
    y: Scalar,
    z: Scalar,
    e: Vec<Scalar>,
    current_extruder: usize,
    feedrate: Option<Scalar>,
    fan_on: bool,
}

impl Gantry {
    /// Park the gantry at the configured start position with clean axes.
    pub fn init_to_start(extruder_count: usize, x: Scalar, y: Scalar) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            e: vec![0.0; extruder_count],
            current_extruder: 0,
            feedrate: None,
            fan_on: false,
        }
    }

    pub fn position(&self) -> (Scalar, Scalar, Scalar) {
        (self.x, self.y, self.z)
    }

    /// Filament axis value for one extruder.
    pub fn extruder_e(&self, extruder: usize) -> Scalar {
        self.e[extruder]
    }

    pub fn set_current_extruder(&mut self, extruder: usize) {
        self.current_extruder = extruder;
    }

    pub fn current_extruder(&self) -> usize {
        self.current_extruder
    }

    /// Move without extruding.
    pub fn travel<W: Write>(
        &mut self,
        out: &mut W,
        x: Scalar,
        y: Scalar,
        z: Scalar,
        feedrate: Scalar,
        comment: &str,
    ) -> Result<()> {
        self.g1(out, Some(x), Some(y), Some(z), None, feedrate, comment)
    }

    /// Move in the plane while feeding `delta_e` of filament.
    pub fn extrude_to<W: Write>(
        &mut self,
        out: &mut W,
        x: Scalar,
        y: Scalar,
        delta_e: Scalar,
        feedrate: Scalar,
        comment: &str,
    ) -> Result<()> {
        let e = self.e[self.current_extruder] + delta_e;
        self.g1(out, Some(x), Some(y), None, Some(e), feedrate, comment)
    }

    /// Raise or lower the platform axis only.
    pub fn move_z<W: Write>(&mut self, out: &mut W, z: Scalar, feedrate: Scalar) -> Result<()> {
        self.g1(out, None, None, Some(z), None, feedrate, "move Z")
    }

    /// Retract filament ahead of a travel.
    pub fn snort<W: Write>(
        &mut self,
        out: &mut W,
        distance: Scalar,
        feedrate: Scalar,
    ) -> Result<()> {
        if distance <= 0.0 {
            return Ok(());
        }
        let e = self.e[self.current_extruder] - distance;
        self.g1(out, None, None, None, Some(e), feedrate, "snort")
    }

    /// Prime filament back after a travel.
    pub fn squirt<W: Write>(
        &mut self,
        out: &mut W,
        distance: Scalar,
        feedrate: Scalar,
    ) -> Result<()> {
        if distance <= 0.0 {
            return Ok(());
        }
        let e = self.e[self.current_extruder] + distance;
        self.g1(out, None, None, None, Some(e), feedrate, "squirt")
    }

    /// Write the fan state when it changes.
    pub fn set_fan<W: Write>(&mut self, out: &mut W, on: bool, tool: usize) -> Result<()> {
        if self.fan_on == on {
            return Ok(());
        }
        self.fan_on = on;
        if on {
            writeln!(out, "M126 T{} (Turn on the fan)", tool)?;
        } else {
            writeln!(out, "M127 T{} (Turn off the fan)", tool)?;
        }
        Ok(())
    }

    pub fn fan_on(&self) -> bool {
        self.fan_on
    }

    /// Emit one G1 with the axes that actually move.
    fn g1<W: Write>(
        &mut self,
        out: &mut W,
        x: Option<Scalar>,
        y: Option<Scalar>,
        z: Option<Scalar>,
        e: Option<Scalar>,
        feedrate: Scalar,
        comment: &str,
    ) -> Result<()> {
        let mut line = String::from("G1");
        let mut moved = false;

        if let Some(x) = x {
            if (x - self.x).abs() > EPSILON {
                line.push_str(&format!(" X{:.3}", x));
                self.x = x;
                moved = true;
            }
        }
        if let Some(y) = y {
            if (y - self.y).abs() > EPSILON {
                line.push_str(&format!(" Y{:.3}", y));
                self.y = y;
                moved = true;
            }
        }
        if let Some(z) = z {
            if (z - self.z).abs() > EPSILON {
                line.push_str(&format!(" Z{:.3}", z));
                self.z = z;
                moved = true;
            }
        }
        if let Some(e) = e {
            if (e - self.e[self.current_extruder]).abs() > EPSILON {
                line.push_str(&format!(" E{:.3}", e));
                self.e[self.current_extruder] = e;
                moved = true;
            }
        }
        if !moved {
            return Ok(());
        }
        if self.feedrate != Some(feedrate) {
            line.push_str(&format!(" F{:.3}", feedrate));
            self.feedrate = Some(feedrate);
        }
        writeln!(out, "{} ({})", line, comment)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit<F: FnOnce(&mut Gantry, &mut Vec<u8>)>(f: F) -> (Gantry, String) {
        let mut gantry = Gantry::init_to_start(2, 0.0, 0.0);
        let mut out = Vec::new();
        f(&mut gantry, &mut out);
        (gantry, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_travel_emits_absolute_coordinates() {
        let (gantry, text) = emit(|g, out| {
            g.travel(out, 1.0, 2.0, 0.5, 1400.0, "travel").unwrap();
        });
        assert_eq!(text, "G1 X1.000 Y2.000 Z0.500 F1400.000 (travel)\n");
        assert_eq!(gantry.position(), (1.0, 2.0, 0.5));
    }

    #[test]
    fn test_unchanged_axes_omitted() {
        let (_, text) = emit(|g, out| {
            g.travel(out, 1.0, 0.0, 0.0, 1400.0, "a").unwrap();
            g.travel(out, 1.0, 2.0, 0.0, 1400.0, "b").unwrap();
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "G1 X1.000 F1400.000 (a)");
        // X and F unchanged on the second move
        assert_eq!(lines[1], "G1 Y2.000 (b)");
    }

    #[test]
    fn test_extrude_advances_filament_axis() {
        let (gantry, text) = emit(|g, out| {
            g.extrude_to(out, 10.0, 0.0, 0.75, 1800.0, "bead").unwrap();
            g.extrude_to(out, 20.0, 0.0, 0.75, 1800.0, "bead").unwrap();
        });
        assert!(text.contains("E0.750"));
        assert!(text.contains("E1.500"));
        assert!((gantry.extruder_e(0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_snort_squirt_round_trip() {
        let (gantry, text) = emit(|g, out| {
            g.snort(out, 1.0, 1200.0).unwrap();
            g.squirt(out, 1.0, 1200.0).unwrap();
        });
        assert!(text.contains("E-1.000"));
        assert!(text.contains("(snort)"));
        assert!(text.contains("(squirt)"));
        assert!(gantry.extruder_e(0).abs() < 1e-12);
    }

    #[test]
    fn test_per_extruder_filament_axes() {
        let (gantry, _) = emit(|g, out| {
            g.extrude_to(out, 5.0, 0.0, 1.0, 1800.0, "a").unwrap();
            g.set_current_extruder(1);
            g.extrude_to(out, 6.0, 0.0, 2.0, 1800.0, "b").unwrap();
        });
        assert!((gantry.extruder_e(0) - 1.0).abs() < 1e-12);
        assert!((gantry.extruder_e(1) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_fan_writes_only_on_change() {
        let (_, text) = emit(|g, out| {
            g.set_fan(out, true, 0).unwrap();
            g.set_fan(out, true, 0).unwrap();
            g.set_fan(out, false, 0).unwrap();
        });
        assert_eq!(text.matches("M126").count(), 1);
        assert_eq!(text.matches("M127").count(), 1);
    }

    #[test]
    fn test_zero_motion_emits_nothing() {
        let (_, text) = emit(|g, out| {
            g.travel(out, 0.0, 0.0, 0.0, 1400.0, "noop").unwrap();
        });
        assert!(text.is_empty());
    }
}
