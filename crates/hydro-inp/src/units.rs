//! Unit conversion from an INP file's declared flow units to SI.
//!
//! EPANET groups its ten flow units into two families: the five US
//! customary ones (`CFS`/`GPM`/`MGD`/`IMGD`/`AFD`), whose accompanying
//! length/diameter/pressure/power fields are feet, inches, and psi, and the
//! five metric ones (`LPS`/`LPM`/`MLD`/`CMH`/`CMD`), whose accompanying
//! fields are already expressed in SI units in the source file. Only the
//! US-family conversions carry a nonunity factor; the metric family is a
//! pass-through.

use crate::error::InpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowUnit {
    Cfs,
    Gpm,
    Mgd,
    Imgd,
    Afd,
    Lps,
    Lpm,
    Mld,
    Cmh,
    Cmd,
}

impl FlowUnit {
    pub fn parse(path: &str, line: usize, token: &str) -> Result<Self, InpError> {
        Ok(match token.to_ascii_uppercase().as_str() {
            "CFS" => FlowUnit::Cfs,
            "GPM" => FlowUnit::Gpm,
            "MGD" => FlowUnit::Mgd,
            "IMGD" => FlowUnit::Imgd,
            "AFD" => FlowUnit::Afd,
            "LPS" => FlowUnit::Lps,
            "LPM" => FlowUnit::Lpm,
            "MLD" => FlowUnit::Mld,
            "CMH" => FlowUnit::Cmh,
            "CMD" => FlowUnit::Cmd,
            other => {
                return Err(InpError::UnknownUnits {
                    path: path.to_string(),
                    line,
                    units: other.to_string(),
                })
            }
        })
    }

    /// `true` for the five US-customary flow units, whose length/diameter/
    /// pressure/power fields need the ft/in/psi/hp conversions below.
    pub fn is_us_customary(self) -> bool {
        matches!(self, FlowUnit::Cfs | FlowUnit::Gpm | FlowUnit::Mgd | FlowUnit::Imgd | FlowUnit::Afd)
    }

    /// Factor to multiply a flow quantity in this unit by to get m^3/s.
    pub fn to_cms_factor(self) -> f64 {
        match self {
            FlowUnit::Cfs => 0.0283168,
            FlowUnit::Gpm => 6.30902e-5,
            FlowUnit::Mgd => 0.0438126,
            FlowUnit::Imgd => 0.0526168,
            FlowUnit::Afd => 0.01427641,
            FlowUnit::Lps => 0.001,
            FlowUnit::Lpm => 1.66667e-5,
            FlowUnit::Mld => 0.0115741,
            FlowUnit::Cmh => 2.77778e-4,
            FlowUnit::Cmd => 1.15741e-5,
        }
    }
}

/// ft -> m.
pub const LENGTH_TO_M: f64 = 0.3048;
/// in -> m (pipe diameter).
pub const PIPE_DIAMETER_TO_M: f64 = 0.0254;
/// ft -> m (tank diameter).
pub const TANK_DIAMETER_TO_M: f64 = 0.3048;
/// psi -> m (pressure expressed as head).
pub const PRESSURE_TO_M: f64 = 0.7032;
/// hp -> W.
pub const POWER_TO_W: f64 = 745.699872;

/// Converts the quantities that appear in a single INP file, once its
/// `UNITS` option has been read.
#[derive(Debug, Clone, Copy)]
pub struct UnitConverter {
    pub flow: FlowUnit,
}

impl UnitConverter {
    pub fn new(flow: FlowUnit) -> Self {
        Self { flow }
    }

    pub fn flow_to_cms(self, v: f64) -> f64 {
        v * self.flow.to_cms_factor()
    }

    /// Pipe/node length or head, in (ft or m) -> m.
    pub fn length_to_m(self, v: f64) -> f64 {
        if self.flow.is_us_customary() {
            v * LENGTH_TO_M
        } else {
            v
        }
    }

    /// Pipe diameter, (in or mm-as-given) -> m.
    pub fn pipe_diameter_to_m(self, v: f64) -> f64 {
        if self.flow.is_us_customary() {
            v * PIPE_DIAMETER_TO_M
        } else {
            v
        }
    }

    /// Tank diameter, (ft or m) -> m.
    pub fn tank_diameter_to_m(self, v: f64) -> f64 {
        if self.flow.is_us_customary() {
            v * TANK_DIAMETER_TO_M
        } else {
            v
        }
    }

    /// Pressure expressed as head, (psi or m) -> m.
    pub fn pressure_to_m(self, v: f64) -> f64 {
        if self.flow.is_us_customary() {
            v * PRESSURE_TO_M
        } else {
            v
        }
    }

    /// Power, (hp or W-as-given) -> W.
    pub fn power_to_w(self, v: f64) -> f64 {
        if self.flow.is_us_customary() {
            v * POWER_TO_W
        } else {
            v
        }
    }

    /// Tank volume, (ft^3 or m^3-as-given) -> m^3.
    pub fn volume_to_m3(self, v: f64) -> f64 {
        if self.flow.is_us_customary() {
            v * LENGTH_TO_M * LENGTH_TO_M * LENGTH_TO_M
        } else {
            v
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_units_apply_nonunity_factors() {
        let u = UnitConverter::new(FlowUnit::Gpm);
        assert!((u.flow_to_cms(1.0) - 6.30902e-5).abs() < 1e-12);
        assert!((u.length_to_m(1.0) - 0.3048).abs() < 1e-12);
        assert!((u.pipe_diameter_to_m(1.0) - 0.0254).abs() < 1e-12);
        assert!((u.pressure_to_m(1.0) - 0.7032).abs() < 1e-12);
        assert!((u.power_to_w(1.0) - 745.699872).abs() < 1e-9);
    }

    #[test]
    fn metric_units_are_pass_through() {
        let u = UnitConverter::new(FlowUnit::Lps);
        assert!((u.flow_to_cms(1.0) - 0.001).abs() < 1e-12);
        assert_eq!(u.length_to_m(12.0), 12.0);
        assert_eq!(u.pipe_diameter_to_m(0.3), 0.3);
        assert_eq!(u.pressure_to_m(10.0), 10.0);
    }
}
