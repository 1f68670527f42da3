// hydro-core/src/units.rs

use uom::si::f64::{
    Length as UomLength, Power as UomPower, Ratio as UomRatio, Time as UomTime,
    Velocity as UomVelocity, VolumeRate as UomVolumeRate,
};

// Public canonical unit types (SI, f64).
//
// The network's natural quantities are head/elevation (Length, meters) and
// volumetric flow (VolumeRate, m^3/s) rather than pressure or mass-rate:
// EPANET-style hydraulics is expressed in head, not pressure. Unit conversion
// from the INP file's declared `UNITS` option happens once at ingestion
// (hydro-inp); everything downstream of that is plain SI.
pub type Length = UomLength;
pub type Time = UomTime;
pub type VolumeFlow = UomVolumeRate;
pub type Power = UomPower;
pub type Ratio = UomRatio;
pub type Velocity = UomVelocity;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn cms(v: f64) -> VolumeFlow {
    use uom::si::volume_rate::cubic_meter_per_second;
    VolumeFlow::new::<cubic_meter_per_second>(v)
}

#[inline]
pub fn watts(v: f64) -> Power {
    use uom::si::power::watt;
    Power::new::<watt>(v)
}

#[inline]
pub fn mps(v: f64) -> Velocity {
    use uom::si::velocity::meter_per_second;
    Velocity::new::<meter_per_second>(v)
}

#[inline]
pub fn unitless(v: f64) -> Ratio {
    use uom::si::ratio::ratio;
    Ratio::new::<ratio>(v)
}

pub mod constants {
    /// Gravitational acceleration, m/s^2.
    pub const G: f64 = 9.806_65;
    /// Density of water at ~20C, kg/m^3. Used to convert pump Power-mode
    /// wattage into an equivalent head-flow product.
    pub const RHO_WATER: f64 = 998.2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_smoke() {
        let _l = m(10.0);
        let _t = s(3600.0);
        let _q = cms(0.05);
        let _p = watts(750.0);
        let _v = mps(1.2);
        let _r = unitless(0.9);
    }
}
