//! Physical constants used by the broadcast models
use crate::prelude::{Constellation, SV};

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Earth gravitational constants (m³.s⁻²)
pub(crate) struct GM;

impl GM {
    pub const GPS: f64 = 3.9860050E14;
    pub const BDS: f64 = 3.986004418E14;
    pub const GLO: f64 = 3.9860044E14;
    pub const GAL: f64 = 3.986004418E14;
}

/// Earth rotation rates (rad.s⁻¹)
pub(crate) struct Omega;

impl Omega {
    pub const GPS: f64 = 7.2921151467E-5;
    pub const BDS: f64 = 7.292115E-5;
    pub const GLO: f64 = 7.292115E-5;
    pub const GAL: f64 = 7.2921151467E-5;
}

/// - 2 * sqrt(gm) / c / c
pub(crate) struct DtrF;

impl DtrF {
    pub const GPS: f64 = -0.000000000444280763339306;
    pub const BDS: f64 = -0.00000000044428073090439775;
    pub const GAL: f64 = -0.00000000044428073090439775;
}

/// PZ-90 parameters, for GLONASS state vector integration
pub(crate) struct PZ90;

impl PZ90 {
    /// Equatorial radius (m)
    pub const AE: f64 = 6_378_136.0;
    /// Second zonal harmonic
    pub const J2: f64 = 1.0826257E-3;
}

pub(crate) struct MaxIterNumber;

impl MaxIterNumber {
    /// Maximum number of iterations to solve the Kepler equation
    pub const KEPLER: u8 = 30;
}

/// Constellation dependent constants
pub(crate) struct Constants;

impl Constants {
    /// Earth gravitational constant
    pub const fn gm(sv: SV) -> f64 {
        match sv.constellation {
            Constellation::BeiDou => GM::BDS,
            Constellation::Galileo => GM::GAL,
            Constellation::Glonass => GM::GLO,
            _ => GM::GPS,
        }
    }
    /// Earth rotation rate
    pub const fn omega(sv: SV) -> f64 {
        match sv.constellation {
            Constellation::BeiDou => Omega::BDS,
            Constellation::Galileo => Omega::GAL,
            Constellation::Glonass => Omega::GLO,
            _ => Omega::GPS,
        }
    }
    /// Auxiliary quantity for the relativistic clock correction
    pub const fn dtr_f(sv: SV) -> f64 {
        match sv.constellation {
            Constellation::BeiDou => DtrF::BDS,
            Constellation::Galileo => DtrF::GAL,
            _ => DtrF::GPS,
        }
    }
}
