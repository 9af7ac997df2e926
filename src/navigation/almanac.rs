//! Broadcast almanacs
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    identity::NavType,
    navigation::{
        ephemeris::latest_plus, CnavHeader, GalHealthStatus, KeplerOrbit, LnavHeader, BdsHeader,
        OrbitError, SVHealth, ValidityInterval, Xvt,
    },
    prelude::{Duration, Epoch, SV},
};

/// GPS almanacs are valid 70 hours before and 74 hours after toa
const GPS_FIT_BEFORE: f64 = 70.0 * 3600.0;
const GPS_FIT_AFTER: f64 = 74.0 * 3600.0;

/// GPS LNAV almanac (subframe 4 and 5 pages), completed with the
/// toa week found in page 51.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsLnavAlmanac {
    /// Orbit, referenced at toa
    pub orbit: KeplerOrbit,
    /// Header of the almanac page
    pub header: LnavHeader,
    /// Transmit times of the almanac page and page 51
    pub xmit: [Epoch; 2],
    /// 8 bit health
    pub health: u8,
}

/// GPS CNAV (type 37) and CNAV-2 (subframe 3 page 4) midi almanac
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsMidiAlmanac {
    /// Orbit, referenced at toa
    pub orbit: KeplerOrbit,
    /// Message header, CNAV only
    pub header: Option<CnavHeader>,
    /// Transmit time
    pub xmit: Epoch,
    /// L1 health bit
    pub health_l1: bool,
    /// L2 health bit
    pub health_l2: bool,
    /// L5 health bit
    pub health_l5: bool,
}

/// Galileo almanac (I/NAV words 7 to 10, F/NAV pages 5 and 6)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GalAlmanac {
    /// Orbit, referenced at toa
    pub orbit: KeplerOrbit,
    /// Transmit times of the two units carrying it
    pub xmit: [Epoch; 2],
    /// Issue of data, almanac
    pub ioda: u8,
    pub hs_e1b: Option<GalHealthStatus>,
    pub hs_e5b: Option<GalHealthStatus>,
    pub hs_e5a: Option<GalHealthStatus>,
}

/// BeiDou D1 almanac (subframe 4 pages 1 to 24, subframe 5 pages 1 to 6)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BdsD1Almanac {
    /// Orbit, referenced at toa
    pub orbit: KeplerOrbit,
    /// Subframe header
    pub header: BdsHeader,
    /// Transmit time
    pub xmit: Epoch,
}

/// GLONASS FDMA almanac (odd and even string pair)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GloFnavAlmanac {
    /// Transmit times of the odd and even strings
    pub xmit: [Epoch; 2],
    /// Time reference: first ascending node crossing (tλ)
    pub toa: Epoch,
    /// Immediate health flag
    pub cn: bool,
    /// Satellite type
    pub m: u8,
    /// Slot number
    pub slot: u8,
    /// Coarse clock bias (s)
    pub tau: f64,
    /// Longitude of the ascending node (semicircles)
    pub lambda: f64,
    /// Inclination correction to 63° (semicircles)
    pub delta_i: f64,
    /// Eccentricity
    pub ecc: f64,
    /// Argument of perigee (semicircles)
    pub omega: f64,
    /// Draconian period correction to 43200 s (s)
    pub delta_t: f64,
    /// Draconian period rate (s/orbit²)
    pub delta_t_dot: f64,
    /// Frequency channel
    pub h: i8,
    /// Health flag (ln)
    pub ln: bool,
}

/// Almanac record payloads
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Almanac {
    GpsLnav(GpsLnavAlmanac),
    GpsCnav(GpsMidiAlmanac),
    GpsCnav2(GpsMidiAlmanac),
    GalInav(GalAlmanac),
    GalFnav(GalAlmanac),
    BdsD1(BdsD1Almanac),
    GloFnav(GloFnavAlmanac),
}

impl Almanac {
    /// Keplerian elements, GLONASS excluded
    pub fn kepler(&self) -> Option<&KeplerOrbit> {
        match self {
            Self::GpsLnav(alm) => Some(&alm.orbit),
            Self::GpsCnav(alm) | Self::GpsCnav2(alm) => Some(&alm.orbit),
            Self::GalInav(alm) | Self::GalFnav(alm) => Some(&alm.orbit),
            Self::BdsD1(alm) => Some(&alm.orbit),
            Self::GloFnav(_) => None,
        }
    }

    /// Almanac reference time
    pub fn toa(&self) -> Epoch {
        match self {
            Self::GpsLnav(alm) => alm.orbit.toe,
            Self::GpsCnav(alm) | Self::GpsCnav2(alm) => alm.orbit.toe,
            Self::GalInav(alm) | Self::GalFnav(alm) => alm.orbit.toe,
            Self::BdsD1(alm) => alm.orbit.toe,
            Self::GloFnav(alm) => alm.toa,
        }
    }

    /// Evaluates the state of `sv` at `t`. GLONASS almanacs are not
    /// supported.
    pub fn xvt(&self, sv: SV, t: Epoch) -> Result<Xvt, OrbitError> {
        match self.kepler() {
            Some(orbit) => orbit.xvt(sv, t),
            None => Err(OrbitError::Unsupported(sv)),
        }
    }

    /// Health advertised by the almanac
    pub fn health(&self) -> SVHealth {
        let healthy = match self {
            Self::GpsLnav(alm) => alm.health == 0,
            Self::GpsCnav(alm) | Self::GpsCnav2(alm) => {
                !(alm.health_l1 || alm.health_l2 || alm.health_l5)
            },
            Self::GalInav(alm) | Self::GalFnav(alm) => [alm.hs_e1b, alm.hs_e5b, alm.hs_e5a]
                .iter()
                .flatten()
                .all(|hs| *hs == GalHealthStatus::OK),
            Self::BdsD1(alm) => alm.orbit.healthy,
            Self::GloFnav(alm) => alm.cn && !alm.ln,
        };
        if healthy {
            SVHealth::Healthy
        } else {
            SVHealth::Unhealthy
        }
    }

    pub(crate) fn validate(&self) -> bool {
        match self {
            Self::GpsLnav(alm) => alm.header.validate(),
            Self::GpsCnav(alm) => alm.header.map(|h| h.validate()).unwrap_or(true),
            Self::BdsD1(alm) => alm.header.validate(),
            Self::GpsCnav2(_) | Self::GalInav(_) | Self::GalFnav(_) | Self::GloFnav(_) => true,
        }
    }

    pub(crate) fn user_time(&self, nav: NavType) -> Epoch {
        match self {
            Self::GpsLnav(alm) => latest_plus(&alm.xmit, 6.0),
            Self::GpsCnav(alm) => {
                let msg = if nav == NavType::GpsCnavL5 { 6.0 } else { 12.0 };
                alm.xmit + Duration::from_seconds(msg)
            },
            Self::GpsCnav2(alm) => alm.xmit + Duration::from_seconds(5.48),
            Self::GalInav(alm) => latest_plus(&alm.xmit, 2.0),
            Self::GalFnav(alm) => latest_plus(&alm.xmit, 10.0),
            Self::BdsD1(alm) => alm.xmit + Duration::from_seconds(6.0),
            Self::GloFnav(alm) => latest_plus(&alm.xmit, 2.0),
        }
    }

    pub(crate) fn fix_fit(&self) -> ValidityInterval {
        let toa = self.toa();
        match self {
            Self::GpsLnav(_) | Self::GpsCnav(_) | Self::GpsCnav2(_) => ValidityInterval::new(
                toa - Duration::from_seconds(GPS_FIT_BEFORE),
                toa + Duration::from_seconds(GPS_FIT_AFTER),
            ),
            Self::GalInav(alm) | Self::GalFnav(alm) => {
                ValidityInterval::new(alm.xmit[0], toa + Duration::from_seconds(GPS_FIT_AFTER))
            },
            Self::BdsD1(alm) => {
                ValidityInterval::new(alm.xmit, toa + Duration::from_seconds(7.0 * 86_400.0))
            },
            Self::GloFnav(alm) => ValidityInterval::from(alm.xmit[0]),
        }
    }
}
