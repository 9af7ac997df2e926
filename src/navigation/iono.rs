//! Broadcast ionospheric models
use bitflags::bitflags;
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    gnss_time::week_seconds,
    identity::{CarrierBand, NavType},
    navigation::{BdsHeader, LnavHeader},
    prelude::{Epoch, TimeScale},
};

/// Klobuchar model, broadcast by GPS (LNAV page 56, CNAV type 30,
/// CNAV-2 subframe 3 page 1) and BeiDou D1 (subframe 1).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KlobucharModel {
    /// Message this was decoded from
    pub source: NavType,
    /// Vertical delay amplitude coefficients (s, s/sc, s/sc², s/sc³)
    pub alpha: [f64; 4],
    /// Period coefficients (s, s/sc, s/sc², s/sc³)
    pub beta: [f64; 4],
    /// Preamble of the unit this was found in, when it has one
    pub preamble: u16,
}

impl KlobucharModel {
    /// Slant ionospheric delay (s) on L1 / B1, for a receiver at
    /// `lat_ddeg`, `lon_ddeg` seeing the satellite at `azim_ddeg`,
    /// `elev_ddeg`, at second of day `tod` expressed in the system time.
    fn l1_delay(&self, tod: f64, lat_ddeg: f64, lon_ddeg: f64, azim_ddeg: f64, elev_ddeg: f64) -> f64 {
        // semicircles
        let phi_u = lat_ddeg / 180.0;
        let lambda_u = lon_ddeg / 180.0;
        let e = elev_ddeg / 180.0;
        let a = azim_ddeg.to_radians();

        let psi = 0.0137 / (e + 0.11) - 0.022;
        let phi_i = (phi_u + psi * a.cos()).clamp(-0.416, 0.416);
        let lambda_i = lambda_u + psi * a.sin() / (phi_i * PI).cos();
        let phi_m = phi_i + 0.064 * ((lambda_i - 1.617) * PI).cos();

        let t = (4.32E4 * lambda_i + tod).rem_euclid(86_400.0);
        let f = 1.0 + 16.0 * (0.53 - e).powi(3);

        let mut amp = 0.0;
        let mut per = 0.0;
        for n in 0..4 {
            amp += self.alpha[n] * phi_m.powi(n as i32);
            per += self.beta[n] * phi_m.powi(n as i32);
        }
        let amp = amp.max(0.0);
        let per = per.max(72_000.0);

        let x = 2.0 * PI * (t - 50_400.0) / per;
        if x.abs() < 1.57 {
            f * (5.0E-9 + amp * (1.0 - x.powi(2) / 2.0 + x.powi(4) / 24.0))
        } else {
            f * 5.0E-9
        }
    }

    fn timescale(&self) -> TimeScale {
        match self.source {
            NavType::BdsD1 | NavType::BdsD2 => TimeScale::BDT,
            _ => TimeScale::GPST,
        }
    }

    /// Slant ionospheric delay in meters at epoch `t`, scaled to `carrier`.
    /// `rx_llh` is the receiver (latitude, longitude, altitude) in
    /// degrees and meters, `sv_azel` the satellite (azimuth, elevation)
    /// in degrees. Returns None for carriers without known frequency.
    pub fn delay(
        &self,
        t: Epoch,
        rx_llh: (f64, f64, f64),
        sv_azel: (f64, f64),
        carrier: CarrierBand,
    ) -> Option<f64> {
        let reference = match self.source {
            NavType::BdsD1 | NavType::BdsD2 => CarrierBand::B1.frequency()?,
            _ => CarrierBand::L1.frequency()?,
        };
        let freq = carrier.frequency()?;
        let (_, sow) = week_seconds(t, self.timescale());
        let tod = sow.rem_euclid(86_400.0);
        let delay = self.l1_delay(tod, rx_llh.0, rx_llh.1, sv_azel.0, sv_azel.1);
        Some(delay * crate::constants::SPEED_OF_LIGHT * (reference / freq).powi(2))
    }

    fn validate(&self) -> bool {
        match self.source {
            NavType::GpsLnav | NavType::GpsCnavL2 | NavType::GpsCnavL5 => {
                self.preamble == 0 || self.preamble == LnavHeader::PREAMBLE as u16
            },
            NavType::BdsD1 | NavType::BdsD2 => self.preamble == 0 || self.preamble == BdsHeader::PREAMBLE,
            _ => true,
        }
    }
}

bitflags! {
    /// NeQuick ionospheric disturbance flags, one per region
    #[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct NeQuickRegions: u8 {
        const REGION1 = 0x01;
        const REGION2 = 0x02;
        const REGION3 = 0x04;
        const REGION4 = 0x08;
        const REGION5 = 0x10;
    }
}

/// Galileo NeQuick-G effective ionisation level coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeQuickModel {
    /// Message this was decoded from
    pub source: NavType,
    /// Effective ionisation level coefficients (sfu, sfu/deg, sfu/deg²)
    pub ai: [f64; 3],
    /// Disturbance flags
    pub regions: NeQuickRegions,
}

impl NeQuickModel {
    /// Az value used when no coefficient is broadcast (sfu)
    pub const DEFAULT_AZ: f64 = 63.7;

    /// Effective ionisation level (sfu) at modified dip latitude
    /// `modip` (degrees), bounded to [0, 400].
    pub fn az(&self, modip: f64) -> f64 {
        if self.ai.iter().all(|ai| *ai == 0.0) {
            return Self::DEFAULT_AZ;
        }
        let az = self.ai[0] + self.ai[1] * modip + self.ai[2] * modip * modip;
        az.clamp(0.0, 400.0)
    }
}

/// Iono record payloads
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Iono {
    Klobuchar(KlobucharModel),
    NeQuick(NeQuickModel),
}

impl Iono {
    /// Message this was decoded from
    pub fn source(&self) -> NavType {
        match self {
            Self::Klobuchar(model) => model.source,
            Self::NeQuick(model) => model.source,
        }
    }

    /// Klobuchar slant delay (m), None for NeQuick models
    pub fn delay(
        &self,
        t: Epoch,
        rx_llh: (f64, f64, f64),
        sv_azel: (f64, f64),
        carrier: CarrierBand,
    ) -> Option<f64> {
        match self {
            Self::Klobuchar(model) => model.delay(t, rx_llh, sv_azel, carrier),
            Self::NeQuick(_) => None,
        }
    }

    pub(crate) fn validate(&self) -> bool {
        match self {
            Self::Klobuchar(model) => model.validate(),
            Self::NeQuick(_) => true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn model() -> KlobucharModel {
        KlobucharModel {
            source: NavType::GpsLnav,
            alpha: [1.1176E-8, -7.4506E-9, -5.9605E-8, 1.1921E-7],
            beta: [1.1674E+5, -2.2938E+5, -1.3107E+5, 1.0486E+6],
            preamble: 0x8b,
        }
    }

    #[test]
    fn klobuchar_night_floor() {
        // 02:00 local time: the cosine term vanishes, 5 ns times the
        // obliquity factor remains
        let model = model();
        let t = Epoch::from_gregorian_utc(2024, 1, 3, 2, 0, 0, 0);
        let delay = model
            .delay(t, (0.0, 0.0, 0.0), (0.0, 90.0), CarrierBand::L1)
            .unwrap();
        let f = 1.0 + 16.0 * (0.53_f64 - 0.5).powi(3);
        assert!((delay - f * 5.0E-9 * 299_792_458.0).abs() < 1.0E-3);
    }

    #[test]
    fn klobuchar_daytime_scaling() {
        let model = model();
        let t = Epoch::from_gregorian_utc(2024, 1, 3, 14, 0, 0, 0);
        let l1 = model
            .delay(t, (45.0, 5.0, 0.0), (120.0, 30.0), CarrierBand::L1)
            .unwrap();
        let l5 = model
            .delay(t, (45.0, 5.0, 0.0), (120.0, 30.0), CarrierBand::L5)
            .unwrap();
        // a few meters on L1 at mid latitudes
        assert!(l1 > 1.0 && l1 < 30.0, "{}", l1);
        let ratio = (1575.42_f64 / 1176.45).powi(2);
        assert!((l5 / l1 - ratio).abs() < 1.0E-9);
        assert!(model
            .delay(t, (45.0, 5.0, 0.0), (120.0, 30.0), CarrierBand::Unknown)
            .is_none());
    }

    #[test]
    fn klobuchar_preambles() {
        let mut model = model();
        assert!(Iono::Klobuchar(model).validate());
        model.preamble = 0x8c;
        assert!(!Iono::Klobuchar(model).validate());
    }

    #[test]
    fn nequick_az() {
        let model = NeQuickModel {
            source: NavType::GalInav,
            ai: [0.0; 3],
            regions: NeQuickRegions::empty(),
        };
        assert_eq!(model.az(30.0), NeQuickModel::DEFAULT_AZ);
        let model = NeQuickModel {
            ai: [120.0, 0.5, 0.01],
            ..model
        };
        assert!((model.az(10.0) - 126.0).abs() < 1.0E-9);
        let model = NeQuickModel {
            ai: [-50.0, 0.0, 0.0],
            ..model
        };
        assert_eq!(model.az(10.0), 0.0);
    }
}
