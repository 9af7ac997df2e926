//! Broadcast ephemerides
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Omega, GM, PZ90},
    gnss_time::{latest, round_down, week_seconds},
    identity::NavType,
    navigation::{
        BdsHeader, CnavHeader, GalDataValidity, GalHealthStatus, KeplerOrbit, LnavHeader,
        OrbitError, SVHealth, ValidityInterval, Xvt,
    },
    prelude::{Duration, Epoch, TimeScale, SV},
};

/// GPS LNAV ephemeris (subframes 1, 2 and 3)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsLnavEphemeris {
    pub orbit: KeplerOrbit,
    /// Subframes 1, 2 and 3 headers
    pub headers: [LnavHeader; 3],
    /// Subframes 1, 2 and 3 transmit times
    pub xmit: [Epoch; 3],
    /// Issue of data, clock
    pub iodc: u16,
    /// Issue of data, ephemeris
    pub iode: u8,
    /// Fit interval flag
    pub fit_interval: bool,
    /// User range accuracy index
    pub ura: u8,
    /// 6 bit health
    pub health: u8,
    /// Codes on L2
    pub l2_codes: u8,
    /// L2 P data flag
    pub l2p_data: bool,
    /// Group delay (s)
    pub tgd: f64,
    /// Age of data offset (s)
    pub aodo: f64,
}

impl GpsLnavEphemeris {
    /// Fit interval in hours, from the fit interval flag and IODC
    pub fn fit_hours(&self) -> f64 {
        lnav_fit_hours(self.iodc, self.fit_interval)
    }
}

/// Legacy GPS fit interval, in hours (IS-GPS-200 20.3.4.4)
pub fn lnav_fit_hours(iodc: u16, fit_interval: bool) -> f64 {
    if !fit_interval {
        return 4.0;
    }
    match iodc {
        240..=247 => 8.0,
        248..=255 | 496 => 14.0,
        497..=503 => 26.0,
        504..=510 => 50.0,
        511 | 752..=756 => 74.0,
        757..=763 => 98.0,
        764..=767 | 1008..=1010 => 122.0,
        1011..=1020 => 146.0,
        _ => 6.0,
    }
}

/// GPS CNAV ephemeris (message types 10, 11 and a clock message)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsCnavEphemeris {
    pub orbit: KeplerOrbit,
    /// Headers of messages 10, 11 and clock
    pub headers: [CnavHeader; 3],
    /// Transmit times of messages 10, 11 and clock
    pub xmit: [Epoch; 3],
    /// Data predict time of week
    pub top: Epoch,
    /// Elevation dependent accuracy index
    pub ura_ed: i8,
    /// Non elevation dependent accuracy indexes
    pub ura_ned0: i8,
    pub ura_ned1: u8,
    pub ura_ned2: u8,
    /// Signal health bits
    pub health_l1: bool,
    pub health_l2: bool,
    pub health_l5: bool,
    /// Integrity status flag
    pub integrity: bool,
    /// L2C phasing flag
    pub l2c_phasing: bool,
}

/// GPS CNAV-2 ephemeris (subframe 2)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsCnav2Ephemeris {
    pub orbit: KeplerOrbit,
    /// Subframe 2 transmit time
    pub xmit: Epoch,
    /// Data predict time of week
    pub top: Epoch,
    /// Elevation dependent accuracy index
    pub ura_ed: i8,
    /// Non elevation dependent accuracy indexes
    pub ura_ned0: i8,
    pub ura_ned1: u8,
    pub ura_ned2: u8,
    /// L1C health bit
    pub health_l1c: bool,
    /// Integrity status flag
    pub integrity: bool,
}

/// Galileo I/NAV ephemeris (word types 1 to 5)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GalInavEphemeris {
    pub orbit: KeplerOrbit,
    /// Word types 1 to 5 transmit times
    pub xmit: [Epoch; 5],
    /// Issue of data, navigation
    pub iod_nav: u16,
    /// Signal In Space Accuracy index
    pub sisa: u8,
    /// E1-E5a broadcast group delay (s)
    pub bgd_e1e5a: f64,
    /// E1-E5b broadcast group delay (s)
    pub bgd_e1e5b: f64,
    pub hs_e1b: GalHealthStatus,
    pub hs_e5b: GalHealthStatus,
    pub dvs_e1b: GalDataValidity,
    pub dvs_e5b: GalDataValidity,
}

/// Galileo F/NAV ephemeris (page types 1 to 4)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GalFnavEphemeris {
    pub orbit: KeplerOrbit,
    /// Page types 1 to 4 transmit times
    pub xmit: [Epoch; 4],
    /// Issue of data, navigation
    pub iod_nav: u16,
    /// Signal In Space Accuracy index
    pub sisa: u8,
    /// E1-E5a broadcast group delay (s)
    pub bgd_e1e5a: f64,
    pub hs_e5a: GalHealthStatus,
    pub dvs_e5a: GalDataValidity,
}

/// BeiDou D1 ephemeris (subframes 1, 2 and 3)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BdsD1Ephemeris {
    pub orbit: KeplerOrbit,
    /// Subframes 1, 2 and 3 headers
    pub headers: [BdsHeader; 3],
    /// Subframes 1, 2 and 3 transmit times
    pub xmit: [Epoch; 3],
    /// Age of data, clock
    pub aodc: u8,
    /// Age of data, ephemeris
    pub aode: u8,
    /// User range accuracy index
    pub urai: u8,
    /// Autonomous health flag
    pub sat_h1: bool,
    /// B1I group delay (s)
    pub tgd1: f64,
    /// B2I group delay (s)
    pub tgd2: f64,
}

/// BeiDou D2 ephemeris, spread over the ten pages of subframe 1
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BdsD2Ephemeris {
    pub orbit: KeplerOrbit,
    /// Pages 1 to 10 headers
    pub headers: [BdsHeader; 10],
    /// Pages 1 to 10 transmit times
    pub xmit: [Epoch; 10],
    /// Age of data, clock
    pub aodc: u8,
    /// Age of data, ephemeris
    pub aode: u8,
    /// User range accuracy index
    pub urai: u8,
    /// Autonomous health flag
    pub sat_h1: bool,
    /// B1I group delay (s)
    pub tgd1: f64,
    /// B2I group delay (s)
    pub tgd2: f64,
}

/// GLONASS FDMA ephemeris (strings 1 to 4): a PZ-90 state vector
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GloFnavEphemeris {
    /// State vector reference time (tb)
    pub toe: Epoch,
    /// Strings 1 to 4 transmit times
    pub xmit: [Epoch; 4],
    /// Position (m)
    pub pos: Vector3<f64>,
    /// Velocity (m/s)
    pub vel: Vector3<f64>,
    /// Lunisolar acceleration (m/s²)
    pub acc: Vector3<f64>,
    /// Clock bias (s)
    pub tau_n: f64,
    /// Relative frequency offset
    pub gamma_n: f64,
    /// L1/L2 time difference (s)
    pub delta_tau_n: f64,
    /// Health word (Bn)
    pub bn: u8,
    /// Health flag (ln)
    pub ln: bool,
    /// Interval between adjacent tb (minutes)
    pub interval: u32,
    /// Odd (true) or even tb flag (P2)
    pub p2: bool,
    /// Number of satellites in the current frame's almanac flag (P3)
    pub p3: bool,
    /// Updated ephemeris flag (P4)
    pub p4: bool,
    /// Age of data (days)
    pub en: u8,
    /// Accuracy index
    pub ft: u8,
    /// Slot number
    pub slot: u8,
    /// Satellite type (M)
    pub m: u8,
}

impl GloFnavEphemeris {
    /// Integration step (s)
    const STEP: f64 = 60.0;

    /// Acceleration in the rotating PZ-90 frame
    fn derivative(&self, pos: &Vector3<f64>, vel: &Vector3<f64>) -> Vector3<f64> {
        let mu = GM::GLO;
        let w = Omega::GLO;
        let r2 = pos.norm_squared();
        let r = r2.sqrt();
        let r3 = r2 * r;
        let r5 = r3 * r2;
        let z2_r2 = pos.z * pos.z / r2;
        let j2 = 1.5 * PZ90::J2 * mu * PZ90::AE * PZ90::AE / r5;
        Vector3::new(
            -mu * pos.x / r3 - j2 * pos.x * (1.0 - 5.0 * z2_r2)
                + w * w * pos.x
                + 2.0 * w * vel.y
                + self.acc.x,
            -mu * pos.y / r3 - j2 * pos.y * (1.0 - 5.0 * z2_r2) + w * w * pos.y
                - 2.0 * w * vel.x
                + self.acc.y,
            -mu * pos.z / r3 - j2 * pos.z * (3.0 - 5.0 * z2_r2) + self.acc.z,
        )
    }

    /// One 4th order Runge Kutta step of `h` seconds
    fn rk4(&self, pos: Vector3<f64>, vel: Vector3<f64>, h: f64) -> (Vector3<f64>, Vector3<f64>) {
        let k1_v = self.derivative(&pos, &vel);
        let k1_p = vel;
        let k2_v = self.derivative(&(pos + k1_p * h / 2.0), &(vel + k1_v * h / 2.0));
        let k2_p = vel + k1_v * h / 2.0;
        let k3_v = self.derivative(&(pos + k2_p * h / 2.0), &(vel + k2_v * h / 2.0));
        let k3_p = vel + k2_v * h / 2.0;
        let k4_v = self.derivative(&(pos + k3_p * h), &(vel + k3_v * h));
        let k4_p = vel + k3_v * h;
        (
            pos + (k1_p + k2_p * 2.0 + k3_p * 2.0 + k4_p) * h / 6.0,
            vel + (k1_v + k2_v * 2.0 + k3_v * 2.0 + k4_v) * h / 6.0,
        )
    }

    /// Integrates the state vector from tb to `t`
    pub fn xvt(&self, t: Epoch) -> Xvt {
        let dt = (t - self.toe).to_seconds();
        let (mut pos, mut vel) = (self.pos, self.vel);
        let steps = (dt.abs() / Self::STEP).ceil() as usize;
        if steps > 0 {
            let h = dt / steps as f64;
            for _ in 0..steps {
                (pos, vel) = self.rk4(pos, vel, h);
            }
        }
        Xvt {
            x: pos,
            v: vel,
            clk_bias: -self.tau_n + self.gamma_n * dt,
            clk_drift: self.gamma_n,
            rel_corr: 0.0,
            health: if self.bn & 0x04 > 0 || self.ln {
                SVHealth::Unhealthy
            } else {
                SVHealth::Healthy
            },
        }
    }
}

/// Ephemeris record payloads
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Ephemeris {
    GpsLnav(GpsLnavEphemeris),
    GpsCnav(GpsCnavEphemeris),
    GpsCnav2(GpsCnav2Ephemeris),
    GalInav(GalInavEphemeris),
    GalFnav(GalFnavEphemeris),
    BdsD1(BdsD1Ephemeris),
    BdsD2(BdsD2Ephemeris),
    GloFnav(GloFnavEphemeris),
}

impl Ephemeris {
    /// Keplerian elements, if this is a Keplerian ephemeris
    pub fn kepler(&self) -> Option<&KeplerOrbit> {
        match self {
            Self::GpsLnav(eph) => Some(&eph.orbit),
            Self::GpsCnav(eph) => Some(&eph.orbit),
            Self::GpsCnav2(eph) => Some(&eph.orbit),
            Self::GalInav(eph) => Some(&eph.orbit),
            Self::GalFnav(eph) => Some(&eph.orbit),
            Self::BdsD1(eph) => Some(&eph.orbit),
            Self::BdsD2(eph) => Some(&eph.orbit),
            Self::GloFnav(_) => None,
        }
    }

    /// Reference time of ephemeris
    pub fn toe(&self) -> Epoch {
        match self {
            Self::GpsLnav(eph) => eph.orbit.toe,
            Self::GpsCnav(eph) => eph.orbit.toe,
            Self::GpsCnav2(eph) => eph.orbit.toe,
            Self::GalInav(eph) => eph.orbit.toe,
            Self::GalFnav(eph) => eph.orbit.toe,
            Self::BdsD1(eph) => eph.orbit.toe,
            Self::BdsD2(eph) => eph.orbit.toe,
            Self::GloFnav(eph) => eph.toe,
        }
    }

    /// Evaluates the state of `sv` at `t`
    pub fn xvt(&self, sv: SV, t: Epoch) -> Result<Xvt, OrbitError> {
        match self {
            Self::GloFnav(eph) => Ok(eph.xvt(t)),
            _ => match self.kepler() {
                Some(orbit) => orbit.xvt(sv, t),
                None => Err(OrbitError::Unsupported(sv)),
            },
        }
    }

    pub(crate) fn validate(&self) -> bool {
        match self {
            Self::GpsLnav(eph) => eph.headers.iter().all(|h| h.validate()),
            Self::GpsCnav(eph) => eph.headers.iter().all(|h| h.validate()),
            Self::BdsD1(eph) => eph.headers.iter().all(|h| h.validate()),
            Self::BdsD2(eph) => eph.headers.iter().all(|h| h.validate() && h.fraid == 1),
            Self::GpsCnav2(_) | Self::GalInav(_) | Self::GalFnav(_) | Self::GloFnav(_) => true,
        }
    }

    pub(crate) fn user_time(&self, nav: NavType) -> Epoch {
        match self {
            Self::GpsLnav(eph) => latest_plus(&eph.xmit, 6.0),
            Self::GpsCnav(eph) => {
                let msg = if nav == NavType::GpsCnavL5 { 6.0 } else { 12.0 };
                latest_plus(&eph.xmit, msg)
            },
            Self::GpsCnav2(eph) => eph.xmit + Duration::from_seconds(12.0),
            Self::GalInav(eph) => latest_plus(&eph.xmit, 2.0),
            Self::GalFnav(eph) => latest_plus(&eph.xmit, 10.0),
            Self::BdsD1(eph) => latest_plus(&eph.xmit, 6.0),
            Self::BdsD2(eph) => latest_plus(&eph.xmit, 0.6),
            Self::GloFnav(eph) => latest_plus(&eph.xmit, 2.0),
        }
    }

    pub(crate) fn fix_fit(&self) -> ValidityInterval {
        match self {
            Self::GpsLnav(eph) => {
                let (_, toe_sow) = week_seconds(eph.orbit.toe, TimeScale::GPST);
                let nominal = (toe_sow as i64) % 7200 == 0;
                let fit_seconds = 3600.0 * eph.fit_hours();
                let mut end = eph.orbit.toe + Duration::from_seconds(fit_seconds / 2.0);
                let begin = if nominal {
                    round_down(eph.xmit[0], TimeScale::GPST, 7200.0)
                } else {
                    // upload cutover: extend to the next 900 s boundary
                    let sow = toe_sow as i64;
                    let adjust = ((sow / 900) + 1) * 900 - sow;
                    end += Duration::from_seconds(adjust as f64);
                    eph.xmit[0]
                };
                ValidityInterval::new(begin, end)
            },
            Self::GpsCnav(eph) => {
                let first = eph.xmit.iter().copied().min().unwrap_or(eph.xmit[0]);
                cnav_fit(eph.orbit.toe, first)
            },
            Self::GpsCnav2(eph) => cnav_fit(eph.orbit.toe, eph.xmit),
            Self::GalInav(eph) => ValidityInterval::new(
                eph.xmit[0],
                eph.orbit.toe + Duration::from_seconds(4.0 * 3600.0),
            ),
            Self::GalFnav(eph) => ValidityInterval::new(
                eph.xmit[0],
                eph.orbit.toe + Duration::from_seconds(4.0 * 3600.0),
            ),
            Self::BdsD1(eph) => bds_fit(eph.orbit.toe, eph.xmit[0]),
            Self::BdsD2(eph) => bds_fit(eph.orbit.toe, eph.xmit[0]),
            Self::GloFnav(eph) => {
                let interval = if eph.interval > 0 { eph.interval } else { 30 };
                // half the interval on each side of tb, plus one string
                let half = interval as f64 * 30.0 + 30.0;
                ValidityInterval::new(eph.xmit[0], eph.toe + Duration::from_seconds(half))
            },
        }
    }
}

/// BeiDou fit rule: two hours ahead of toe, unless uploaded later,
/// and one day (plus one subframe) past the first transmission.
fn bds_fit(toe: Epoch, first_xmit: Epoch) -> ValidityInterval {
    let mut begin = toe - Duration::from_seconds(7200.0);
    if first_xmit > toe {
        begin = first_xmit;
    }
    ValidityInterval::new(begin, first_xmit + Duration::from_seconds(86_430.0))
}

/// CNAV and CNAV-2 fit rule: nominal Toe sit 90 minutes into a 2 hour
/// upload, off-nominal Toe get 5 extra minutes.
fn cnav_fit(toe: Epoch, first_xmit: Epoch) -> ValidityInterval {
    let (_, toe_sow) = week_seconds(toe, TimeScale::GPST);
    let nominal = (toe_sow as i64) % 7200 == 5400;
    let mut end = toe + Duration::from_seconds(5400.0);
    let begin = if nominal {
        round_down(first_xmit, TimeScale::GPST, 7200.0)
    } else {
        end += Duration::from_seconds(300.0);
        first_xmit
    };
    ValidityInterval::new(begin, end)
}

/// Latest of non empty `xmit`, plus the duration of one unit
pub(crate) fn latest_plus<const N: usize>(xmit: &[Epoch; N], seconds: f64) -> Epoch {
    let last = latest(xmit).unwrap_or(xmit[0]);
    last + Duration::from_seconds(seconds)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gnss_time::from_week_seconds;

    #[test]
    fn legacy_fit_intervals() {
        assert_eq!(lnav_fit_hours(0, false), 4.0);
        assert_eq!(lnav_fit_hours(100, true), 6.0);
        assert_eq!(lnav_fit_hours(240, true), 8.0);
        assert_eq!(lnav_fit_hours(496, true), 14.0);
        assert_eq!(lnav_fit_hours(500, true), 26.0);
        assert_eq!(lnav_fit_hours(505, true), 50.0);
        assert_eq!(lnav_fit_hours(752, true), 74.0);
        assert_eq!(lnav_fit_hours(760, true), 98.0);
        assert_eq!(lnav_fit_hours(1009, true), 122.0);
        assert_eq!(lnav_fit_hours(1015, true), 146.0);
    }

    #[test]
    fn glonass_integration() {
        let toe = Epoch::from_gregorian_utc(2024, 3, 1, 12, 15, 0, 0);
        let eph = GloFnavEphemeris {
            toe,
            xmit: [toe; 4],
            pos: Vector3::new(-14_000_000.0, 6_000_000.0, 20_000_000.0),
            vel: Vector3::new(500.0, -2_800.0, 1_200.0),
            acc: Vector3::zeros(),
            tau_n: 1.0E-5,
            gamma_n: 1.0E-12,
            delta_tau_n: 0.0,
            bn: 0,
            ln: false,
            interval: 30,
            p2: false,
            p3: false,
            p4: false,
            en: 0,
            ft: 0,
            slot: 1,
            m: 1,
        };
        let at_toe = eph.xvt(toe);
        assert_eq!(at_toe.x, eph.pos);
        assert_eq!(at_toe.v, eph.vel);
        assert_eq!(at_toe.clk_bias, -1.0E-5);
        // integrating forward then backward returns to the start
        let t = toe + Duration::from_seconds(900.0);
        let fwd = eph.xvt(t);
        let back = GloFnavEphemeris {
            toe: t,
            pos: fwd.x,
            vel: fwd.v,
            ..eph.clone()
        }
        .xvt(toe);
        assert!((back.x - eph.pos).norm() < 1.0E-2);
        // the satellite moved along its orbit
        assert!((fwd.x - eph.pos).norm() > 1_000_000.0);
        assert_eq!(fwd.health, SVHealth::Healthy);
    }

    #[test]
    fn cnav_nominal_fit() {
        let toe = from_week_seconds(2200, 5400.0, TimeScale::GPST);
        let xmit = from_week_seconds(2200, 600.0, TimeScale::GPST);
        let fit = cnav_fit(toe, xmit);
        assert_eq!(fit.begin, from_week_seconds(2200, 0.0, TimeScale::GPST));
        assert_eq!(fit.end, Some(from_week_seconds(2200, 10_800.0, TimeScale::GPST)));
        let toe = from_week_seconds(2200, 6000.0, TimeScale::GPST);
        let fit = cnav_fit(toe, xmit);
        assert_eq!(fit.begin, xmit);
        assert_eq!(fit.end, Some(from_week_seconds(2200, 11_700.0, TimeScale::GPST)));
    }
}
