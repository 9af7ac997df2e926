//! Keplerian orbits and their evaluation
use log::error;
use nalgebra::{Matrix3, Rotation3, SMatrix, Vector3, Vector4};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Constants, MaxIterNumber},
    gnss_time::week_seconds,
    navigation::SVHealth,
    prelude::{Constellation, Epoch, TimeScale, SV},
};

/// Orbit evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrbitError {
    #[error("{0}: kepler equation did not converge")]
    KeplerDivergence(SV),
    #[error("{0}: orbit evaluation not supported")]
    Unsupported(SV),
    #[error("record does not identify a single satellite")]
    UnknownSatellite,
    #[error("record carries no orbit")]
    NoOrbit,
}

/// Satellite state at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Xvt {
    /// ECEF position (m)
    pub x: Vector3<f64>,
    /// ECEF velocity (m/s)
    pub v: Vector3<f64>,
    /// Clock bias (s)
    pub clk_bias: f64,
    /// Clock drift (s/s)
    pub clk_drift: f64,
    /// Relativistic clock correction (s)
    pub rel_corr: f64,
    /// Health of the data this was computed from
    pub health: SVHealth,
}

/// Keplerian elements, with harmonic perturbations and clock polynomial.
/// Almanacs use the same structure with zeroed harmonics.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeplerOrbit {
    /// Reference time of ephemeris
    pub toe: Epoch,
    /// Reference time of clock
    pub toc: Epoch,
    /// Mean anomaly at reference time (rad)
    pub m0: f64,
    /// Mean motion difference (rad/s)
    pub dn: f64,
    /// Rate of mean motion difference (rad/s²)
    pub dn_dot: f64,
    /// Eccentricity
    pub ecc: f64,
    /// Semi major axis (m)
    pub a: f64,
    /// Semi major axis rate (m/s)
    pub a_dot: f64,
    /// Longitude of ascending node at weekly epoch (rad)
    pub omega0: f64,
    /// Inclination at reference time (rad)
    pub i0: f64,
    /// Argument of perigee (rad)
    pub w: f64,
    /// Rate of right ascension (rad/s)
    pub omega_dot: f64,
    /// Rate of inclination (rad/s)
    pub idot: f64,
    /// Argument of latitude harmonic corrections (rad)
    pub cuc: f64,
    pub cus: f64,
    /// Orbit radius harmonic corrections (m)
    pub crc: f64,
    pub crs: f64,
    /// Inclination harmonic corrections (rad)
    pub cic: f64,
    pub cis: f64,
    /// Clock bias (s)
    pub af0: f64,
    /// Clock drift (s/s)
    pub af1: f64,
    /// Clock drift rate (s/s²)
    pub af2: f64,
    /// Health summary of the data set
    pub healthy: bool,
}

impl KeplerOrbit {
    /// Zeroed orbit, referenced at `toe`
    pub fn new(toe: Epoch) -> Self {
        Self {
            toe,
            toc: toe,
            m0: 0.0,
            dn: 0.0,
            dn_dot: 0.0,
            ecc: 0.0,
            a: 0.0,
            a_dot: 0.0,
            omega0: 0.0,
            i0: 0.0,
            w: 0.0,
            omega_dot: 0.0,
            idot: 0.0,
            cuc: 0.0,
            cus: 0.0,
            crc: 0.0,
            crs: 0.0,
            cic: 0.0,
            cis: 0.0,
            af0: 0.0,
            af1: 0.0,
            af2: 0.0,
            healthy: true,
        }
    }

    /// Clock polynomial bias at `t` (s), relativity excluded
    pub fn clock_bias(&self, t: Epoch) -> f64 {
        let dt = (t - self.toc).to_seconds();
        self.af0 + self.af1 * dt + self.af2 * dt * dt
    }

    /// Clock polynomial drift at `t` (s/s)
    pub fn clock_drift(&self, t: Epoch) -> f64 {
        let dt = (t - self.toc).to_seconds();
        self.af1 + 2.0 * self.af2 * dt
    }

    /// Evaluates position, velocity and clock state of `sv` at `t`.
    pub fn xvt(&self, sv: SV, t: Epoch) -> Result<Xvt, OrbitError> {
        let ts = match sv.constellation {
            Constellation::GPS | Constellation::QZSS => TimeScale::GPST,
            Constellation::Galileo => TimeScale::GST,
            Constellation::BeiDou => TimeScale::BDT,
            _ => return Err(OrbitError::Unsupported(sv)),
        };

        let gm = Constants::gm(sv);
        let omega_e = Constants::omega(sv);
        let dtr_f = Constants::dtr_f(sv);
        let beidou_geo = is_beidou_geo(sv);

        let t_k = (t - self.toe).to_seconds();
        let (_, toe_sow) = week_seconds(self.toe, ts);

        let a = self.a + self.a_dot * t_k;
        let n0 = (gm / self.a.powi(3)).sqrt();
        let n = n0 + self.dn + 0.5 * self.dn_dot * t_k;
        let m_k = self.m0 + n * t_k;

        let e = self.ecc;
        let mut e_k = m_k;
        let mut converged = false;
        for _ in 0..MaxIterNumber::KEPLER {
            let next = m_k + e * e_k.sin();
            let done = (next - e_k).abs() < 1.0E-12;
            e_k = next;
            if done {
                converged = true;
                break;
            }
        }
        if !converged {
            error!("{}: kepler iteration overflow", sv);
            return Err(OrbitError::KeplerDivergence(sv));
        }

        let (sin_e_k, cos_e_k) = e_k.sin_cos();
        let v_k = ((1.0 - e * e).sqrt() * sin_e_k).atan2(cos_e_k - e);
        let phi_k = v_k + self.w;
        let (x2_sin_phi_k, x2_cos_phi_k) = (2.0 * phi_k).sin_cos();

        let du_k = self.cus * x2_sin_phi_k + self.cuc * x2_cos_phi_k;
        let dr_k = self.crs * x2_sin_phi_k + self.crc * x2_cos_phi_k;
        let di_k = self.cis * x2_sin_phi_k + self.cic * x2_cos_phi_k;

        let u_k = phi_k + du_k;
        let r_k = a * (1.0 - e * cos_e_k) + dr_k;
        let i_k = self.i0 + di_k + self.idot * t_k;

        let omega_k = if beidou_geo {
            self.omega0 + self.omega_dot * t_k - omega_e * toe_sow
        } else {
            self.omega0 + (self.omega_dot - omega_e) * t_k - omega_e * toe_sow
        };

        // first derivatives
        let fd_e_k = n / (1.0 - e * cos_e_k);
        let fd_phi_k = (1.0 - e * e).sqrt() * fd_e_k / (1.0 - e * cos_e_k);
        let fd_u_k = fd_phi_k * (1.0 + 2.0 * (self.cus * x2_cos_phi_k - self.cuc * x2_sin_phi_k));
        let fd_r_k = a * e * sin_e_k * fd_e_k
            + self.a_dot * (1.0 - e * cos_e_k)
            + 2.0 * (self.crs * x2_cos_phi_k - self.crc * x2_sin_phi_k) * fd_phi_k;
        let fd_i_k =
            self.idot + 2.0 * (self.cis * x2_cos_phi_k - self.cic * x2_sin_phi_k) * fd_phi_k;
        let fd_omega_k = if beidou_geo {
            self.omega_dot
        } else {
            self.omega_dot - omega_e
        };

        // in the orbital plane
        let (sin_u_k, cos_u_k) = u_k.sin_cos();
        let (x, y) = (r_k * cos_u_k, r_k * sin_u_k);
        let fd_x = fd_r_k * cos_u_k - r_k * fd_u_k * sin_u_k;
        let fd_y = fd_r_k * sin_u_k + r_k * fd_u_k * cos_u_k;

        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), omega_k)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), i_k);
        let pos = rotation * Vector3::new(x, y, 0.0);

        let (sin_omega_k, cos_omega_k) = omega_k.sin_cos();
        let (sin_i_k, cos_i_k) = i_k.sin_cos();
        let mut fd_r = SMatrix::<f64, 3, 4>::zeros();
        fd_r[(0, 0)] = cos_omega_k;
        fd_r[(0, 1)] = -sin_omega_k * cos_i_k;
        fd_r[(0, 2)] = -(x * sin_omega_k + y * cos_omega_k * cos_i_k);
        fd_r[(0, 3)] = y * sin_omega_k * sin_i_k;
        fd_r[(1, 0)] = sin_omega_k;
        fd_r[(1, 1)] = cos_omega_k * cos_i_k;
        fd_r[(1, 2)] = x * cos_omega_k - y * sin_omega_k * cos_i_k;
        fd_r[(1, 3)] = -y * cos_omega_k * sin_i_k;
        fd_r[(2, 1)] = sin_i_k;
        fd_r[(2, 3)] = y * cos_i_k;
        let vel = fd_r * Vector4::new(fd_x, fd_y, fd_omega_k, fd_i_k);

        let (pos, vel) = if beidou_geo {
            // GEO elements are expressed in a frame tilted by 5° and
            // rotating with the earth
            let theta = -omega_e * t_k;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), 5.0_f64.to_radians());
            let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), theta);
            let fd_rz = -omega_e
                * Matrix3::new(
                    -sin_theta, -cos_theta, 0.0, cos_theta, -sin_theta, 0.0, 0.0, 0.0, 0.0,
                );
            let geo_pos = rz * rx * pos;
            let geo_vel = fd_rz * (rx * pos) + rz * rx * vel;
            (geo_pos, geo_vel)
        } else {
            (pos, vel)
        };

        let rel_corr = dtr_f * e * a.sqrt() * sin_e_k;

        Ok(Xvt {
            x: pos,
            v: vel,
            clk_bias: self.clock_bias(t),
            clk_drift: self.clock_drift(t),
            rel_corr,
            health: if self.healthy {
                SVHealth::Healthy
            } else {
                SVHealth::Unhealthy
            },
        })
    }
}

/// BeiDou geostationary satellites
pub(crate) fn is_beidou_geo(sv: SV) -> bool {
    sv.constellation == Constellation::BeiDou && (sv.prn <= 5 || sv.prn >= 59)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gnss_time::from_week_seconds;
    use hifitime::Duration;

    fn circular_gps(toe: Epoch) -> KeplerOrbit {
        let mut orbit = KeplerOrbit::new(toe);
        orbit.a = 26_559_710.0;
        orbit.i0 = 55.0_f64.to_radians();
        orbit.af0 = 1.0E-5;
        orbit.af1 = 1.0E-12;
        orbit
    }

    #[test]
    fn circular_orbit_radius() {
        let toe = from_week_seconds(2200, 7200.0, TimeScale::GPST);
        let orbit = circular_gps(toe);
        let sv = SV::new(Constellation::GPS, 1);
        for dt in [0.0, 900.0, 3600.0, 7200.0] {
            let t = toe + Duration::from_seconds(dt);
            let xvt = orbit.xvt(sv, t).unwrap();
            let radius = xvt.x.norm();
            assert!((radius - orbit.a).abs() < 1.0E-3, "radius {}", radius);
            // circular orbit: inertial speed is sqrt(mu/a), the earth
            // rotation makes the ECEF speed differ by less than 2 km/s
            let speed = xvt.v.norm();
            assert!(speed > 1_500.0 && speed < 6_000.0, "speed {}", speed);
            assert_eq!(xvt.rel_corr, 0.0);
            assert_eq!(xvt.health, SVHealth::Healthy);
        }
    }

    #[test]
    fn velocity_is_position_derivative() {
        let toe = from_week_seconds(2200, 0.0, TimeScale::GPST);
        let mut orbit = circular_gps(toe);
        orbit.ecc = 0.01;
        orbit.w = 0.3;
        orbit.omega0 = 1.2;
        orbit.omega_dot = -8.0E-9;
        orbit.idot = 1.0E-10;
        orbit.crs = 50.0;
        orbit.cuc = 1.0E-6;
        let sv = SV::new(Constellation::GPS, 12);
        let t = toe + Duration::from_seconds(1800.0);
        let h = 0.5;
        let before = orbit.xvt(sv, t - Duration::from_seconds(h)).unwrap();
        let after = orbit.xvt(sv, t + Duration::from_seconds(h)).unwrap();
        let now = orbit.xvt(sv, t).unwrap();
        let numerical = (after.x - before.x) / (2.0 * h);
        assert!((numerical - now.v).norm() < 1.0E-2);
    }

    #[test]
    fn clock_polynomial() {
        let toe = from_week_seconds(2200, 0.0, TimeScale::GPST);
        let orbit = circular_gps(toe);
        let t = toe + Duration::from_seconds(100.0);
        assert!((orbit.clock_bias(t) - (1.0E-5 + 1.0E-10)).abs() < 1.0E-15);
        assert_eq!(orbit.clock_drift(t), 1.0E-12);
    }

    #[test]
    fn glonass_is_not_keplerian() {
        let toe = from_week_seconds(2200, 0.0, TimeScale::GPST);
        let orbit = circular_gps(toe);
        let sv = SV::new(Constellation::Glonass, 1);
        assert_eq!(orbit.xvt(sv, toe), Err(OrbitError::Unsupported(sv)));
    }
}
