//! Navigation data model: decoded records and their payloads
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    identity::{NavMessageID, NavMessageType, NavSatelliteID, NavType},
    prelude::{Duration, Epoch, SV},
};

mod almanac;
mod ephemeris;
mod header;
mod health;
mod iono;
mod isc;
mod kepler;
mod time_offset;
mod validity;

pub use almanac::{Almanac, BdsD1Almanac, GalAlmanac, GloFnavAlmanac, GpsLnavAlmanac, GpsMidiAlmanac};
pub use ephemeris::{
    lnav_fit_hours, BdsD1Ephemeris, BdsD2Ephemeris, Ephemeris, GalFnavEphemeris, GalInavEphemeris,
    GloFnavEphemeris, GpsCnav2Ephemeris, GpsCnavEphemeris, GpsLnavEphemeris,
};
pub use header::{BdsHeader, CnavHeader, LnavHeader};
pub use health::{
    galileo_health, BdsD1Health, GalDataValidity, GalHealth, GalHealthStatus, GloFnavHealth,
    GpsCnavHealth, GpsLnavHealth, Health, SVHealth,
};
pub use iono::{Iono, KlobucharModel, NeQuickModel, NeQuickRegions};
pub use isc::{BdsD1Isc, GalIsc, GloFnavIsc, GpsCnav2Isc, GpsCnavIsc, GpsLnavIsc, Isc};
pub use kepler::{KeplerOrbit, OrbitError, Xvt};
pub use time_offset::{StdTimeOffset, TimeOffset};
pub use validity::{NavSearchOrder, NavValidityType, ValidityInterval};

pub(crate) use kepler::is_beidou_geo;

/// Payload of a [NavRecord]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NavData {
    Ephemeris(Ephemeris),
    Almanac(Almanac),
    Health(Health),
    Iono(Iono),
    Isc(Isc),
    TimeOffset(TimeOffset),
}

impl NavData {
    /// Kind of message this payload is
    pub fn kind(&self) -> NavMessageType {
        match self {
            Self::Ephemeris(_) => NavMessageType::Ephemeris,
            Self::Almanac(_) => NavMessageType::Almanac,
            Self::Health(_) => NavMessageType::Health,
            Self::Iono(_) => NavMessageType::Iono,
            Self::Isc(_) => NavMessageType::ISC,
            Self::TimeOffset(_) => NavMessageType::TimeOffset,
        }
    }
}

/// A decoded navigation message: who it is about, when it was
/// broadcast, how long it may be used, and what it says.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavRecord {
    /// Message identity
    pub id: NavMessageID,
    /// Transmit time of the first unit this was decoded from
    pub timestamp: Epoch,
    /// Fit interval, see [NavRecord::fix_fit]
    pub fit: ValidityInterval,
    /// Payload
    pub data: NavData,
}

impl NavRecord {
    /// Builds a new record. The message kind follows the payload,
    /// the fit interval is computed right away.
    pub fn new(sat: NavSatelliteID, timestamp: Epoch, data: NavData) -> Self {
        let mut record = Self {
            id: NavMessageID::new(sat, data.kind()),
            timestamp,
            fit: ValidityInterval::from(timestamp),
            data,
        };
        record.fit = record.fix_fit();
        record
    }

    /// Builds a new [Arc] wrapped record
    pub fn shared(sat: NavSatelliteID, timestamp: Epoch, data: NavData) -> Arc<Self> {
        Arc::new(Self::new(sat, timestamp, data))
    }

    /// Kind of message
    pub fn kind(&self) -> NavMessageType {
        self.id.kind
    }

    /// Navigation message type this was decoded from
    pub fn nav_type(&self) -> NavType {
        self.id.sat.signal.nav.exact().copied().unwrap_or_default()
    }

    /// Satellite the data applies to, when identified exactly
    pub fn sv(&self) -> Option<SV> {
        self.id.sat.sat.sv()
    }

    /// Satellite that broadcast the data, when identified exactly
    pub fn xmit_sv(&self) -> Option<SV> {
        self.id.sat.xmit_sat.sv()
    }

    /// Checks the record for internal consistency: preambles, flags and
    /// value ranges, depending on the message kind.
    pub fn validate(&self) -> bool {
        match &self.data {
            NavData::Ephemeris(eph) => eph.validate(),
            NavData::Almanac(alm) => alm.validate(),
            NavData::Health(health) => health.validate(),
            NavData::Iono(iono) => iono.validate(),
            NavData::Isc(isc) => isc.validate(),
            NavData::TimeOffset(offset) => offset.validate(),
        }
    }

    /// Earliest time a receiver could have collected the complete
    /// message: the end of transmission of its last unit.
    pub fn user_time(&self) -> Epoch {
        let nav = self.nav_type();
        match &self.data {
            NavData::Ephemeris(eph) => eph.user_time(nav),
            NavData::Almanac(alm) => alm.user_time(nav),
            NavData::Isc(isc) => isc
                .user_time()
                .unwrap_or_else(|| self.timestamp + unit_duration(nav, self.kind())),
            _ => self.timestamp + unit_duration(nav, self.kind()),
        }
    }

    /// Computes the fit interval: the period over which the data
    /// may be used. Data that does not expire is valid from its user time.
    pub fn fix_fit(&self) -> ValidityInterval {
        match &self.data {
            NavData::Ephemeris(eph) => eph.fix_fit(),
            NavData::Almanac(alm) => alm.fix_fit(),
            _ => ValidityInterval::from(self.user_time()),
        }
    }

    /// True when `t` lies within the fit interval
    pub fn is_fit(&self, t: Epoch) -> bool {
        self.fit.contains(t)
    }

    /// Evaluates the satellite state at `t`, for orbit records
    pub fn xvt(&self, t: Epoch) -> Result<Xvt, OrbitError> {
        let sv = self.sv().ok_or(OrbitError::UnknownSatellite)?;
        match &self.data {
            NavData::Ephemeris(eph) => eph.xvt(sv, t),
            NavData::Almanac(alm) => alm.xvt(sv, t),
            _ => Err(OrbitError::NoOrbit),
        }
    }

    /// Health advertised by this record, for health and orbit records
    pub fn health(&self) -> Option<SVHealth> {
        match &self.data {
            NavData::Health(health) => Some(health.health()),
            NavData::Almanac(alm) => Some(alm.health()),
            NavData::Ephemeris(Ephemeris::GloFnav(eph)) => Some(eph.xvt(eph.toe).health),
            NavData::Ephemeris(eph) => eph.kepler().map(|orbit| {
                if orbit.healthy {
                    SVHealth::Healthy
                } else {
                    SVHealth::Unhealthy
                }
            }),
            _ => None,
        }
    }

    pub fn as_ephemeris(&self) -> Option<&Ephemeris> {
        match &self.data {
            NavData::Ephemeris(eph) => Some(eph),
            _ => None,
        }
    }

    pub fn as_almanac(&self) -> Option<&Almanac> {
        match &self.data {
            NavData::Almanac(alm) => Some(alm),
            _ => None,
        }
    }

    pub fn as_health(&self) -> Option<&Health> {
        match &self.data {
            NavData::Health(health) => Some(health),
            _ => None,
        }
    }

    pub fn as_iono(&self) -> Option<&Iono> {
        match &self.data {
            NavData::Iono(iono) => Some(iono),
            _ => None,
        }
    }

    pub fn as_isc(&self) -> Option<&Isc> {
        match &self.data {
            NavData::Isc(isc) => Some(isc),
            _ => None,
        }
    }

    pub fn as_time_offset(&self) -> Option<&TimeOffset> {
        match &self.data {
            NavData::TimeOffset(offset) => Some(offset),
            _ => None,
        }
    }
}

impl std::fmt::Display for NavRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} xmit {} user {} fit {}",
            self.kind(),
            self.id.sat,
            self.timestamp,
            self.user_time(),
            self.fit
        )
    }
}

/// Duration of the unit that completes a message, per message type
fn unit_duration(nav: NavType, kind: NavMessageType) -> Duration {
    let seconds = match nav {
        NavType::GpsLnav => 6.0,
        NavType::GpsCnavL2 => 12.0,
        NavType::GpsCnavL5 => 6.0,
        NavType::GpsCnav2 => match kind {
            // subframe 2
            NavMessageType::Ephemeris | NavMessageType::Health => 12.0,
            // subframe 3
            _ => 5.48,
        },
        NavType::GalInav => 2.0,
        NavType::GalFnav => 10.0,
        NavType::BdsD1 => 6.0,
        NavType::BdsD2 => 0.6,
        NavType::GloFnav => 2.0,
        NavType::Unknown => 0.0,
    };
    Duration::from_seconds(seconds)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        identity::NavSignalID,
        prelude::{Constellation, TimeScale},
    };

    fn lnav_health(preamble: u8, bits: u8) -> NavRecord {
        let sv = SV::new(Constellation::GPS, 7);
        let t = Epoch::from_gregorian_at_midnight(2024, 5, 1, TimeScale::GPST);
        NavRecord::new(
            NavSatelliteID::own(sv, NavSignalID::gps_lnav()),
            t,
            NavData::Health(Health::GpsLnav(GpsLnavHealth {
                header: LnavHeader {
                    preamble,
                    subframe: 1,
                    ..Default::default()
                },
                bits,
            })),
        )
    }

    #[test]
    fn envelope() {
        let record = lnav_health(0x8b, 0);
        assert_eq!(record.kind(), NavMessageType::Health);
        assert_eq!(record.nav_type(), NavType::GpsLnav);
        assert!(record.validate());
        assert_eq!(
            record.user_time(),
            record.timestamp + Duration::from_seconds(6.0)
        );
        assert_eq!(record.fit.begin, record.user_time());
        assert_eq!(record.fit.end, None);
        assert_eq!(record.health(), Some(SVHealth::Healthy));
        assert_eq!(record.xvt(record.timestamp), Err(OrbitError::NoOrbit));
        assert!(!lnav_health(0x8c, 0).validate());
        assert_eq!(lnav_health(0x8b, 0x3f).health(), Some(SVHealth::Unhealthy));
    }

    #[test]
    fn cnav2_subframe_durations() {
        assert_eq!(
            unit_duration(NavType::GpsCnav2, NavMessageType::Health),
            Duration::from_seconds(12.0)
        );
        assert_eq!(
            unit_duration(NavType::GpsCnav2, NavMessageType::Iono),
            Duration::from_seconds(5.48)
        );
    }
}
