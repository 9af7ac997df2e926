//! Broadcast time system offsets
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    identity::NavType,
    navigation::{BdsHeader, LnavHeader},
    prelude::{Epoch, TimeScale},
};

/// Polynomial offset between two time systems, with the leap second
/// announcement for conversions involving UTC.
/// `t_tgt = t_src - offset(src, tgt, t_src)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StdTimeOffset {
    /// Message this was decoded from
    pub source: NavType,
    /// Source time system
    pub src: TimeScale,
    /// Target time system
    pub tgt: TimeScale,
    /// Bias (s)
    pub a0: f64,
    /// Drift (s/s)
    pub a1: f64,
    /// Drift rate (s/s²)
    pub a2: f64,
    /// Polynomial reference time
    pub ref_time: Epoch,
    /// Current leap seconds (s), 0 when neither system is UTC
    pub delta_t_ls: f64,
    /// Leap seconds after the announced event (s)
    pub delta_t_lsf: f64,
    /// Leap second effectivity time
    pub effectivity: Epoch,
    /// Week number of the leap second event
    pub wn_lsf: u32,
    /// Day number of the leap second event
    pub dn: u8,
    /// Reference second of week, as broadcast
    pub tot: f64,
    /// Preamble of the unit this was found in, when it has one
    pub preamble: u16,
}

impl StdTimeOffset {
    /// Offset (s) for a conversion `from` → `to` at `when` (expressed
    /// in `from`). None when this record does not relate both systems.
    pub fn offset(&self, from: TimeScale, to: TimeScale, when: Epoch) -> Option<f64> {
        let forward = from == self.src && to == self.tgt;
        let reverse = from == self.tgt && to == self.src;
        if !forward && !reverse {
            return None;
        }
        let dt = (when - self.ref_time).to_seconds();
        let mut leap = self.delta_t_ls;
        if (from == TimeScale::UTC || to == TimeScale::UTC) && when >= self.effectivity {
            leap = self.delta_t_lsf;
        }
        let offset = leap + self.a0 + self.a1 * dt + self.a2 * dt * dt;
        if reverse {
            Some(-offset)
        } else {
            Some(offset)
        }
    }

    fn validate(&self) -> bool {
        match self.source {
            NavType::GpsLnav | NavType::GpsCnavL2 | NavType::GpsCnavL5 => {
                self.preamble == 0 || self.preamble == LnavHeader::PREAMBLE as u16
            },
            NavType::GpsCnav2 => self.dn <= 7 && self.tot < 604_800.0,
            NavType::BdsD1 | NavType::BdsD2 => self.preamble == 0 || self.preamble == BdsHeader::PREAMBLE,
            _ => true,
        }
    }
}

/// Time offset record payloads
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeOffset {
    Std(StdTimeOffset),
}

impl TimeOffset {
    /// Message this was decoded from
    pub fn source(&self) -> NavType {
        match self {
            Self::Std(offset) => offset.source,
        }
    }

    /// Pair of time systems this relates
    pub fn systems(&self) -> (TimeScale, TimeScale) {
        match self {
            Self::Std(offset) => (offset.src, offset.tgt),
        }
    }

    /// See [StdTimeOffset::offset]
    pub fn offset(&self, from: TimeScale, to: TimeScale, when: Epoch) -> Option<f64> {
        match self {
            Self::Std(offset) => offset.offset(from, to, when),
        }
    }

    pub(crate) fn validate(&self) -> bool {
        match self {
            Self::Std(offset) => offset.validate(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::Duration;

    fn gps_utc() -> StdTimeOffset {
        let ref_time = Epoch::from_gregorian_at_midnight(2016, 12, 25, TimeScale::GPST);
        StdTimeOffset {
            source: NavType::GpsLnav,
            src: TimeScale::GPST,
            tgt: TimeScale::UTC,
            a0: 1.0E-9,
            a1: 1.0E-15,
            a2: 0.0,
            ref_time,
            delta_t_ls: 17.0,
            delta_t_lsf: 18.0,
            effectivity: Epoch::from_gregorian_at_midnight(2017, 1, 1, TimeScale::GPST),
            wn_lsf: 1929,
            dn: 1,
            tot: 0.0,
            preamble: 0x8b,
        }
    }

    #[test]
    fn leap_second_effectivity() {
        let offset = gps_utc();
        let before = offset.effectivity - Duration::from_seconds(60.0);
        let dt = (before - offset.ref_time).to_seconds();
        let value = offset.offset(TimeScale::GPST, TimeScale::UTC, before).unwrap();
        assert!((value - (17.0 + 1.0E-9 + 1.0E-15 * dt)).abs() < 1.0E-12);
        let after = offset.effectivity + Duration::from_seconds(60.0);
        let value = offset.offset(TimeScale::GPST, TimeScale::UTC, after).unwrap();
        assert!((value - 18.0).abs() < 1.0E-6);
    }

    #[test]
    fn reverse_conversion() {
        let offset = gps_utc();
        let when = offset.ref_time;
        let fwd = offset.offset(TimeScale::GPST, TimeScale::UTC, when).unwrap();
        let rev = offset.offset(TimeScale::UTC, TimeScale::GPST, when).unwrap();
        assert_eq!(fwd, -rev);
        assert!(offset.offset(TimeScale::GST, TimeScale::UTC, when).is_none());
    }

    #[test]
    fn cnav2_day_number() {
        let mut offset = gps_utc();
        offset.source = NavType::GpsCnav2;
        offset.preamble = 0;
        assert!(TimeOffset::Std(offset).validate());
        offset.dn = 8;
        assert!(!TimeOffset::Std(offset).validate());
        offset.dn = 7;
        offset.tot = 604_800.0;
        assert!(!TimeOffset::Std(offset).validate());
    }
}
