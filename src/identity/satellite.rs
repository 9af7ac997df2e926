use gnss_rs::prelude::SV;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{NavSignalID, WildSatID};

/// [NavSatelliteID] identifies the satellite a message describes
/// (the subject), the satellite that transmitted it, and the signal
/// it was transmitted on. Subject and transmitter only differ for
/// constellation-wide data like almanacs.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavSatelliteID {
    /// Satellite the data applies to
    pub sat: WildSatID,
    /// Satellite that broadcast the data
    pub xmit_sat: WildSatID,
    /// Signal the data was broadcast on
    pub signal: NavSignalID,
}

impl NavSatelliteID {
    /// Data about `sat`, broadcast by `xmit`
    pub fn new(sat: SV, xmit: SV, signal: NavSignalID) -> Self {
        Self {
            sat: WildSatID::exact(sat),
            xmit_sat: WildSatID::exact(xmit),
            signal,
        }
    }
    /// Data a satellite broadcast about itself
    pub fn own(sv: SV, signal: NavSignalID) -> Self {
        Self::new(sv, sv, signal)
    }
    /// Query pattern: any transmitter
    pub fn pattern(sat: WildSatID, signal: NavSignalID) -> Self {
        Self {
            sat,
            xmit_sat: WildSatID::any(),
            signal,
        }
    }
    /// Matches anything
    pub fn any() -> Self {
        Self::default()
    }
    /// Wildcard aware equality
    pub fn matches(&self, rhs: &Self) -> bool {
        self.sat.matches(&rhs.sat)
            && self.xmit_sat.matches(&rhs.xmit_sat)
            && self.signal.matches(&rhs.signal)
    }
}

impl std::fmt::Display for NavSatelliteID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} (from {}) {}", self.sat, self.xmit_sat, self.signal)
    }
}
