//! Signal, satellite and message identities.
//!
//! Every identity field may be either an exact value or a wildcard
//! ([Wild::Any]). Wildcards are what queries use to say "any satellite",
//! "any constellation" or "any tracking code". Stored records always
//! carry exact identities.
use gnss_rs::prelude::{Constellation, SV};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod message;
mod satellite;
mod signal;

pub use message::{NavMessageID, NavMessageType, NavMessageTypes};
pub use satellite::NavSatelliteID;
pub use signal::{CarrierBand, NavSignalID, NavType, TrackingCode};

/// [Wild] is an explicit optional-match: either any value matches,
/// or only the exact one does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Wild<T> {
    /// Matches any value
    Any,
    /// Matches this value only
    Exact(T),
}

impl<T> Default for Wild<T> {
    fn default() -> Self {
        Self::Any
    }
}

impl<T> From<T> for Wild<T> {
    fn from(value: T) -> Self {
        Self::Exact(value)
    }
}

impl<T: PartialEq> Wild<T> {
    /// True when either side is a wildcard, or both values are equal.
    pub fn matches(&self, rhs: &Self) -> bool {
        match (self, rhs) {
            (Self::Exact(lhs), Self::Exact(rhs)) => lhs == rhs,
            _ => true,
        }
    }
    /// True when `value` satisfies this pattern.
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(v) => v == value,
        }
    }
}

impl<T> Wild<T> {
    pub fn is_wild(&self) -> bool {
        matches!(self, Self::Any)
    }
    /// Unwraps the exact value, if any
    pub fn exact(&self) -> Option<&T> {
        match self {
            Self::Exact(v) => Some(v),
            Self::Any => None,
        }
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Wild<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// [WildSatID] identifies one satellite, or a family of satellites
/// when either field is a wildcard.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WildSatID {
    /// Constellation
    pub system: Wild<Constellation>,
    /// PRN number
    pub prn: Wild<u8>,
}

impl WildSatID {
    /// Exactly this satellite
    pub fn exact(sv: SV) -> Self {
        Self {
            system: Wild::Exact(sv.constellation),
            prn: Wild::Exact(sv.prn),
        }
    }
    /// Any satellite of this constellation
    pub fn any_prn(system: Constellation) -> Self {
        Self {
            system: Wild::Exact(system),
            prn: Wild::Any,
        }
    }
    /// This PRN number, in any constellation
    pub fn any_system(prn: u8) -> Self {
        Self {
            system: Wild::Any,
            prn: Wild::Exact(prn),
        }
    }
    /// Any satellite
    pub fn any() -> Self {
        Self::default()
    }
    /// Wildcard aware equality
    pub fn matches(&self, rhs: &Self) -> bool {
        self.system.matches(&rhs.system) && self.prn.matches(&rhs.prn)
    }
    /// Returns the [SV] this identifies, when it is fully determined
    pub fn sv(&self) -> Option<SV> {
        match (self.system, self.prn) {
            (Wild::Exact(c), Wild::Exact(prn)) => Some(SV::new(c, prn)),
            _ => None,
        }
    }
}

impl From<SV> for WildSatID {
    fn from(sv: SV) -> Self {
        Self::exact(sv)
    }
}

impl std::fmt::Display for WildSatID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.sv() {
            Some(sv) => write!(f, "{}", sv),
            None => write!(f, "{}:{}", self.system, self.prn),
        }
    }
}
