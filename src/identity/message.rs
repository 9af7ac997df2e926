use std::{convert::Infallible, str::FromStr};

use bitflags::bitflags;
use strum_macros::EnumIter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::NavSatelliteID;

/// Kind of navigation data a record carries
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NavMessageType {
    #[default]
    Unknown,
    /// Coarse, long validity orbits
    Almanac,
    /// Precise, short validity orbits and clock
    Ephemeris,
    /// Time system conversion
    TimeOffset,
    /// Satellite / signal health
    Health,
    /// Satellite clock only
    Clock,
    /// Ionospheric model
    Iono,
    /// Inter signal corrections
    ISC,
}

impl NavMessageType {
    /// Converts to the matching [NavMessageTypes] flag
    pub fn flag(&self) -> NavMessageTypes {
        match self {
            Self::Almanac => NavMessageTypes::ALMANAC,
            Self::Ephemeris => NavMessageTypes::EPHEMERIS,
            Self::TimeOffset => NavMessageTypes::TIME_OFFSET,
            Self::Health => NavMessageTypes::HEALTH,
            Self::Clock => NavMessageTypes::CLOCK,
            Self::Iono => NavMessageTypes::IONO,
            Self::ISC => NavMessageTypes::ISC,
            Self::Unknown => NavMessageTypes::empty(),
        }
    }
}

impl std::fmt::Display for NavMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Almanac => write!(f, "Almanac"),
            Self::Ephemeris => write!(f, "Ephemeris"),
            Self::TimeOffset => write!(f, "TimeOffset"),
            Self::Health => write!(f, "Health"),
            Self::Clock => write!(f, "Clock"),
            Self::Iono => write!(f, "Iono"),
            Self::ISC => write!(f, "ISC"),
        }
    }
}

impl FromStr for NavMessageType {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_lowercase();
        Ok(match c.as_str() {
            "almanac" => Self::Almanac,
            "ephemeris" => Self::Ephemeris,
            "timeoffset" => Self::TimeOffset,
            "health" => Self::Health,
            "clock" => Self::Clock,
            "iono" => Self::Iono,
            "isc" => Self::ISC,
            _ => Self::Unknown,
        })
    }
}

bitflags! {
    /// Set of [NavMessageType]s, used as type filter.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct NavMessageTypes: u8 {
        const ALMANAC = 0x01;
        const EPHEMERIS = 0x02;
        const TIME_OFFSET = 0x04;
        const HEALTH = 0x08;
        const CLOCK = 0x10;
        const IONO = 0x20;
        const ISC = 0x40;
    }
}

impl Default for NavMessageTypes {
    fn default() -> Self {
        Self::all()
    }
}

impl NavMessageTypes {
    /// True if this set retains `kind`
    pub fn retains(&self, kind: NavMessageType) -> bool {
        let flag = kind.flag();
        !flag.is_empty() && self.contains(flag)
    }
}

impl FromIterator<NavMessageType> for NavMessageTypes {
    fn from_iter<I: IntoIterator<Item = NavMessageType>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, kind| set | kind.flag())
    }
}

/// [NavMessageID] fully identifies one ledger of the store:
/// satellite, signal and kind of data.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavMessageID {
    /// Satellite and signal
    pub sat: NavSatelliteID,
    /// Kind of data
    pub kind: NavMessageType,
}

impl NavMessageID {
    pub fn new(sat: NavSatelliteID, kind: NavMessageType) -> Self {
        Self { sat, kind }
    }
    /// Wildcard aware equality. The kind is never a wildcard.
    pub fn matches(&self, rhs: &Self) -> bool {
        self.kind == rhs.kind && self.sat.matches(&rhs.sat)
    }
}

impl std::fmt::Display for NavMessageID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.sat)
    }
}
