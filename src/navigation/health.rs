//! Satellite health
use std::{convert::Infallible, str::FromStr};

use num_derive::FromPrimitive;
use strum_macros::EnumIter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{BdsHeader, CnavHeader, LnavHeader};

/// Satellite health, reduced to what a user needs to know
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SVHealth {
    #[default]
    Unknown,
    /// Any health status. Only meaningful as a query filter.
    Any,
    /// Usable
    Healthy,
    /// Not usable
    Unhealthy,
    /// Usable at the user's own risk
    Degraded,
}

impl std::fmt::Display for SVHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Any => write!(f, "Any"),
            Self::Healthy => write!(f, "Healthy"),
            Self::Unhealthy => write!(f, "Unhealthy"),
            Self::Degraded => write!(f, "Degraded"),
        }
    }
}

impl FromStr for SVHealth {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_lowercase();
        Ok(match c.as_str() {
            "any" => Self::Any,
            "healthy" => Self::Healthy,
            "unhealthy" => Self::Unhealthy,
            "degraded" => Self::Degraded,
            _ => Self::Unknown,
        })
    }
}

/// Galileo signal health status (2 bits)
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GalHealthStatus {
    /// Signal OK
    #[default]
    OK = 0,
    /// Signal out of service
    OutOfService = 1,
    /// Signal will be out of service
    WillBeOOS = 2,
    /// Signal component currently in test
    InTest = 3,
}

/// Galileo data validity status (1 bit)
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GalDataValidity {
    /// Navigation data valid
    #[default]
    Valid = 0,
    /// Working without guarantee
    NoGuarantee = 1,
}

/// Reduces Galileo status flags to [SVHealth], following the
/// Galileo OS-SDD service definitions. A SISA index of 255 is
/// "No Accuracy Prediction Available".
pub fn galileo_health(status: GalHealthStatus, dvs: GalDataValidity, sisa: u8) -> SVHealth {
    match status {
        GalHealthStatus::OutOfService | GalHealthStatus::InTest => SVHealth::Unhealthy,
        GalHealthStatus::WillBeOOS => SVHealth::Degraded,
        GalHealthStatus::OK => match dvs {
            GalDataValidity::NoGuarantee => SVHealth::Degraded,
            GalDataValidity::Valid => {
                if sisa == 255 {
                    SVHealth::Degraded
                } else {
                    SVHealth::Healthy
                }
            },
        },
    }
}

/// GPS LNAV health: the 6 bit (subframe 1, pages 25 & 63) or
/// 8 bit (almanac pages) health word.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsLnavHealth {
    /// Header of the subframe this was found in
    pub header: LnavHeader,
    /// Raw health bits
    pub bits: u8,
}

/// GPS CNAV and CNAV-2 health: one bit per signal.
/// The signal this applies to is the record's signal.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsCnavHealth {
    /// Message header, CNAV only
    pub header: Option<CnavHeader>,
    /// True when the signal is flagged unhealthy
    pub unhealthy: bool,
}

/// Galileo I/NAV and F/NAV health, for one signal.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GalHealth {
    /// Signal health status
    pub status: GalHealthStatus,
    /// Data validity status
    pub dvs: GalDataValidity,
    /// Signal In Space Accuracy index, when known
    pub sisa: u8,
}

/// BeiDou D1 and D2 autonomous satellite health (SatH1)
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BdsD1Health {
    /// Header of the subframe this was found in
    pub header: BdsHeader,
    /// SatH1 flag: true means unhealthy
    pub sat_h1: bool,
}

/// GLONASS health indicators. Each of them is optional
/// because they are not broadcast in the same string.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GloFnavHealth {
    /// Bn health word (string 2, 3 bits)
    pub bn: Option<u8>,
    /// ln flag (strings 3 and 5)
    pub ln: Option<bool>,
    /// Cn flag (almanac strings)
    pub cn: Option<bool>,
}

impl GloFnavHealth {
    fn health(&self) -> SVHealth {
        if self.bn.is_none() && self.ln.is_none() && self.cn.is_none() {
            return SVHealth::Unknown;
        }
        let bn_bad = self.bn.map(|bn| bn & 0x04 > 0).unwrap_or(false);
        let ln_bad = self.ln.unwrap_or(false);
        let cn_bad = self.cn.map(|cn| !cn).unwrap_or(false);
        if bn_bad || ln_bad || cn_bad {
            SVHealth::Unhealthy
        } else {
            SVHealth::Healthy
        }
    }
}

/// Health record payloads
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Health {
    GpsLnav(GpsLnavHealth),
    GpsCnav(GpsCnavHealth),
    GpsCnav2(GpsCnavHealth),
    GalInav(GalHealth),
    GalFnav(GalHealth),
    BdsD1(BdsD1Health),
    BdsD2(BdsD1Health),
    GloFnav(GloFnavHealth),
}

impl Health {
    /// Reduces this record to a [SVHealth]
    pub fn health(&self) -> SVHealth {
        match self {
            Self::GpsLnav(h) => {
                if h.bits == 0 {
                    SVHealth::Healthy
                } else {
                    SVHealth::Unhealthy
                }
            },
            Self::GpsCnav(h) | Self::GpsCnav2(h) => {
                if h.unhealthy {
                    SVHealth::Unhealthy
                } else {
                    SVHealth::Healthy
                }
            },
            Self::GalInav(h) | Self::GalFnav(h) => galileo_health(h.status, h.dvs, h.sisa),
            Self::BdsD1(h) | Self::BdsD2(h) => {
                if h.sat_h1 {
                    SVHealth::Unhealthy
                } else {
                    SVHealth::Healthy
                }
            },
            Self::GloFnav(h) => h.health(),
        }
    }
    pub(crate) fn validate(&self) -> bool {
        match self {
            Self::GpsLnav(h) => h.header.validate(),
            Self::GpsCnav(h) => h.header.map(|hd| hd.validate()).unwrap_or(true),
            Self::GpsCnav2(_) | Self::GalInav(_) | Self::GalFnav(_) => true,
            Self::BdsD1(h) | Self::BdsD2(h) => h.header.validate(),
            Self::GloFnav(h) => h.bn.is_some() || h.ln.is_some() || h.cn.is_some(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;
    #[test]
    fn health_strings() {
        for health in SVHealth::iter() {
            let s = health.to_string();
            assert_eq!(SVHealth::from_str(&s).unwrap(), health);
            if health != SVHealth::Unknown {
                assert_ne!(s, "Unknown");
            }
        }
        assert_eq!(SVHealth::from_str("garbage").unwrap(), SVHealth::Unknown);
        assert_eq!(SVHealth::from_str(" HEALTHY ").unwrap(), SVHealth::Healthy);
    }
    #[test]
    fn galileo_reduction() {
        use GalDataValidity::*;
        use GalHealthStatus::*;
        assert_eq!(galileo_health(OK, Valid, 107), SVHealth::Healthy);
        assert_eq!(galileo_health(OK, Valid, 255), SVHealth::Degraded);
        assert_eq!(galileo_health(OK, NoGuarantee, 107), SVHealth::Degraded);
        assert_eq!(galileo_health(OutOfService, Valid, 107), SVHealth::Unhealthy);
        assert_eq!(galileo_health(InTest, Valid, 107), SVHealth::Unhealthy);
        assert_eq!(galileo_health(WillBeOOS, Valid, 107), SVHealth::Degraded);
    }
    #[test]
    fn glonass_reduction() {
        let h = GloFnavHealth::default();
        assert_eq!(h.health(), SVHealth::Unknown);
        assert!(!Health::GloFnav(h).validate());
        let h = GloFnavHealth {
            bn: Some(0),
            ln: Some(false),
            cn: None,
        };
        assert_eq!(h.health(), SVHealth::Healthy);
        let h = GloFnavHealth {
            bn: Some(0x04),
            ..Default::default()
        };
        assert_eq!(h.health(), SVHealth::Unhealthy);
        let h = GloFnavHealth {
            cn: Some(false),
            ..Default::default()
        };
        assert_eq!(h.health(), SVHealth::Unhealthy);
    }
}
