//! Signal identity: system, carrier, tracking code and message format.
use std::{convert::Infallible, str::FromStr};

use gnss_rs::prelude::Constellation;
use strum_macros::EnumIter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Wild;

/// Physical carrier band a navigation message is modulated on
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CarrierBand {
    #[default]
    Unknown,
    /// GPS/QZSS L1, Galileo E1
    L1,
    /// GPS L2
    L2,
    /// GPS L5, Galileo E5a
    L5,
    /// Galileo E5b
    E5b,
    /// Galileo E6
    E6,
    /// BeiDou B1I
    B1,
    /// BeiDou B2I
    B2,
    /// BeiDou B3I
    B3,
    /// GLONASS L1 (FDMA)
    G1,
    /// GLONASS L2 (FDMA)
    G2,
}

impl CarrierBand {
    /// Nominal carrier frequency in Hz.
    /// GLONASS FDMA bands report the channel 0 frequency.
    pub fn frequency(&self) -> Option<f64> {
        match self {
            Self::L1 => Some(1575.42E6),
            Self::L2 => Some(1227.60E6),
            Self::L5 => Some(1176.45E6),
            Self::E5b | Self::B2 => Some(1207.14E6),
            Self::E6 => Some(1278.75E6),
            Self::B1 => Some(1561.098E6),
            Self::B3 => Some(1268.52E6),
            Self::G1 => Some(1602.0E6),
            Self::G2 => Some(1246.0E6),
            Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for CarrierBand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::L1 => write!(f, "L1"),
            Self::L2 => write!(f, "L2"),
            Self::L5 => write!(f, "L5"),
            Self::E5b => write!(f, "E5b"),
            Self::E6 => write!(f, "E6"),
            Self::B1 => write!(f, "B1"),
            Self::B2 => write!(f, "B2"),
            Self::B3 => write!(f, "B3"),
            Self::G1 => write!(f, "G1"),
            Self::G2 => write!(f, "G2"),
        }
    }
}

impl FromStr for CarrierBand {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_lowercase();
        Ok(match c.as_str() {
            "l1" | "e1" => Self::L1,
            "l2" => Self::L2,
            "l5" | "e5a" => Self::L5,
            "e5b" => Self::E5b,
            "e6" => Self::E6,
            "b1" | "b1i" => Self::B1,
            "b2" | "b2i" => Self::B2,
            "b3" | "b3i" => Self::B3,
            "g1" => Self::G1,
            "g2" => Self::G2,
            _ => Self::Unknown,
        })
    }
}

/// Ranging code a navigation message is carried by
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrackingCode {
    #[default]
    Unknown,
    /// GPS civilian C/A
    CA,
    /// GPS L2C medium
    L2CM,
    /// GPS L2C long
    L2CL,
    /// GPS L5 in phase
    L5I,
    /// GPS L5 quadrature
    L5Q,
    /// GPS L1C data
    L1CD,
    /// GPS L1C pilot
    L1CP,
    /// Galileo E1 data
    E1B,
    /// Galileo E1 pilot
    E1C,
    /// Galileo E5a data
    E5aI,
    /// Galileo E5b data
    E5bI,
    /// BeiDou B1I
    B1I,
    /// BeiDou B2I
    B2I,
    /// BeiDou B3I
    B3I,
    /// GLONASS standard accuracy C/A
    Standard,
}

impl std::fmt::Display for TrackingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::CA => write!(f, "C/A"),
            Self::L2CM => write!(f, "L2CM"),
            Self::L2CL => write!(f, "L2CL"),
            Self::L5I => write!(f, "L5I"),
            Self::L5Q => write!(f, "L5Q"),
            Self::L1CD => write!(f, "L1CD"),
            Self::L1CP => write!(f, "L1CP"),
            Self::E1B => write!(f, "E1B"),
            Self::E1C => write!(f, "E1C"),
            Self::E5aI => write!(f, "E5aI"),
            Self::E5bI => write!(f, "E5bI"),
            Self::B1I => write!(f, "B1I"),
            Self::B2I => write!(f, "B2I"),
            Self::B3I => write!(f, "B3I"),
            Self::Standard => write!(f, "Standard"),
        }
    }
}

impl FromStr for TrackingCode {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_lowercase();
        Ok(match c.as_str() {
            "c/a" | "ca" => Self::CA,
            "l2cm" => Self::L2CM,
            "l2cl" => Self::L2CL,
            "l5i" => Self::L5I,
            "l5q" => Self::L5Q,
            "l1cd" => Self::L1CD,
            "l1cp" => Self::L1CP,
            "e1b" => Self::E1B,
            "e1c" => Self::E1C,
            "e5ai" => Self::E5aI,
            "e5bi" => Self::E5bI,
            "b1i" => Self::B1I,
            "b2i" => Self::B2I,
            "b3i" => Self::B3I,
            "standard" => Self::Standard,
            _ => Self::Unknown,
        })
    }
}

/// Navigation message format
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NavType {
    #[default]
    Unknown,
    /// GPS legacy navigation message (L1 C/A)
    GpsLnav,
    /// GPS civil navigation message on L2C
    GpsCnavL2,
    /// GPS civil navigation message on L5
    GpsCnavL5,
    /// GPS L1C navigation message
    GpsCnav2,
    /// Galileo integrity message (E1-B, E5b-I)
    GalInav,
    /// Galileo freely accessible message (E5a-I)
    GalFnav,
    /// BeiDou D1 message (MEO/IGSO)
    BdsD1,
    /// BeiDou D2 message (GEO)
    BdsD2,
    /// GLONASS civil FDMA message
    GloFnav,
}

impl std::fmt::Display for NavType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::GpsLnav => write!(f, "GPS-LNAV"),
            Self::GpsCnavL2 => write!(f, "GPS-CNAV-L2"),
            Self::GpsCnavL5 => write!(f, "GPS-CNAV-L5"),
            Self::GpsCnav2 => write!(f, "GPS-CNAV2"),
            Self::GalInav => write!(f, "GAL-INAV"),
            Self::GalFnav => write!(f, "GAL-FNAV"),
            Self::BdsD1 => write!(f, "BDS-D1"),
            Self::BdsD2 => write!(f, "BDS-D2"),
            Self::GloFnav => write!(f, "GLO-FNAV"),
        }
    }
}

impl FromStr for NavType {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = s.trim().to_uppercase();
        Ok(match c.as_str() {
            "GPS-LNAV" | "LNAV" => Self::GpsLnav,
            "GPS-CNAV-L2" => Self::GpsCnavL2,
            "GPS-CNAV-L5" => Self::GpsCnavL5,
            "GPS-CNAV2" | "CNV2" => Self::GpsCnav2,
            "GAL-INAV" | "INAV" => Self::GalInav,
            "GAL-FNAV" | "FNAV" => Self::GalFnav,
            "BDS-D1" | "D1" => Self::BdsD1,
            "BDS-D2" | "D2" => Self::BdsD2,
            "GLO-FNAV" | "FDMA" => Self::GloFnav,
            _ => Self::Unknown,
        })
    }
}

/// [NavSignalID] identifies the signal a message was broadcast on.
/// It is the routing key for decoders, and half of the store keys.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavSignalID {
    /// Satellite system
    pub system: Wild<Constellation>,
    /// Carrier band
    pub carrier: Wild<CarrierBand>,
    /// Ranging code
    pub code: Wild<TrackingCode>,
    /// Message format
    pub nav: Wild<NavType>,
}

impl NavSignalID {
    /// Fully determined signal
    pub fn new(
        system: Constellation,
        carrier: CarrierBand,
        code: TrackingCode,
        nav: NavType,
    ) -> Self {
        Self {
            system: Wild::Exact(system),
            carrier: Wild::Exact(carrier),
            code: Wild::Exact(code),
            nav: Wild::Exact(nav),
        }
    }
    /// Matches any signal
    pub fn any() -> Self {
        Self::default()
    }
    /// Any signal carrying this message format
    pub fn any_of(nav: NavType) -> Self {
        Self {
            nav: Wild::Exact(nav),
            ..Default::default()
        }
    }
    /// GPS LNAV on L1 C/A
    pub fn gps_lnav() -> Self {
        Self::new(
            Constellation::GPS,
            CarrierBand::L1,
            TrackingCode::CA,
            NavType::GpsLnav,
        )
    }
    /// GPS CNAV on L2C (the message rides L2CM)
    pub fn gps_cnav_l2() -> Self {
        Self::new(
            Constellation::GPS,
            CarrierBand::L2,
            TrackingCode::L2CM,
            NavType::GpsCnavL2,
        )
    }
    /// GPS CNAV on L5-I
    pub fn gps_cnav_l5() -> Self {
        Self::new(
            Constellation::GPS,
            CarrierBand::L5,
            TrackingCode::L5I,
            NavType::GpsCnavL5,
        )
    }
    /// GPS CNAV-2 on L1C-D
    pub fn gps_cnav2() -> Self {
        Self::new(
            Constellation::GPS,
            CarrierBand::L1,
            TrackingCode::L1CD,
            NavType::GpsCnav2,
        )
    }
    /// Galileo I/NAV on E1-B
    pub fn gal_inav_e1b() -> Self {
        Self::new(
            Constellation::Galileo,
            CarrierBand::L1,
            TrackingCode::E1B,
            NavType::GalInav,
        )
    }
    /// Galileo I/NAV on E5b-I
    pub fn gal_inav_e5b() -> Self {
        Self::new(
            Constellation::Galileo,
            CarrierBand::E5b,
            TrackingCode::E5bI,
            NavType::GalInav,
        )
    }
    /// Galileo F/NAV on E5a-I
    pub fn gal_fnav() -> Self {
        Self::new(
            Constellation::Galileo,
            CarrierBand::L5,
            TrackingCode::E5aI,
            NavType::GalFnav,
        )
    }
    /// BeiDou D1 on B1I
    pub fn bds_d1_b1() -> Self {
        Self::new(
            Constellation::BeiDou,
            CarrierBand::B1,
            TrackingCode::B1I,
            NavType::BdsD1,
        )
    }
    /// BeiDou D1 on B2I
    pub fn bds_d1_b2() -> Self {
        Self::new(
            Constellation::BeiDou,
            CarrierBand::B2,
            TrackingCode::B2I,
            NavType::BdsD1,
        )
    }
    /// BeiDou D1 on B3I
    pub fn bds_d1_b3() -> Self {
        Self::new(
            Constellation::BeiDou,
            CarrierBand::B3,
            TrackingCode::B3I,
            NavType::BdsD1,
        )
    }
    /// BeiDou D2 on B1I
    pub fn bds_d2_b1() -> Self {
        Self::new(
            Constellation::BeiDou,
            CarrierBand::B1,
            TrackingCode::B1I,
            NavType::BdsD2,
        )
    }
    /// BeiDou D2 on B2I
    pub fn bds_d2_b2() -> Self {
        Self::new(
            Constellation::BeiDou,
            CarrierBand::B2,
            TrackingCode::B2I,
            NavType::BdsD2,
        )
    }
    /// BeiDou D2 on B3I
    pub fn bds_d2_b3() -> Self {
        Self::new(
            Constellation::BeiDou,
            CarrierBand::B3,
            TrackingCode::B3I,
            NavType::BdsD2,
        )
    }
    /// GLONASS civil message on G1
    pub fn glo_fnav_g1() -> Self {
        Self::new(
            Constellation::Glonass,
            CarrierBand::G1,
            TrackingCode::Standard,
            NavType::GloFnav,
        )
    }
    /// GLONASS civil message on G2
    pub fn glo_fnav_g2() -> Self {
        Self::new(
            Constellation::Glonass,
            CarrierBand::G2,
            TrackingCode::Standard,
            NavType::GloFnav,
        )
    }
    /// Wildcard aware equality
    pub fn matches(&self, rhs: &Self) -> bool {
        self.system.matches(&rhs.system)
            && self.carrier.matches(&rhs.carrier)
            && self.code.matches(&rhs.code)
            && self.nav.matches(&rhs.nav)
    }
    /// True when no field is a wildcard
    pub fn is_exact(&self) -> bool {
        !self.system.is_wild()
            && !self.carrier.is_wild()
            && !self.code.is_wild()
            && !self.nav.is_wild()
    }
}

impl std::fmt::Display for NavSignalID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {} {} {}", self.system, self.carrier, self.code, self.nav)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;
    #[test]
    fn carrier_strings() {
        for band in CarrierBand::iter() {
            let s = band.to_string();
            assert_eq!(CarrierBand::from_str(&s).unwrap(), band);
            if band != CarrierBand::Unknown {
                assert_ne!(s, "Unknown");
                assert!(band.frequency().is_some());
            }
        }
        assert_eq!(CarrierBand::from_str("E1").unwrap(), CarrierBand::L1);
        assert_eq!(CarrierBand::from_str("L9").unwrap(), CarrierBand::Unknown);
    }
    #[test]
    fn code_strings() {
        for code in TrackingCode::iter() {
            let s = code.to_string();
            assert_eq!(TrackingCode::from_str(&s).unwrap(), code);
            if code != TrackingCode::Unknown {
                assert_ne!(s, "Unknown");
            }
        }
    }
    #[test]
    fn nav_type_strings() {
        for nav in NavType::iter() {
            let s = nav.to_string();
            assert_eq!(NavType::from_str(&s).unwrap(), nav);
            if nav != NavType::Unknown {
                assert_ne!(s, "Unknown");
            }
        }
        assert_eq!(NavType::from_str("gps-lnav").unwrap(), NavType::GpsLnav);
        assert_eq!(NavType::from_str("nonsense").unwrap(), NavType::Unknown);
    }
    #[test]
    fn signal_matching() {
        let lnav = NavSignalID::gps_lnav();
        assert!(lnav.is_exact());
        assert!(NavSignalID::any().matches(&lnav));
        assert!(NavSignalID::any_of(NavType::GpsLnav).matches(&lnav));
        assert!(!NavSignalID::any_of(NavType::GalInav).matches(&lnav));
        assert!(!NavSignalID::gal_inav_e1b().matches(&NavSignalID::gal_inav_e5b()));
        assert_eq!(
            lnav.to_string(),
            format!("{} L1 C/A GPS-LNAV", Constellation::GPS)
        );
        assert_eq!(NavSignalID::any().to_string(), "* * * *");
    }
}
