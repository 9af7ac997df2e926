//! Inter signal corrections (group delays)
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    identity::{CarrierBand, TrackingCode},
    navigation::{BdsHeader, CnavHeader, LnavHeader},
    prelude::{Duration, Epoch},
};

/// (f_a / f_b)², None for unknown carriers
fn gamma(a: CarrierBand, b: CarrierBand) -> Option<f64> {
    Some((a.frequency()? / b.frequency()?).powi(2))
}

/// GPS LNAV group delay (subframe 1)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsLnavIsc {
    pub header: LnavHeader,
    /// L1/L2 P(Y) group delay (s)
    pub tgd: f64,
}

/// GPS CNAV group delays (clock message type 30). Values broadcast
/// as "not available" are None.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsCnavIsc {
    pub header: Option<CnavHeader>,
    pub tgd: Option<f64>,
    pub isc_l1ca: Option<f64>,
    pub isc_l2c: Option<f64>,
    pub isc_l5i5: Option<f64>,
    pub isc_l5q5: Option<f64>,
}

/// GPS CNAV-2 group delays: TGD and L1C corrections from subframe 2,
/// completed with the legacy signal corrections of subframe 3 page 1
/// when one was received.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsCnav2Isc {
    /// Subframe 2 transmit time
    pub xmit_sf2: Epoch,
    /// Subframe 3 page 1 transmit time
    pub xmit_sf3: Option<Epoch>,
    pub tgd: Option<f64>,
    pub isc_l1cp: Option<f64>,
    pub isc_l1cd: Option<f64>,
    pub isc_l1ca: Option<f64>,
    pub isc_l2c: Option<f64>,
    pub isc_l5i5: Option<f64>,
    pub isc_l5q5: Option<f64>,
}

/// Galileo broadcast group delays
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GalIsc {
    /// E1-E5a BGD (s)
    pub bgd_e1e5a: Option<f64>,
    /// E1-E5b BGD (s), I/NAV only
    pub bgd_e1e5b: Option<f64>,
}

/// BeiDou group delays (D1 subframe 1, D2 subframe 1 page 1)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BdsD1Isc {
    pub header: BdsHeader,
    /// B1I group delay (s)
    pub tgd1: f64,
    /// B2I group delay (s)
    pub tgd2: f64,
}

/// GLONASS L1/L2 time difference (string 4)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GloFnavIsc {
    /// Δτn (s)
    pub delta_tau_n: f64,
}

/// Inter signal correction record payloads
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Isc {
    GpsLnav(GpsLnavIsc),
    GpsCnav(GpsCnavIsc),
    GpsCnav2(GpsCnav2Isc),
    GalInav(GalIsc),
    GalFnav(GalIsc),
    BdsD1(BdsD1Isc),
    BdsD2(BdsD1Isc),
    GloFnav(GloFnavIsc),
}

/// CNAV single frequency rule: ISC minus TGD
fn cnav_single(tgd: Option<f64>, isc: Option<f64>) -> Option<f64> {
    Some(isc? - tgd?)
}

/// CNAV dual frequency rule, `isc_ref` applying to the L1 signal
fn cnav_dual(tgd: Option<f64>, isc_ref: Option<f64>, isc: Option<f64>, other: CarrierBand) -> Option<f64> {
    let gamma = gamma(CarrierBand::L1, other)?;
    Some((isc? - gamma * isc_ref?) / (1.0 - gamma) - tgd?)
}

impl Isc {
    /// Correction (s) to add to the satellite clock offset for a single
    /// frequency user of `band`/`code`. None when this record does not
    /// apply to the signal or lacks the needed values.
    pub fn correction(&self, band: CarrierBand, code: TrackingCode) -> Option<f64> {
        match self {
            Self::GpsLnav(isc) => match band {
                CarrierBand::L1 => Some(-isc.tgd),
                CarrierBand::L2 => Some(-gamma(CarrierBand::L1, CarrierBand::L2)? * isc.tgd),
                _ => None,
            },
            Self::GpsCnav(isc) => match code {
                TrackingCode::CA => cnav_single(isc.tgd, isc.isc_l1ca),
                TrackingCode::L2CM | TrackingCode::L2CL => cnav_single(isc.tgd, isc.isc_l2c),
                TrackingCode::L5I => cnav_single(isc.tgd, isc.isc_l5i5),
                TrackingCode::L5Q => cnav_single(isc.tgd, isc.isc_l5q5),
                _ => None,
            },
            Self::GpsCnav2(isc) => match code {
                TrackingCode::CA => cnav_single(isc.tgd, isc.isc_l1ca),
                TrackingCode::L1CP => cnav_single(isc.tgd, isc.isc_l1cp),
                TrackingCode::L1CD => cnav_single(isc.tgd, isc.isc_l1cd),
                TrackingCode::L2CM | TrackingCode::L2CL => cnav_single(isc.tgd, isc.isc_l2c),
                TrackingCode::L5I => cnav_single(isc.tgd, isc.isc_l5i5),
                TrackingCode::L5Q => cnav_single(isc.tgd, isc.isc_l5q5),
                _ => None,
            },
            Self::GalInav(isc) => match band {
                CarrierBand::L1 => Some(-isc.bgd_e1e5b?),
                CarrierBand::L5 => Some(-gamma(CarrierBand::L1, CarrierBand::L5)? * isc.bgd_e1e5a?),
                CarrierBand::E5b => {
                    Some(-gamma(CarrierBand::L1, CarrierBand::E5b)? * isc.bgd_e1e5b?)
                },
                _ => None,
            },
            Self::GalFnav(isc) => match band {
                CarrierBand::L5 => Some(-gamma(CarrierBand::L1, CarrierBand::L5)? * isc.bgd_e1e5a?),
                _ => None,
            },
            Self::BdsD1(isc) | Self::BdsD2(isc) => match code {
                TrackingCode::B1I => Some(-isc.tgd1),
                TrackingCode::B2I => Some(-isc.tgd2),
                // clocks are referenced to B3I
                TrackingCode::B3I => Some(0.0),
                _ => None,
            },
            Self::GloFnav(_) => None,
        }
    }

    /// Correction (s) for an ionosphere free combination of two signals.
    pub fn dual_correction(
        &self,
        (band1, code1): (CarrierBand, TrackingCode),
        (band2, code2): (CarrierBand, TrackingCode),
    ) -> Option<f64> {
        match self {
            Self::GpsLnav(_) => match (band1, band2) {
                (CarrierBand::L1, CarrierBand::L2) | (CarrierBand::L2, CarrierBand::L1) => {
                    Some(0.0)
                },
                _ => None,
            },
            Self::GpsCnav(isc) => {
                let (l1, other) = if band1 == CarrierBand::L1 {
                    (code1, code2)
                } else {
                    (code2, code1)
                };
                if l1 != TrackingCode::CA {
                    return None;
                }
                match other {
                    TrackingCode::L2CM | TrackingCode::L2CL => {
                        cnav_dual(isc.tgd, isc.isc_l1ca, isc.isc_l2c, CarrierBand::L2)
                    },
                    TrackingCode::L5I => {
                        cnav_dual(isc.tgd, isc.isc_l1ca, isc.isc_l5i5, CarrierBand::L5)
                    },
                    TrackingCode::L5Q => {
                        cnav_dual(isc.tgd, isc.isc_l1ca, isc.isc_l5q5, CarrierBand::L5)
                    },
                    _ => None,
                }
            },
            Self::GpsCnav2(isc) => {
                let (l1, other) = if band1 == CarrierBand::L1 {
                    (code1, code2)
                } else {
                    (code2, code1)
                };
                let isc_ref = match l1 {
                    TrackingCode::CA => isc.isc_l1ca,
                    TrackingCode::L1CP => isc.isc_l1cp,
                    TrackingCode::L1CD => isc.isc_l1cd,
                    _ => return None,
                };
                match other {
                    TrackingCode::L2CM | TrackingCode::L2CL => {
                        cnav_dual(isc.tgd, isc_ref, isc.isc_l2c, CarrierBand::L2)
                    },
                    TrackingCode::L5I => cnav_dual(isc.tgd, isc_ref, isc.isc_l5i5, CarrierBand::L5),
                    TrackingCode::L5Q => cnav_dual(isc.tgd, isc_ref, isc.isc_l5q5, CarrierBand::L5),
                    _ => None,
                }
            },
            Self::GalInav(_) | Self::GalFnav(_) => {
                // group delays cancel out in the E1/E5 combinations
                let pair = [band1, band2];
                if pair.contains(&CarrierBand::L1)
                    && (pair.contains(&CarrierBand::L5) || pair.contains(&CarrierBand::E5b))
                {
                    Some(0.0)
                } else {
                    None
                }
            },
            Self::BdsD1(isc) | Self::BdsD2(isc) => {
                let pair = [code1, code2];
                if pair.contains(&TrackingCode::B1I) && pair.contains(&TrackingCode::B3I) {
                    let gamma = gamma(CarrierBand::B1, CarrierBand::B3)?;
                    Some(gamma * isc.tgd1 / (1.0 - gamma))
                } else {
                    None
                }
            },
            Self::GloFnav(isc) => {
                let pair = [band1, band2];
                if pair.contains(&CarrierBand::G1) && pair.contains(&CarrierBand::G2) {
                    Some(isc.delta_tau_n)
                } else {
                    None
                }
            },
        }
    }

    /// CNAV-2 records combine two subframes and carry their own user time
    pub(crate) fn user_time(&self) -> Option<Epoch> {
        match self {
            Self::GpsCnav2(isc) => {
                let sf2 = isc.xmit_sf2 + Duration::from_seconds(12.0);
                match isc.xmit_sf3 {
                    Some(xmit) => Some(sf2.max(xmit + Duration::from_seconds(5.48))),
                    None => Some(sf2),
                }
            },
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> bool {
        match self {
            Self::GpsLnav(isc) => isc.header.validate(),
            Self::GpsCnav(isc) => isc.header.map(|h| h.validate()).unwrap_or(true),
            Self::GpsCnav2(_) => true,
            Self::GalInav(isc) | Self::GalFnav(isc) => [isc.bgd_e1e5a, isc.bgd_e1e5b]
                .iter()
                .flatten()
                .any(|bgd| bgd.is_finite()),
            Self::BdsD1(isc) | Self::BdsD2(isc) => {
                isc.tgd1.is_finite()
                    && isc.tgd2.is_finite()
                    && isc.header.validate()
                    && isc.header.fraid == 1
            },
            Self::GloFnav(isc) => isc.delta_tau_n.is_finite(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lnav_tgd() {
        let isc = Isc::GpsLnav(GpsLnavIsc {
            header: LnavHeader::default(),
            tgd: 5.0E-9,
        });
        assert_eq!(isc.correction(CarrierBand::L1, TrackingCode::CA), Some(-5.0E-9));
        let l2 = isc.correction(CarrierBand::L2, TrackingCode::Unknown).unwrap();
        assert!((l2 + 1.6469444 * 5.0E-9).abs() < 1.0E-15);
        assert_eq!(isc.correction(CarrierBand::L5, TrackingCode::L5I), None);
    }

    #[test]
    fn cnav_corrections() {
        let isc = Isc::GpsCnav(GpsCnavIsc {
            header: None,
            tgd: Some(4.0E-9),
            isc_l1ca: Some(1.0E-9),
            isc_l2c: Some(2.0E-9),
            isc_l5i5: None,
            isc_l5q5: Some(-1.0E-9),
        });
        let l1 = isc.correction(CarrierBand::L1, TrackingCode::CA).unwrap();
        assert!((l1 + 3.0E-9).abs() < 1.0E-18);
        assert_eq!(isc.correction(CarrierBand::L5, TrackingCode::L5I), None);
        let l5q = isc.correction(CarrierBand::L5, TrackingCode::L5Q).unwrap();
        assert!((l5q + 5.0E-9).abs() < 1.0E-18);

        let g12 = (1575.42_f64 / 1227.60).powi(2);
        let expected = (2.0E-9 - g12 * 1.0E-9) / (1.0 - g12) - 4.0E-9;
        let dual = isc
            .dual_correction(
                (CarrierBand::L1, TrackingCode::CA),
                (CarrierBand::L2, TrackingCode::L2CM),
            )
            .unwrap();
        assert!((dual - expected).abs() < 1.0E-18);
        assert!(isc
            .dual_correction(
                (CarrierBand::L1, TrackingCode::CA),
                (CarrierBand::L5, TrackingCode::L5I),
            )
            .is_none());
    }

    #[test]
    fn galileo_bgd() {
        let isc = Isc::GalInav(GalIsc {
            bgd_e1e5a: Some(2.0E-9),
            bgd_e1e5b: Some(3.0E-9),
        });
        assert_eq!(isc.correction(CarrierBand::L1, TrackingCode::E1B), Some(-3.0E-9));
        let e5a = isc.correction(CarrierBand::L5, TrackingCode::E5aI).unwrap();
        let g = (1575.42_f64 / 1176.45).powi(2);
        assert!((e5a + g * 2.0E-9).abs() < 1.0E-18);
        assert!(isc.validate());
        let isc = Isc::GalFnav(GalIsc {
            bgd_e1e5a: None,
            bgd_e1e5b: None,
        });
        assert!(!isc.validate());
        assert_eq!(isc.correction(CarrierBand::L5, TrackingCode::E5aI), None);
    }

    #[test]
    fn beidou_tgd() {
        let header = BdsHeader {
            preamble: 0x712,
            fraid: 1,
            ..Default::default()
        };
        let isc = Isc::BdsD1(BdsD1Isc {
            header,
            tgd1: 2.0E-9,
            tgd2: -1.0E-9,
        });
        assert!(isc.validate());
        assert_eq!(isc.correction(CarrierBand::B1, TrackingCode::B1I), Some(-2.0E-9));
        assert_eq!(isc.correction(CarrierBand::B2, TrackingCode::B2I), Some(1.0E-9));
        let wrong = Isc::BdsD1(BdsD1Isc {
            header: BdsHeader { fraid: 2, ..header },
            tgd1: 2.0E-9,
            tgd2: -1.0E-9,
        });
        assert!(!wrong.validate());
        let nan = Isc::BdsD1(BdsD1Isc {
            header,
            tgd1: f64::NAN,
            tgd2: 0.0,
        });
        assert!(!nan.validate());
    }

    #[test]
    fn glonass_dual_only() {
        let isc = Isc::GloFnav(GloFnavIsc {
            delta_tau_n: 1.0E-9,
        });
        assert_eq!(isc.correction(CarrierBand::G1, TrackingCode::CA), None);
        assert_eq!(
            isc.dual_correction(
                (CarrierBand::G1, TrackingCode::CA),
                (CarrierBand::G2, TrackingCode::CA)
            ),
            Some(1.0E-9)
        );
    }
}
