//! Galileo F/NAV (E5a-I) decoder
use std::collections::HashMap;

use log::{debug, warn};
use num_traits::FromPrimitive;

use crate::{
    bits::{BitRangeError, NavBits},
    decoder::{
        check_unit,
        checksum::crc24q_check,
        emit,
        gal_inav::{galileo_almanac, gst_gps, gst_utc, nequick, AlmanacLayout},
        DecoderStats, DecodingError, NavDecoder,
    },
    gnss_time::nearest_week_epoch,
    identity::{NavMessageTypes, NavSatelliteID, NavSignalID, NavType},
    navigation::{
        galileo_health, Almanac, Ephemeris, GalAlmanac, GalDataValidity, GalFnavEphemeris,
        GalHealth, GalHealthStatus, GalIsc, Health, Iono, Isc, KeplerOrbit, NavData, NavRecord,
        SVHealth, TimeOffset,
    },
    prelude::{Constellation, TimeScale, SV},
};

/// Page length, CRC and tail bits included
const PAGE_BITS: usize = 244;

/// Bits covered by the CRC
const CRC_COVERED: usize = 214;

/// Almanac SV1 sits in page 5, SV2 straddles pages 5 and 6, SV3 sits
/// in page 6. WNa and t0a are only broadcast in page 5.
const FNAV_ALMANACS: [AlmanacLayout; 3] = [
    AlmanacLayout {
        toa_unit: 0,
        svid: (0, 22, 6),
        delta_sqrt_a: (0, 28, 13),
        ecc: (0, 41, 11),
        omega: (0, 52, 16),
        delta_i: (0, 68, 11),
        omega0: &[(0, 79, 16)],
        omega_dot: (0, 95, 11),
        m0: (0, 106, 16),
        af0: (0, 122, 16),
        af1: (0, 138, 13),
        health: &[(0, 151, 2)],
    },
    AlmanacLayout {
        toa_unit: 0,
        svid: (0, 153, 6),
        delta_sqrt_a: (0, 159, 13),
        ecc: (0, 172, 11),
        omega: (0, 183, 16),
        delta_i: (0, 199, 11),
        omega0: &[(0, 210, 4), (1, 10, 12)],
        omega_dot: (1, 22, 11),
        m0: (1, 33, 16),
        af0: (1, 49, 16),
        af1: (1, 65, 13),
        health: &[(1, 78, 2)],
    },
    AlmanacLayout {
        toa_unit: 0,
        svid: (1, 80, 6),
        delta_sqrt_a: (1, 86, 13),
        ecc: (1, 99, 11),
        omega: (1, 110, 16),
        delta_i: (1, 126, 11),
        omega0: &[(1, 137, 16)],
        omega_dot: (1, 153, 11),
        m0: (1, 164, 16),
        af0: (1, 180, 16),
        af1: (1, 196, 13),
        health: &[(1, 209, 2)],
    },
];

/// Pages of one satellite, indexed by page type
type Pages = [Option<NavBits>; 7];

/// [GalFnavDecoder] decodes F/NAV pages (244 bits, tail included).
#[derive(Debug)]
pub struct GalFnavDecoder {
    signals: Vec<NavSignalID>,
    stats: DecoderStats,
    filter: NavMessageTypes,
    pages: HashMap<SV, Pages>,
}

impl Default for GalFnavDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GalFnavDecoder {
    pub fn new() -> Self {
        Self {
            signals: vec![NavSignalID::gal_fnav()],
            stats: DecoderStats::default(),
            filter: NavMessageTypes::all(),
            pages: HashMap::new(),
        }
    }

    /// Page type 1: clock, SISA, iono, group delay and health
    fn page1(p1: &NavBits) -> Result<Vec<NavRecord>, BitRangeError> {
        let sat = NavSatelliteID::own(p1.sv, p1.signal);
        let health = GalHealth {
            status: GalHealthStatus::from_u64(p1.unsigned(153, 2)?).unwrap_or_default(),
            dvs: GalDataValidity::from_u64(p1.unsigned(187, 1)?).unwrap_or_default(),
            sisa: p1.unsigned(94, 8)? as u8,
        };
        let isc = GalIsc {
            bgd_e1e5a: Some(p1.scaled_signed(143, 10, -32)?),
            bgd_e1e5b: None,
        };
        Ok(vec![
            NavRecord::new(sat, p1.xmit, NavData::Health(Health::GalFnav(health))),
            NavRecord::new(
                sat,
                p1.xmit,
                NavData::Iono(Iono::NeQuick(nequick(p1, 102, NavType::GalFnav)?)),
            ),
            NavRecord::new(sat, p1.xmit, NavData::Isc(Isc::GalFnav(isc))),
        ])
    }

    /// Page type 4: GST to UTC then GST to GPST
    fn page4(p4: &NavBits) -> Result<Vec<NavRecord>, BitRangeError> {
        let sat = NavSatelliteID::own(p4.sv, p4.signal);
        let utc = gst_utc(p4, [48, 80, 104, 112, 120, 128, 136, 139], NavType::GalFnav)?;
        let gps = gst_gps(p4, [155, 171, 147, 183], NavType::GalFnav)?;
        Ok(vec![
            NavRecord::new(sat, p4.xmit, NavData::TimeOffset(TimeOffset::Std(utc))),
            NavRecord::new(sat, p4.xmit, NavData::TimeOffset(TimeOffset::Std(gps))),
        ])
    }

    /// Builds the ephemeris once pages 1 to 4 share the same IODnav
    fn complete_ephemeris(&mut self, sv: SV) -> Result<Option<NavRecord>, BitRangeError> {
        let pages = match self.pages.get_mut(&sv) {
            Some(pages) => pages,
            None => return Ok(None),
        };
        let (p1, p2, p3, p4) = match (&pages[1], &pages[2], &pages[3], &pages[4]) {
            (Some(p1), Some(p2), Some(p3), Some(p4)) => (p1, p2, p3, p4),
            _ => return Ok(None),
        };
        let iod = p1.unsigned(12, 10)?;
        if p2.unsigned(6, 10)? != iod || p3.unsigned(6, 10)? != iod || p4.unsigned(6, 10)? != iod {
            return Ok(None);
        }

        let toc = nearest_week_epoch(p1.unsigned(22, 14)? as f64 * 60.0, p1.xmit, TimeScale::GST);
        let toe = nearest_week_epoch(p3.unsigned(160, 14)? as f64 * 60.0, p3.xmit, TimeScale::GST);
        let sisa = p1.unsigned(94, 8)? as u8;
        let hs_e5a = GalHealthStatus::from_u64(p1.unsigned(153, 2)?).unwrap_or_default();
        let dvs_e5a = GalDataValidity::from_u64(p1.unsigned(187, 1)?).unwrap_or_default();
        let sqrt_a = p2.scaled_unsigned(104, 32, -19)?;

        let mut orbit = KeplerOrbit::new(toe);
        orbit.toc = toc;
        orbit.af0 = p1.scaled_signed(36, 31, -34)?;
        orbit.af1 = p1.scaled_signed(67, 21, -46)?;
        orbit.af2 = p1.scaled_signed(88, 6, -59)?;
        orbit.m0 = p2.semicircles(16, 32, -31)?;
        orbit.omega_dot = p2.semicircles(48, 24, -43)?;
        orbit.ecc = p2.scaled_unsigned(72, 32, -33)?;
        orbit.a = sqrt_a * sqrt_a;
        orbit.omega0 = p2.semicircles(136, 32, -31)?;
        orbit.idot = p2.semicircles(168, 14, -43)?;
        orbit.i0 = p3.semicircles(16, 32, -31)?;
        orbit.w = p3.semicircles(48, 32, -31)?;
        orbit.dn = p3.semicircles(80, 16, -43)?;
        orbit.cuc = p3.scaled_signed(96, 16, -29)?;
        orbit.cus = p3.scaled_signed(112, 16, -29)?;
        orbit.crc = p3.scaled_signed(128, 16, -5)?;
        orbit.crs = p3.scaled_signed(144, 16, -5)?;
        orbit.cic = p4.scaled_signed(16, 16, -29)?;
        orbit.cis = p4.scaled_signed(32, 16, -29)?;
        orbit.healthy = galileo_health(hs_e5a, dvs_e5a, sisa) == SVHealth::Healthy;

        let eph = GalFnavEphemeris {
            orbit,
            xmit: [p1.xmit, p2.xmit, p3.xmit, p4.xmit],
            iod_nav: iod as u16,
            sisa,
            bgd_e1e5a: p1.scaled_signed(143, 10, -32)?,
            hs_e5a,
            dvs_e5a,
        };
        let first = eph.xmit.iter().copied().min().unwrap_or(p1.xmit);
        let signal = p1.signal;
        for slot in pages.iter_mut().take(5) {
            *slot = None;
        }
        debug!("{}: f/nav ephemeris iod={} toe={}", sv, iod, toe);
        Ok(Some(NavRecord::new(
            NavSatelliteID::own(sv, signal),
            first,
            NavData::Ephemeris(Ephemeris::GalFnav(eph)),
        )))
    }

    fn almanac(
        units: &[&NavBits],
        layout: &AlmanacLayout,
        ioda: u8,
    ) -> Result<Option<NavRecord>, BitRangeError> {
        let (svid, orbit, health) = galileo_almanac(units, layout, (10, 12))?;
        if svid == 0 {
            return Ok(None);
        }
        let p5 = units[0];
        let xmit_last = units.last().map(|u| u.xmit).unwrap_or(p5.xmit);
        Ok(Some(NavRecord::new(
            NavSatelliteID::new(SV::new(Constellation::Galileo, svid), p5.sv, p5.signal),
            p5.xmit.min(xmit_last),
            NavData::Almanac(Almanac::GalFnav(GalAlmanac {
                orbit,
                xmit: [p5.xmit, xmit_last],
                ioda,
                hs_e1b: None,
                hs_e5b: None,
                hs_e5a: health.first().copied(),
            })),
        )))
    }

    /// Almanacs completed by page 5 or 6
    fn almanacs(&mut self, sv: SV, page: usize) -> Result<Vec<NavRecord>, BitRangeError> {
        let pages = match self.pages.get_mut(&sv) {
            Some(pages) => pages,
            None => return Ok(Vec::new()),
        };
        let mut records = Vec::new();
        if let (5, Some(p5)) = (page, &pages[5]) {
            let ioda = p5.unsigned(6, 4)? as u8;
            records.extend(Self::almanac(&[p5], &FNAV_ALMANACS[0], ioda)?);
        }
        if let (Some(p5), Some(p6)) = (&pages[5], &pages[6]) {
            let ioda = p5.unsigned(6, 4)?;
            if p6.unsigned(6, 4)? == ioda {
                let units = [p5, p6];
                for layout in FNAV_ALMANACS.iter().skip(1) {
                    records.extend(Self::almanac(&units, layout, ioda as u8)?);
                }
                pages[5] = None;
                pages[6] = None;
            }
        }
        Ok(records)
    }
}

impl NavDecoder for GalFnavDecoder {
    fn signals(&self) -> &[NavSignalID] {
        &self.signals
    }

    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        check_unit(bits, &self.signals, PAGE_BITS, &mut self.stats)?;
        if !crc24q_check(bits, 0, CRC_COVERED, CRC_COVERED)? {
            warn!("{}({}): f/nav crc error", bits.sv, bits.xmit);
            self.stats.parity_errors += 1;
            self.pages.remove(&bits.sv);
            return Err(DecodingError::Checksum);
        }

        let page = bits.unsigned(0, 6)? as usize;
        let mut records = Vec::new();
        match page {
            1..=6 => {
                self.pages.entry(bits.sv).or_default()[page] = Some(bits.clone());
                match page {
                    1 => records.extend(Self::page1(bits)?),
                    4 => records.extend(Self::page4(bits)?),
                    _ => {},
                }
                if page <= 4 {
                    if let Some(eph) = self.complete_ephemeris(bits.sv)? {
                        records.push(eph);
                    }
                } else {
                    records.extend(self.almanacs(bits.sv, page)?);
                }
            },
            _ => debug!("{}: f/nav page type {} not handled", bits.sv, page),
        }
        Ok(emit(records, self.filter, &mut self.stats))
    }

    fn reset(&mut self) {
        self.pages.clear();
    }

    fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    fn set_type_filter(&mut self, types: NavMessageTypes) {
        self.filter = types;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::Epoch;
    #[test]
    fn crc_failure_resets_satellite() {
        let mut decoder = GalFnavDecoder::new();
        let t = Epoch::from_gregorian_at_midnight(2024, 1, 1, TimeScale::GST);
        let sv = SV::new(Constellation::Galileo, 11);
        let mut page = vec![false; PAGE_BITS];
        page[5] = true;
        page[20] = true;
        let bits = NavBits::from_bools(sv, NavSignalID::gal_fnav(), t, &page);
        assert_eq!(decoder.decode(&bits), Err(DecodingError::Checksum));
        assert_eq!(decoder.stats().parity_errors, 1);
        assert!(decoder.pages.is_empty());
    }
}
