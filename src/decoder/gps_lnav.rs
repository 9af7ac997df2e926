//! GPS LNAV (L1 C/A) decoder
use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    bits::{BitRangeError, NavBits},
    decoder::{
        check_unit, checksum::lnav_recover, emit, leap_effectivity, DecoderStats, DecodingError,
        NavDecoder,
    },
    gnss_time::{adjust_week_rollover, from_week_seconds, nearest_week_epoch, week_seconds},
    identity::{NavMessageTypes, NavSatelliteID, NavSignalID, NavType},
    navigation::{
        Almanac, Ephemeris, GpsLnavAlmanac, GpsLnavEphemeris, GpsLnavHealth, GpsLnavIsc, Health,
        Iono, Isc, KeplerOrbit, KlobucharModel, LnavHeader, NavData, NavRecord, StdTimeOffset,
        TimeOffset,
    },
    prelude::{Constellation, Duration, Epoch, TimeScale, SV},
};

/// Subframe length
const SUBFRAME_BITS: usize = 300;

/// Subframe period, in seconds
const SUBFRAME_PERIOD: f64 = 6.0;

/// Page 51 content, kept per transmitting satellite to complete the
/// almanac pages with their reference week.
#[derive(Debug, Clone)]
struct AlmanacReference {
    xmit: Epoch,
    /// toa, second of week
    toa: f64,
    /// Full week of the almanac
    wna: u32,
}

/// [GpsLnavDecoder] decodes 300 bit LNAV subframes, as transmitted
/// (parity included, data bits not yet recovered).
#[derive(Debug)]
pub struct GpsLnavDecoder {
    signals: Vec<NavSignalID>,
    stats: DecoderStats,
    filter: NavMessageTypes,
    /// Subframes 1, 2 and 3, per satellite
    ephemeris: HashMap<SV, [Option<NavBits>; 3]>,
    /// Almanac pages waiting for page 51, per transmitting satellite
    almanac: HashMap<SV, Vec<NavBits>>,
    /// Latest page 51, per transmitting satellite
    references: HashMap<SV, AlmanacReference>,
}

impl Default for GpsLnavDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn header(bits: &NavBits) -> Result<LnavHeader, BitRangeError> {
    Ok(LnavHeader {
        preamble: bits.unsigned(0, 8)? as u8,
        tlm: bits.unsigned(8, 14)? as u16,
        tow_count: bits.unsigned(30, 17)? as u32,
        alert: bits.bit(47)?,
        anti_spoofing: bits.bit(48)?,
        subframe: bits.unsigned(49, 3)? as u8,
    })
}

/// Almanac page subject, from the page SV ID
fn page_svid(bits: &NavBits) -> Result<u8, BitRangeError> {
    Ok(bits.unsigned(62, 6)? as u8)
}

impl GpsLnavDecoder {
    pub fn new() -> Self {
        Self {
            signals: vec![NavSignalID::gps_lnav()],
            stats: DecoderStats::default(),
            filter: NavMessageTypes::all(),
            ephemeris: HashMap::new(),
            almanac: HashMap::new(),
            references: HashMap::new(),
        }
    }

    /// Subframe 1: health and group delay are emitted right away
    fn subframe1(&self, bits: &NavBits, hdr: LnavHeader) -> Result<Vec<NavRecord>, BitRangeError> {
        let sat = NavSatelliteID::own(bits.sv, bits.signal);
        let health = bits.unsigned(76, 6)? as u8;
        let tgd = bits.scaled_signed(196, 8, -31)?;
        Ok(vec![
            NavRecord::new(
                sat,
                bits.xmit,
                NavData::Health(Health::GpsLnav(GpsLnavHealth {
                    header: hdr,
                    bits: health,
                })),
            ),
            NavRecord::new(
                sat,
                bits.xmit,
                NavData::Isc(Isc::GpsLnav(GpsLnavIsc { header: hdr, tgd })),
            ),
        ])
    }

    /// Subframe 1 opens a new frame: held subframes 2 and 3 that were not
    /// transmitted within that same frame are discarded.
    fn drop_stale_partial(&mut self, sf1: &NavBits) {
        let slots = match self.ephemeris.get_mut(&sf1.sv) {
            Some(slots) => slots,
            None => return,
        };
        for (index, slot) in slots.iter_mut().enumerate().skip(1) {
            let expected = sf1.xmit + Duration::from_seconds(SUBFRAME_PERIOD * index as f64);
            if slot.as_ref().map_or(false, |held| held.xmit != expected) {
                debug!("{}({}): dropping stale subframe {}", sf1.sv, sf1.xmit, index + 1);
                *slot = None;
            }
        }
    }

    /// Builds the ephemeris once subframes 1 to 3 share the same issue
    /// of data.
    fn complete_ephemeris(&mut self, sv: SV) -> Result<Option<NavRecord>, BitRangeError> {
        let complete = match self.ephemeris.get(&sv) {
            Some([Some(sf1), Some(sf2), Some(sf3)]) => {
                let iodc_lsb = sf1.unsigned(210, 8)?;
                let iode2 = sf2.unsigned(60, 8)?;
                let iode3 = sf3.unsigned(270, 8)?;
                if iodc_lsb == iode2 && iode2 == iode3 {
                    Some((sf1.clone(), sf2.clone(), sf3.clone()))
                } else {
                    debug!(
                        "{}: iodc/iode mismatch {}/{}/{}",
                        sv, iodc_lsb, iode2, iode3
                    );
                    None
                }
            },
            _ => None,
        };
        let (sf1, sf2, sf3) = match complete {
            Some(sf) => sf,
            None => return Ok(None),
        };
        self.ephemeris.remove(&sv);

        let (xmit_week, xmit_sow) = week_seconds(sf1.xmit, TimeScale::GPST);
        let wn = adjust_week_rollover(sf1.unsigned(60, 10)? as u32, xmit_week, 10);
        let reference = from_week_seconds(wn, xmit_sow, TimeScale::GPST);

        let toc = nearest_week_epoch(
            sf1.unsigned(218, 16)? as f64 * 16.0,
            reference,
            TimeScale::GPST,
        );
        let toe = nearest_week_epoch(
            sf2.unsigned(270, 16)? as f64 * 16.0,
            reference,
            TimeScale::GPST,
        );

        let health = sf1.unsigned(76, 6)? as u8;
        let sqrt_a = sf2.scaled_unsigned_split(&[(226, 8), (240, 24)], -19)?;

        let mut orbit = KeplerOrbit::new(toe);
        orbit.toc = toc;
        orbit.af0 = sf1.scaled_signed(270, 22, -31)?;
        orbit.af1 = sf1.scaled_signed(248, 16, -43)?;
        orbit.af2 = sf1.scaled_signed(240, 8, -55)?;
        orbit.crs = sf2.scaled_signed(68, 16, -5)?;
        orbit.dn = sf2.semicircles(90, 16, -43)?;
        orbit.m0 = sf2.semicircles_split(&[(106, 8), (120, 24)], -31)?;
        orbit.cuc = sf2.scaled_signed(150, 16, -29)?;
        orbit.ecc = sf2.scaled_unsigned_split(&[(166, 8), (180, 24)], -33)?;
        orbit.cus = sf2.scaled_signed(210, 16, -29)?;
        orbit.a = sqrt_a * sqrt_a;
        orbit.cic = sf3.scaled_signed(60, 16, -29)?;
        orbit.omega0 = sf3.semicircles_split(&[(76, 8), (90, 24)], -31)?;
        orbit.cis = sf3.scaled_signed(120, 16, -29)?;
        orbit.i0 = sf3.semicircles_split(&[(136, 8), (150, 24)], -31)?;
        orbit.crc = sf3.scaled_signed(180, 16, -5)?;
        orbit.w = sf3.semicircles_split(&[(196, 8), (210, 24)], -31)?;
        orbit.omega_dot = sf3.semicircles(240, 24, -43)?;
        orbit.idot = sf3.semicircles(278, 14, -43)?;
        orbit.healthy = health == 0;

        let eph = GpsLnavEphemeris {
            orbit,
            headers: [header(&sf1)?, header(&sf2)?, header(&sf3)?],
            xmit: [sf1.xmit, sf2.xmit, sf3.xmit],
            iodc: sf1.unsigned_split(&[(82, 2), (210, 8)])? as u16,
            iode: sf2.unsigned(60, 8)? as u8,
            fit_interval: sf2.bit(286)?,
            ura: sf1.unsigned(72, 4)? as u8,
            health,
            l2_codes: sf1.unsigned(70, 2)? as u8,
            l2p_data: sf1.bit(90)?,
            tgd: sf1.scaled_signed(196, 8, -31)?,
            aodo: sf2.unsigned(287, 5)? as f64 * 900.0,
        };
        debug!("{}: ephemeris iodc={} toe={}", sv, eph.iodc, toe);
        Ok(Some(NavRecord::new(
            NavSatelliteID::own(sv, sf1.signal),
            sf1.xmit,
            NavData::Ephemeris(Ephemeris::GpsLnav(eph)),
        )))
    }

    /// Builds one almanac from its page, referenced by page 51
    fn almanac(page: &NavBits, reference: &AlmanacReference) -> Result<NavRecord, BitRangeError> {
        let svid = page_svid(page)?;
        let toa = from_week_seconds(reference.wna, reference.toa, TimeScale::GPST);
        let health = page.unsigned(136, 8)? as u8;
        let sqrt_a = page.scaled_unsigned(150, 24, -11)?;

        let mut orbit = KeplerOrbit::new(toa);
        orbit.ecc = page.scaled_unsigned(68, 16, -21)?;
        orbit.i0 = (0.3 + page.scaled_signed(98, 16, -19)?) * std::f64::consts::PI;
        orbit.omega_dot = page.semicircles(120, 16, -38)?;
        orbit.a = sqrt_a * sqrt_a;
        orbit.omega0 = page.semicircles(180, 24, -23)?;
        orbit.w = page.semicircles(210, 24, -23)?;
        orbit.m0 = page.semicircles(240, 24, -23)?;
        orbit.af0 = page.scaled_signed_split(&[(270, 8), (289, 3)], -20)?;
        orbit.af1 = page.scaled_signed(278, 11, -38)?;
        orbit.healthy = health == 0;

        Ok(NavRecord::new(
            NavSatelliteID::new(
                SV::new(Constellation::GPS, svid),
                page.sv,
                page.signal,
            ),
            page.xmit,
            NavData::Almanac(Almanac::GpsLnav(GpsLnavAlmanac {
                orbit,
                header: header(page)?,
                xmit: [page.xmit, reference.xmit],
                health,
            })),
        ))
    }

    /// Health of another satellite, found in subframes 4 and 5
    fn health(bits: &NavBits, hdr: LnavHeader, prn: u8, health: u8) -> NavRecord {
        NavRecord::new(
            NavSatelliteID::new(SV::new(Constellation::GPS, prn), bits.sv, bits.signal),
            bits.xmit,
            NavData::Health(Health::GpsLnav(GpsLnavHealth {
                header: hdr,
                bits: health,
            })),
        )
    }

    /// Subframes 4 and 5
    fn pages(&mut self, bits: &NavBits, hdr: LnavHeader) -> Result<Vec<NavRecord>, BitRangeError> {
        let svid = page_svid(bits)?;
        let mut records = Vec::new();
        match svid {
            1..=32 => {
                let health = bits.unsigned(136, 8)? as u8;
                records.push(Self::health(bits, hdr, svid, health));
                let toa = bits.unsigned(90, 8)? as f64 * 4096.0;
                match self.references.get(&bits.sv) {
                    Some(reference) if reference.toa == toa => {
                        records.push(Self::almanac(bits, reference)?);
                    },
                    _ => {
                        let pending = self.almanac.entry(bits.sv).or_default();
                        pending.retain(|page| page_svid(page).ok() != Some(svid));
                        pending.push(bits.clone());
                    },
                }
            },
            51 => {
                for prn in 1..=24_u8 {
                    let index = (prn - 1) as usize;
                    let start = 90 + 30 * (index / 4) + 6 * (index % 4);
                    let health = bits.unsigned(start, 6)? as u8;
                    records.push(Self::health(bits, hdr, prn, health));
                }
                let (week, _) = week_seconds(bits.xmit, TimeScale::GPST);
                let reference = AlmanacReference {
                    xmit: bits.xmit,
                    toa: bits.unsigned(68, 8)? as f64 * 4096.0,
                    wna: adjust_week_rollover(bits.unsigned(76, 8)? as u32, week, 8),
                };
                let pending = self.almanac.remove(&bits.sv).unwrap_or_default();
                let mut waiting = Vec::new();
                for page in pending {
                    if page.unsigned(90, 8)? as f64 * 4096.0 == reference.toa {
                        records.push(Self::almanac(&page, &reference)?);
                    } else {
                        waiting.push(page);
                    }
                }
                if !waiting.is_empty() {
                    self.almanac.insert(bits.sv, waiting);
                }
                self.references.insert(bits.sv, reference);
            },
            56 => {
                records.push(Self::iono(bits, hdr)?);
                records.push(Self::time_offset(bits, hdr)?);
            },
            63 => {
                const STARTS: [usize; 8] = [228, 240, 246, 252, 258, 270, 276, 282];
                for (i, start) in STARTS.iter().enumerate() {
                    let health = bits.unsigned(*start, 6)? as u8;
                    records.push(Self::health(bits, hdr, 25 + i as u8, health));
                }
            },
            _ => {},
        }
        Ok(records)
    }

    /// Page 56 Klobuchar coefficients
    fn iono(bits: &NavBits, hdr: LnavHeader) -> Result<NavRecord, BitRangeError> {
        let model = KlobucharModel {
            source: NavType::GpsLnav,
            alpha: [
                bits.scaled_signed(68, 8, -30)?,
                bits.scaled_signed(76, 8, -27)?,
                bits.scaled_signed(90, 8, -24)?,
                bits.scaled_signed(98, 8, -24)?,
            ],
            beta: [
                bits.scaled_signed(106, 8, 11)?,
                bits.scaled_signed(120, 8, 14)?,
                bits.scaled_signed(128, 8, 16)?,
                bits.scaled_signed(136, 8, 16)?,
            ],
            preamble: hdr.preamble as u16,
        };
        Ok(NavRecord::new(
            NavSatelliteID::own(bits.sv, bits.signal),
            bits.xmit,
            NavData::Iono(Iono::Klobuchar(model)),
        ))
    }

    /// Page 56 GPS to UTC offset
    fn time_offset(bits: &NavBits, hdr: LnavHeader) -> Result<NavRecord, BitRangeError> {
        let (week, _) = week_seconds(bits.xmit, TimeScale::GPST);
        let tot = bits.unsigned(218, 8)? as f64 * 4096.0;
        let wnt = adjust_week_rollover(bits.unsigned(226, 8)? as u32, week, 8);
        let wn_lsf = adjust_week_rollover(bits.unsigned(248, 8)? as u32, week, 8);
        let dn = bits.unsigned(256, 8)? as u8;
        let offset = StdTimeOffset {
            source: NavType::GpsLnav,
            src: TimeScale::GPST,
            tgt: TimeScale::UTC,
            a0: bits.scaled_signed_split(&[(180, 24), (210, 8)], -30)?,
            a1: bits.scaled_signed(150, 24, -50)?,
            a2: 0.0,
            ref_time: from_week_seconds(wnt, tot, TimeScale::GPST),
            delta_t_ls: bits.signed(240, 8)? as f64,
            delta_t_lsf: bits.signed(270, 8)? as f64,
            effectivity: leap_effectivity(wn_lsf, dn.saturating_sub(1) as u32, TimeScale::GPST),
            wn_lsf,
            dn,
            tot,
            preamble: hdr.preamble as u16,
        };
        Ok(NavRecord::new(
            NavSatelliteID::own(bits.sv, bits.signal),
            bits.xmit,
            NavData::TimeOffset(TimeOffset::Std(offset)),
        ))
    }
}

impl NavDecoder for GpsLnavDecoder {
    fn signals(&self) -> &[NavSignalID] {
        &self.signals
    }

    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        check_unit(bits, &self.signals, SUBFRAME_BITS, &mut self.stats)?;

        let bits = match lnav_recover(bits)? {
            Ok(bits) => bits,
            Err(word) => {
                warn!("{}({}): lnav parity error on word {}", bits.sv, bits.xmit, word);
                self.stats.parity_errors += 1;
                self.ephemeris.remove(&bits.sv);
                return Err(DecodingError::Parity { word });
            },
        };

        let hdr = header(&bits)?;
        let records = match hdr.subframe {
            1..=3 => {
                let index = (hdr.subframe - 1) as usize;
                let mut records = Vec::new();
                if index == 0 {
                    records = self.subframe1(&bits, hdr)?;
                    self.drop_stale_partial(&bits);
                }
                let slots = self.ephemeris.entry(bits.sv).or_default();
                slots[index] = Some(bits.clone());
                if let Some(eph) = self.complete_ephemeris(bits.sv)? {
                    records.push(eph);
                }
                records
            },
            4 | 5 => self.pages(&bits, hdr)?,
            _ => {
                debug!("{}: invalid subframe id {}", bits.sv, hdr.subframe);
                Vec::new()
            },
        };
        Ok(emit(records, self.filter, &mut self.stats))
    }

    fn reset(&mut self) {
        self.ephemeris.clear();
        self.almanac.clear();
        self.references.clear();
    }

    fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    fn set_type_filter(&mut self, types: NavMessageTypes) {
        self.filter = types;
    }
}
