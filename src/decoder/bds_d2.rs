//! BeiDou D2 (GEO, B1I B2I B3I) decoder
use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    bits::{BitRangeError, NavBits},
    decoder::{
        bds_d1::{header, information, TGD_UNIT},
        check_unit,
        checksum::bds_check,
        emit, DecoderStats, DecodingError, NavDecoder,
    },
    gnss_time::{adjust_week_rollover, from_week_seconds, nearest_week_epoch, week_seconds},
    identity::{NavMessageTypes, NavSatelliteID, NavSignalID, NavType},
    navigation::{
        is_beidou_geo, BdsD1Health, BdsD1Isc, BdsD2Ephemeris, BdsHeader, Ephemeris, Health, Iono,
        Isc, KeplerOrbit, KlobucharModel, NavData, NavRecord,
    },
    prelude::{TimeScale, SV},
};

/// Subframe length, parity included
const SUBFRAME_BITS: usize = 300;

/// Subframe 1 pages carrying the ephemeris
const PAGES: usize = 10;

/// Two consecutive pages of subframe 1 are one frame (s) apart
const PAGE_PERIOD: u32 = 3;

/// Page number of subframe 1, on the information stream
fn page_number(info: &NavBits) -> Result<u8, BitRangeError> {
    Ok(info.unsigned(38, 4)? as u8)
}

/// Field spread over consecutive pages, `(page, start, len)` pieces
/// given MSBs first.
fn joined(pieces: &[(&NavBits, usize, usize)]) -> Result<NavBits, BitRangeError> {
    let mut field = match pieces.first() {
        Some((page, _, _)) => NavBits::new(page.sv, page.signal, page.xmit),
        None => {
            return Err(BitRangeError::OutOfBounds {
                start: 0,
                len: 0,
                size: 0,
            })
        },
    };
    for (page, start, len) in pieces {
        field.push_range(page, *start, *len)?;
    }
    Ok(field.seal())
}

/// [BdsD2Decoder] decodes 300 bit D2 subframes (parity included), as
/// broadcast by the GEO satellites. Only subframe 1 is interpreted: its
/// ten pages make up the ephemeris, page 1 also carries health and
/// group delays, page 2 the ionosphere model.
#[derive(Debug)]
pub struct BdsD2Decoder {
    signals: Vec<NavSignalID>,
    stats: DecoderStats,
    filter: NavMessageTypes,
    /// Subframe 1 pages (information streams), per satellite and signal
    ephemeris: HashMap<(SV, NavSignalID), [Option<NavBits>; PAGES]>,
}

impl Default for BdsD2Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BdsD2Decoder {
    pub fn new() -> Self {
        Self {
            signals: vec![
                NavSignalID::bds_d2_b1(),
                NavSignalID::bds_d2_b2(),
                NavSignalID::bds_d2_b3(),
            ],
            stats: DecoderStats::default(),
            filter: NavMessageTypes::all(),
            ephemeris: HashMap::new(),
        }
    }

    /// Page 1: health and group delays
    fn page1(info: &NavBits, hdr: BdsHeader) -> Result<Vec<NavRecord>, BitRangeError> {
        let sat = NavSatelliteID::own(info.sv, info.signal);
        let isc = BdsD1Isc {
            header: hdr,
            tgd1: info.signed(82, 10)? as f64 * TGD_UNIT,
            tgd2: info.signed(92, 10)? as f64 * TGD_UNIT,
        };
        Ok(vec![
            NavRecord::new(
                sat,
                info.xmit,
                NavData::Health(Health::BdsD2(BdsD1Health {
                    header: hdr,
                    sat_h1: info.bit(42)?,
                })),
            ),
            NavRecord::new(sat, info.xmit, NavData::Isc(Isc::BdsD2(isc))),
        ])
    }

    /// Page 2: Klobuchar coefficients
    fn page2(info: &NavBits, hdr: BdsHeader) -> Result<NavRecord, BitRangeError> {
        let model = KlobucharModel {
            source: NavType::BdsD2,
            alpha: [
                info.scaled_signed(42, 8, -30)?,
                info.scaled_signed(50, 8, -27)?,
                info.scaled_signed(58, 8, -24)?,
                info.scaled_signed(66, 8, -24)?,
            ],
            beta: [
                info.scaled_signed(74, 8, 11)?,
                info.scaled_signed(82, 8, 14)?,
                info.scaled_signed(90, 8, 16)?,
                info.scaled_signed(98, 8, 16)?,
            ],
            preamble: hdr.preamble,
        };
        Ok(NavRecord::new(
            NavSatelliteID::own(info.sv, info.signal),
            info.xmit,
            NavData::Iono(Iono::Klobuchar(model)),
        ))
    }

    /// Page 1 opens a new sequence: held pages whose SOW does not
    /// follow `sow` are discarded.
    fn drop_stale_partial(&mut self, key: (SV, NavSignalID), sow: u32) -> Result<(), BitRangeError> {
        let slots = match self.ephemeris.get_mut(&key) {
            Some(slots) => slots,
            None => return Ok(()),
        };
        for (index, slot) in slots.iter_mut().enumerate().skip(1) {
            let stale = match slot {
                Some(held) => header(held)?.sow != sow + PAGE_PERIOD * index as u32,
                None => false,
            };
            if stale {
                debug!("{}: dropping stale d2 page {}", key.0, index + 1);
                *slot = None;
            }
        }
        Ok(())
    }

    /// Builds the ephemeris once pages 1 to 10 of consecutive frames
    /// are known.
    fn complete_ephemeris(&mut self, key: (SV, NavSignalID)) -> Result<Option<NavRecord>, BitRangeError> {
        let pages: Vec<NavBits> = match self.ephemeris.get(&key) {
            Some(slots) if slots.iter().all(Option::is_some) => slots.iter().flatten().cloned().collect(),
            _ => return Ok(None),
        };
        let mut headers = [BdsHeader::default(); PAGES];
        for (index, page) in pages.iter().enumerate() {
            headers[index] = header(page)?;
        }
        let consecutive = headers
            .windows(2)
            .all(|pair| pair[1].sow == pair[0].sow + PAGE_PERIOD);
        if !consecutive {
            debug!("{}: d2 pages not consecutive", key.0);
            return Ok(None);
        }
        let p: [NavBits; PAGES] = match pages.try_into() {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };
        self.ephemeris.remove(&key);

        let (xmit_week, _) = week_seconds(p[0].xmit, TimeScale::BDT);
        let wn = adjust_week_rollover(p[0].unsigned(52, 13)? as u32, xmit_week, 13);
        let reference = from_week_seconds(wn, headers[0].sow as f64, TimeScale::BDT);
        let toc = nearest_week_epoch(p[0].unsigned(65, 17)? as f64 * 8.0, reference, TimeScale::BDT);
        let toe = nearest_week_epoch(p[6].unsigned(68, 17)? as f64 * 8.0, reference, TimeScale::BDT);

        let sat_h1 = p[0].bit(42)?;
        let sqrt_a = p[5].scaled_unsigned(64, 32, -19)?;

        let mut orbit = KeplerOrbit::new(toe);
        orbit.toc = toc;
        orbit.af0 = p[2].scaled_signed(80, 24, -33)?;
        orbit.af1 = joined(&[(&p[2], 104, 4), (&p[3], 42, 18)])?.scaled_signed(0, 22, -50)?;
        orbit.af2 = p[3].scaled_signed(60, 11, -66)?;
        orbit.dn = p[3].semicircles(76, 16, -43)?;
        orbit.cuc = joined(&[(&p[3], 92, 14), (&p[4], 42, 4)])?.scaled_signed(0, 18, -31)?;
        orbit.m0 = p[4].semicircles(46, 32, -31)?;
        orbit.cus = p[4].scaled_signed(78, 18, -31)?;
        orbit.ecc = joined(&[(&p[4], 96, 10), (&p[5], 42, 22)])?.scaled_unsigned(0, 32, -33)?;
        orbit.a = sqrt_a * sqrt_a;
        orbit.cic = joined(&[(&p[5], 96, 10), (&p[6], 42, 8)])?.scaled_signed(0, 18, -31)?;
        orbit.cis = p[6].scaled_signed(50, 18, -31)?;
        orbit.i0 = joined(&[(&p[6], 85, 21), (&p[7], 42, 11)])?.semicircles(0, 32, -31)?;
        orbit.crc = p[7].scaled_signed(53, 18, -6)?;
        orbit.crs = p[7].scaled_signed(71, 18, -6)?;
        orbit.omega_dot = joined(&[(&p[7], 89, 19), (&p[8], 42, 5)])?.semicircles(0, 24, -43)?;
        orbit.omega0 = p[8].semicircles(47, 32, -31)?;
        orbit.w = joined(&[(&p[8], 79, 27), (&p[9], 42, 5)])?.semicircles(0, 32, -31)?;
        orbit.idot = p[9].semicircles(47, 14, -43)?;
        orbit.healthy = !sat_h1;

        let eph = BdsD2Ephemeris {
            orbit,
            headers,
            xmit: [
                p[0].xmit, p[1].xmit, p[2].xmit, p[3].xmit, p[4].xmit, p[5].xmit, p[6].xmit,
                p[7].xmit, p[8].xmit, p[9].xmit,
            ],
            aodc: p[0].unsigned(43, 5)? as u8,
            aode: p[3].unsigned(71, 5)? as u8,
            urai: p[0].unsigned(48, 4)? as u8,
            sat_h1,
            tgd1: p[0].signed(82, 10)? as f64 * TGD_UNIT,
            tgd2: p[0].signed(92, 10)? as f64 * TGD_UNIT,
        };
        debug!("{}: d2 ephemeris aode={} toe={}", key.0, eph.aode, toe);
        Ok(Some(NavRecord::new(
            NavSatelliteID::own(key.0, key.1),
            p[0].xmit,
            NavData::Ephemeris(Ephemeris::BdsD2(eph)),
        )))
    }
}

impl NavDecoder for BdsD2Decoder {
    fn signals(&self) -> &[NavSignalID] {
        &self.signals
    }

    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        check_unit(bits, &self.signals, SUBFRAME_BITS, &mut self.stats)?;
        if !is_beidou_geo(bits.sv) {
            self.stats.rejected += 1;
            return Err(DecodingError::UnexpectedSignal);
        }
        let key = (bits.sv, bits.signal);
        if let Some(word) = bds_check(bits)? {
            warn!("{}({}): d2 bch error on word {}", bits.sv, bits.xmit, word);
            self.stats.parity_errors += 1;
            self.ephemeris.remove(&key);
            return Err(DecodingError::Parity { word });
        }

        let info = information(bits)?;
        let hdr = header(&info)?;
        if hdr.fraid != 1 {
            debug!("{}: d2 subframe {} not handled", bits.sv, hdr.fraid);
            return Ok(Vec::new());
        }
        let pnum = page_number(&info)?;
        let mut records = match pnum {
            1 => {
                self.drop_stale_partial(key, hdr.sow)?;
                Self::page1(&info, hdr)?
            },
            2 => vec![Self::page2(&info, hdr)?],
            3..=10 => Vec::new(),
            _ => {
                debug!("{}: invalid d2 page number {}", bits.sv, pnum);
                return Ok(Vec::new());
            },
        };
        self.ephemeris.entry(key).or_default()[pnum as usize - 1] = Some(info);
        if let Some(eph) = self.complete_ephemeris(key)? {
            records.push(eph);
        }
        Ok(emit(records, self.filter, &mut self.stats))
    }

    fn reset(&mut self) {
        self.ephemeris.clear();
    }

    fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    fn set_type_filter(&mut self, types: NavMessageTypes) {
        self.filter = types;
    }
}
