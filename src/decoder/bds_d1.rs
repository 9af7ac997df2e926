//! BeiDou D1 (MEO/IGSO, B1I B2I B3I) decoder
use std::{collections::HashMap, f64::consts::PI};

use log::{debug, warn};

use crate::{
    bits::{BitRangeError, NavBits},
    decoder::{
        check_unit, checksum::bds_check, emit, leap_effectivity, DecoderStats, DecodingError,
        NavDecoder,
    },
    gnss_time::{adjust_week_rollover, from_week_seconds, nearest_week_epoch, week_seconds},
    identity::{NavMessageTypes, NavSatelliteID, NavSignalID, NavType},
    navigation::{
        is_beidou_geo, Almanac, BdsD1Almanac, BdsD1Ephemeris, BdsD1Health, BdsD1Isc, BdsHeader,
        Ephemeris, Health, Iono, Isc, KeplerOrbit, KlobucharModel, NavData, NavRecord,
        StdTimeOffset, TimeOffset,
    },
    prelude::{Constellation, Epoch, TimeScale, SV},
};

/// Subframe length, parity included
const SUBFRAME_BITS: usize = 300;

/// Subframe period (s)
const SUBFRAME_PERIOD: u32 = 6;

/// Group delays are broadcast in units of 0.1 ns
pub(super) const TGD_UNIT: f64 = 0.1E-9;

/// Time offsets to GPS and Galileo are broadcast in units of 0.1 ns
const GNSS_OFFSET_UNIT: f64 = 0.1E-9;

/// Almanac reference inclination of MEO and IGSO satellites (semicircles)
const I_REF: f64 = 0.30;

/// Subframe 5 page 8 content, kept per transmitting satellite to
/// complete the almanac pages with their reference week.
#[derive(Debug, Clone)]
struct AlmanacReference {
    xmit: Epoch,
    /// toa, second of week
    toa: f64,
    /// Full week of the almanac
    wna: u32,
}

/// Strips the BCH parity: 26 information bits of word 1 then 22 for
/// each of the nine following words. Every field position of this
/// module refers to that 224 bit information stream.
pub(super) fn information(bits: &NavBits) -> Result<NavBits, BitRangeError> {
    let mut info = NavBits::new(bits.sv, bits.signal, bits.xmit);
    info.station = bits.station.clone();
    info.push_range(bits, 0, 26)?;
    for word in 1..10 {
        info.push_range(bits, word * 30, 22)?;
    }
    Ok(info.seal())
}

pub(super) fn header(info: &NavBits) -> Result<BdsHeader, BitRangeError> {
    Ok(BdsHeader {
        preamble: info.unsigned(0, 11)? as u16,
        rev: info.unsigned(11, 4)? as u8,
        fraid: info.unsigned(15, 3)? as u8,
        sow: info.unsigned(18, 20)? as u32,
    })
}

/// Almanac page subject: subframe 4 pages 1-24 then subframe 5 pages 1-6
fn page_svid(hdr: &BdsHeader, pnum: u8) -> Option<u8> {
    match (hdr.fraid, pnum) {
        (4, 1..=24) => Some(pnum),
        (5, 1..=6) => Some(pnum + 24),
        _ => None,
    }
}

fn page_toa(info: &NavBits) -> Result<f64, BitRangeError> {
    Ok(info.unsigned(149, 8)? as f64 * 4096.0)
}

/// [BdsD1Decoder] decodes 300 bit D1 subframes (de-interleaved, parity
/// included). GEO satellites broadcast D2 and are rejected.
#[derive(Debug)]
pub struct BdsD1Decoder {
    signals: Vec<NavSignalID>,
    stats: DecoderStats,
    filter: NavMessageTypes,
    /// Subframes 1, 2 and 3 (information streams), per satellite and signal
    ephemeris: HashMap<(SV, NavSignalID), [Option<NavBits>; 3]>,
    /// Almanac pages waiting for subframe 5 page 8
    almanac: HashMap<(SV, NavSignalID), Vec<NavBits>>,
    /// Latest subframe 5 page 8
    references: HashMap<(SV, NavSignalID), AlmanacReference>,
}

impl Default for BdsD1Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BdsD1Decoder {
    pub fn new() -> Self {
        Self {
            signals: vec![
                NavSignalID::bds_d1_b1(),
                NavSignalID::bds_d1_b2(),
                NavSignalID::bds_d1_b3(),
            ],
            stats: DecoderStats::default(),
            filter: NavMessageTypes::all(),
            ephemeris: HashMap::new(),
            almanac: HashMap::new(),
            references: HashMap::new(),
        }
    }

    /// Subframe 1: health, group delays and iono are emitted right away
    fn subframe1(info: &NavBits, hdr: BdsHeader) -> Result<Vec<NavRecord>, BitRangeError> {
        let sat = NavSatelliteID::own(info.sv, info.signal);
        let model = KlobucharModel {
            source: NavType::BdsD1,
            alpha: [
                info.scaled_signed(98, 8, -30)?,
                info.scaled_signed(106, 8, -27)?,
                info.scaled_signed(114, 8, -24)?,
                info.scaled_signed(122, 8, -24)?,
            ],
            beta: [
                info.scaled_signed(130, 8, 11)?,
                info.scaled_signed(138, 8, 14)?,
                info.scaled_signed(146, 8, 16)?,
                info.scaled_signed(154, 8, 16)?,
            ],
            preamble: hdr.preamble,
        };
        let isc = BdsD1Isc {
            header: hdr,
            tgd1: info.signed(78, 10)? as f64 * TGD_UNIT,
            tgd2: info.signed(88, 10)? as f64 * TGD_UNIT,
        };
        Ok(vec![
            NavRecord::new(
                sat,
                info.xmit,
                NavData::Health(Health::BdsD1(BdsD1Health {
                    header: hdr,
                    sat_h1: info.bit(38)?,
                })),
            ),
            NavRecord::new(sat, info.xmit, NavData::Isc(Isc::BdsD1(isc))),
            NavRecord::new(sat, info.xmit, NavData::Iono(Iono::Klobuchar(model))),
        ])
    }

    /// Subframe 1 opens a new frame: held subframes 2 and 3 whose SOW
    /// does not follow `sow` are discarded.
    fn drop_stale_partial(&mut self, key: (SV, NavSignalID), sow: u32) -> Result<(), BitRangeError> {
        let slots = match self.ephemeris.get_mut(&key) {
            Some(slots) => slots,
            None => return Ok(()),
        };
        for (index, slot) in slots.iter_mut().enumerate().skip(1) {
            let stale = match slot {
                Some(held) => header(held)?.sow != sow + SUBFRAME_PERIOD * index as u32,
                None => false,
            };
            if stale {
                debug!("{}: dropping stale d1 subframe {}", key.0, index + 1);
                *slot = None;
            }
        }
        Ok(())
    }

    /// Builds the ephemeris once three consecutive subframes 1, 2 and
    /// 3 are known. D1 has no issue of data to match them.
    fn complete_ephemeris(&mut self, key: (SV, NavSignalID)) -> Result<Option<NavRecord>, BitRangeError> {
        let complete = match self.ephemeris.get(&key) {
            Some([Some(sf1), Some(sf2), Some(sf3)]) => {
                let (h1, h2, h3) = (header(sf1)?, header(sf2)?, header(sf3)?);
                if h2.sow == h1.sow + SUBFRAME_PERIOD && h3.sow == h2.sow + SUBFRAME_PERIOD {
                    Some((sf1.clone(), sf2.clone(), sf3.clone(), [h1, h2, h3]))
                } else {
                    debug!("{}: d1 subframes not consecutive", key.0);
                    None
                }
            },
            _ => None,
        };
        let (sf1, sf2, sf3, headers) = match complete {
            Some(sf) => sf,
            None => return Ok(None),
        };
        self.ephemeris.remove(&key);

        let (xmit_week, _) = week_seconds(sf1.xmit, TimeScale::BDT);
        let wn = adjust_week_rollover(sf1.unsigned(48, 13)? as u32, xmit_week, 13);
        let reference = from_week_seconds(wn, headers[0].sow as f64, TimeScale::BDT);
        let toc = nearest_week_epoch(sf1.unsigned(61, 17)? as f64 * 8.0, reference, TimeScale::BDT);
        let toe_raw = (sf2.unsigned(222, 2)? << 15) | sf3.unsigned(38, 15)?;
        let toe = nearest_week_epoch(toe_raw as f64 * 8.0, reference, TimeScale::BDT);

        let sat_h1 = sf1.bit(38)?;
        let sqrt_a = sf2.scaled_unsigned(190, 32, -19)?;

        let mut orbit = KeplerOrbit::new(toe);
        orbit.toc = toc;
        orbit.af2 = sf1.scaled_signed(162, 11, -66)?;
        orbit.af0 = sf1.scaled_signed(173, 24, -33)?;
        orbit.af1 = sf1.scaled_signed(197, 22, -50)?;
        orbit.dn = sf2.semicircles(38, 16, -43)?;
        orbit.cuc = sf2.scaled_signed(54, 18, -31)?;
        orbit.m0 = sf2.semicircles(72, 32, -31)?;
        orbit.ecc = sf2.scaled_unsigned(104, 32, -33)?;
        orbit.cus = sf2.scaled_signed(136, 18, -31)?;
        orbit.crc = sf2.scaled_signed(154, 18, -6)?;
        orbit.crs = sf2.scaled_signed(172, 18, -6)?;
        orbit.a = sqrt_a * sqrt_a;
        orbit.i0 = sf3.semicircles(53, 32, -31)?;
        orbit.cic = sf3.scaled_signed(85, 18, -31)?;
        orbit.omega_dot = sf3.semicircles(103, 24, -43)?;
        orbit.cis = sf3.scaled_signed(127, 18, -31)?;
        orbit.idot = sf3.semicircles(145, 14, -43)?;
        orbit.omega0 = sf3.semicircles(159, 32, -31)?;
        orbit.w = sf3.semicircles(191, 32, -31)?;
        orbit.healthy = !sat_h1;

        let eph = BdsD1Ephemeris {
            orbit,
            headers,
            xmit: [sf1.xmit, sf2.xmit, sf3.xmit],
            aodc: sf1.unsigned(39, 5)? as u8,
            aode: sf1.unsigned(219, 5)? as u8,
            urai: sf1.unsigned(44, 4)? as u8,
            sat_h1,
            tgd1: sf1.signed(78, 10)? as f64 * TGD_UNIT,
            tgd2: sf1.signed(88, 10)? as f64 * TGD_UNIT,
        };
        debug!("{}: d1 ephemeris aode={} toe={}", key.0, eph.aode, toe);
        Ok(Some(NavRecord::new(
            NavSatelliteID::own(key.0, key.1),
            sf1.xmit,
            NavData::Ephemeris(Ephemeris::BdsD1(eph)),
        )))
    }

    /// Builds one almanac from its page, referenced by subframe 5 page 8.
    /// Default (empty) pages give nothing.
    fn almanac(page: &NavBits, reference: &AlmanacReference) -> Result<Option<NavRecord>, BitRangeError> {
        let hdr = header(page)?;
        let svid = match page_svid(&hdr, page.unsigned(39, 7)? as u8) {
            Some(svid) => svid,
            None => return Ok(None),
        };
        let sqrt_a = page.scaled_unsigned(46, 24, -11)?;
        if sqrt_a == 0.0 {
            return Ok(None);
        }
        let subject = SV::new(Constellation::BeiDou, svid);
        let toa = from_week_seconds(reference.wna, reference.toa, TimeScale::BDT);
        let delta_i = page.scaled_signed(133, 16, -19)?;

        let mut orbit = KeplerOrbit::new(toa);
        orbit.a = sqrt_a * sqrt_a;
        orbit.af1 = page.scaled_signed(70, 11, -38)?;
        orbit.af0 = page.scaled_signed(81, 11, -20)?;
        orbit.omega0 = page.semicircles(92, 24, -23)?;
        orbit.ecc = page.scaled_unsigned(116, 17, -21)?;
        orbit.i0 = if is_beidou_geo(subject) {
            delta_i * PI
        } else {
            (I_REF + delta_i) * PI
        };
        orbit.omega_dot = page.semicircles(157, 17, -38)?;
        orbit.w = page.semicircles(174, 24, -23)?;
        orbit.m0 = page.semicircles(198, 24, -23)?;

        Ok(Some(NavRecord::new(
            NavSatelliteID::new(subject, page.sv, page.signal),
            page.xmit,
            NavData::Almanac(Almanac::BdsD1(BdsD1Almanac {
                orbit,
                header: hdr,
                xmit: page.xmit,
            })),
        )))
    }

    /// Subframe 5 page 9: BDT to GPST and GST
    fn gnss_offsets(info: &NavBits, hdr: BdsHeader) -> Result<Vec<NavRecord>, BitRangeError> {
        let (week, _) = week_seconds(info.xmit, TimeScale::BDT);
        let ref_time = from_week_seconds(week, 0.0, TimeScale::BDT);
        let sat = NavSatelliteID::own(info.sv, info.signal);
        let mut records = Vec::with_capacity(2);
        for (tgt, a0, a1) in [(TimeScale::GPST, 76, 90), (TimeScale::GST, 106, 120)] {
            let offset = StdTimeOffset {
                source: NavType::BdsD1,
                src: TimeScale::BDT,
                tgt,
                a0: info.signed(a0, 14)? as f64 * GNSS_OFFSET_UNIT,
                a1: info.signed(a1, 16)? as f64 * GNSS_OFFSET_UNIT,
                a2: 0.0,
                ref_time,
                delta_t_ls: 0.0,
                delta_t_lsf: 0.0,
                effectivity: ref_time,
                wn_lsf: 0,
                dn: 0,
                tot: 0.0,
                preamble: hdr.preamble,
            };
            records.push(NavRecord::new(
                sat,
                info.xmit,
                NavData::TimeOffset(TimeOffset::Std(offset)),
            ));
        }
        Ok(records)
    }

    /// Subframe 5 page 10: BDT to UTC. D1 broadcasts no reference
    /// time, the start of the transmit week is used.
    fn utc_offset(info: &NavBits, hdr: BdsHeader) -> Result<NavRecord, BitRangeError> {
        let (week, _) = week_seconds(info.xmit, TimeScale::BDT);
        let wn_lsf = adjust_week_rollover(info.unsigned(62, 8)? as u32, week, 8);
        let dn = info.unsigned(126, 8)? as u8;
        let offset = StdTimeOffset {
            source: NavType::BdsD1,
            src: TimeScale::BDT,
            tgt: TimeScale::UTC,
            a0: info.scaled_signed(70, 32, -30)?,
            a1: info.scaled_signed(102, 24, -50)?,
            a2: 0.0,
            ref_time: from_week_seconds(week, 0.0, TimeScale::BDT),
            delta_t_ls: info.signed(46, 8)? as f64,
            delta_t_lsf: info.signed(54, 8)? as f64,
            effectivity: leap_effectivity(wn_lsf, dn as u32, TimeScale::BDT),
            wn_lsf,
            dn,
            tot: 0.0,
            preamble: hdr.preamble,
        };
        Ok(NavRecord::new(
            NavSatelliteID::own(info.sv, info.signal),
            info.xmit,
            NavData::TimeOffset(TimeOffset::Std(offset)),
        ))
    }

    /// Subframes 4 and 5
    fn pages(&mut self, info: &NavBits, hdr: BdsHeader) -> Result<Vec<NavRecord>, BitRangeError> {
        let key = (info.sv, info.signal);
        let pnum = info.unsigned(39, 7)? as u8;
        let mut records = Vec::new();
        if page_svid(&hdr, pnum).is_some() {
            let toa = page_toa(info)?;
            match self.references.get(&key) {
                Some(reference) if reference.toa == toa => {
                    records.extend(Self::almanac(info, reference)?);
                },
                _ => {
                    let pending = self.almanac.entry(key).or_default();
                    pending.retain(|page| {
                        header(page).ok().map(|h| h.fraid) != Some(hdr.fraid)
                            || page.unsigned(39, 7).ok() != Some(pnum as u64)
                    });
                    pending.push(info.clone());
                },
            }
            return Ok(records);
        }
        if hdr.fraid != 5 {
            return Ok(records);
        }
        match pnum {
            8 => {
                let (week, _) = week_seconds(info.xmit, TimeScale::BDT);
                let reference = AlmanacReference {
                    xmit: info.xmit,
                    toa: info.unsigned(153, 8)? as f64 * 4096.0,
                    wna: adjust_week_rollover(info.unsigned(145, 8)? as u32, week, 8),
                };
                let pending = self.almanac.remove(&key).unwrap_or_default();
                let mut waiting = Vec::new();
                for page in pending {
                    if page_toa(&page)? == reference.toa {
                        records.extend(Self::almanac(&page, &reference)?);
                    } else {
                        waiting.push(page);
                    }
                }
                if !waiting.is_empty() {
                    self.almanac.insert(key, waiting);
                }
                debug!("{}: d1 almanac reference wna={} toa={}", info.sv, reference.wna, reference.toa);
                self.references.insert(key, reference);
            },
            9 => records.extend(Self::gnss_offsets(info, hdr)?),
            10 => records.push(Self::utc_offset(info, hdr)?),
            _ => debug!("{}: d1 subframe 5 page {} not handled", info.sv, pnum),
        }
        Ok(records)
    }
}

impl NavDecoder for BdsD1Decoder {
    fn signals(&self) -> &[NavSignalID] {
        &self.signals
    }

    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        check_unit(bits, &self.signals, SUBFRAME_BITS, &mut self.stats)?;
        if is_beidou_geo(bits.sv) {
            self.stats.rejected += 1;
            return Err(DecodingError::UnexpectedSignal);
        }
        let key = (bits.sv, bits.signal);
        if let Some(word) = bds_check(bits)? {
            warn!("{}({}): d1 bch error on word {}", bits.sv, bits.xmit, word);
            self.stats.parity_errors += 1;
            self.ephemeris.remove(&key);
            return Err(DecodingError::Parity { word });
        }

        let info = information(bits)?;
        let hdr = header(&info)?;
        let records = match hdr.fraid {
            1..=3 => {
                let index = (hdr.fraid - 1) as usize;
                let mut records = Vec::new();
                if index == 0 {
                    records = Self::subframe1(&info, hdr)?;
                    self.drop_stale_partial(key, hdr.sow)?;
                }
                self.ephemeris.entry(key).or_default()[index] = Some(info);
                if let Some(eph) = self.complete_ephemeris(key)? {
                    records.push(eph);
                }
                records
            },
            4 | 5 => self.pages(&info, hdr)?,
            _ => {
                debug!("{}: invalid d1 subframe id {}", bits.sv, hdr.fraid);
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::Duration;
    #[test]
    fn geo_satellites_rejected() {
        let mut decoder = BdsD1Decoder::new();
        let t = Epoch::from_gregorian_at_midnight(2024, 1, 1, TimeScale::BDT);
        let geo = SV::new(Constellation::BeiDou, 3);
        let bits = NavBits::from_bools(geo, NavSignalID::bds_d1_b1(), t, &[false; SUBFRAME_BITS]);
        assert_eq!(decoder.decode(&bits), Err(DecodingError::UnexpectedSignal));
        assert_eq!(decoder.stats().rejected, 1);
    }
    #[test]
    fn stale_partial_dropped() {
        use crate::tests::toolkit::{bds_subframe, beidou, unit};
        let mut decoder = BdsD1Decoder::new();
        let t = Epoch::from_gregorian_at_midnight(2024, 1, 1, TimeScale::BDT);
        let signal = NavSignalID::bds_d1_b1();
        let key = (beidou(11), signal);
        let subframe = |fraid: u64, sow: u64| {
            let bits = bds_subframe(&[(0, 11, 0x712), (15, 3, fraid), (18, 20, sow)]);
            unit(beidou(11), signal, t + Duration::from_seconds(sow as f64), &bits)
        };

        decoder.decode(&subframe(2, 106)).unwrap();
        decoder.decode(&subframe(3, 112)).unwrap();
        decoder.decode(&subframe(3, 142)).unwrap();
        assert!(decoder.ephemeris.get(&key).is_some());

        // subframe 3 (sow 142) follows this new subframe 1, subframe 2 does not
        decoder.decode(&subframe(1, 130)).unwrap();
        match decoder.ephemeris.get(&key) {
            Some([Some(sf1), None, Some(sf3)]) => {
                assert_eq!(header(sf1).unwrap().sow, 130);
                assert_eq!(header(sf3).unwrap().sow, 142);
            },
            other => panic!("unexpected partial {:?}", other.is_some()),
        }
    }

    #[test]
    fn almanac_subjects() {
        let hdr = |fraid| BdsHeader {
            fraid,
            ..Default::default()
        };
        assert_eq!(page_svid(&hdr(4), 1), Some(1));
        assert_eq!(page_svid(&hdr(4), 24), Some(24));
        assert_eq!(page_svid(&hdr(5), 6), Some(30));
        assert_eq!(page_svid(&hdr(5), 7), None);
        assert_eq!(page_svid(&hdr(4), 25), None);
    }
}
