//! Galileo I/NAV (E1-B, E5b-I) decoder, and the almanac layout
//! shared with F/NAV.
use std::{collections::HashMap, f64::consts::PI};

use log::{debug, warn};
use num_traits::FromPrimitive;

use crate::{
    bits::{BitRangeError, NavBits},
    decoder::{check_unit, checksum::crc24q, emit, leap_effectivity, DecoderStats, DecodingError, NavDecoder},
    gnss_time::{adjust_week_rollover, from_week_seconds, nearest_week_epoch, week_seconds},
    identity::{NavMessageTypes, NavSatelliteID, NavSignalID, NavType, TrackingCode, Wild},
    navigation::{
        galileo_health, Almanac, Ephemeris, GalAlmanac, GalDataValidity, GalHealth,
        GalHealthStatus, GalInavEphemeris, GalIsc, Health, Iono, Isc, KeplerOrbit, NavData,
        NavRecord, NeQuickModel, NeQuickRegions, SVHealth, StdTimeOffset, TimeOffset,
    },
    prelude::{Constellation, TimeScale, SV},
};

/// Even and odd page
const PAGE_PAIR_BITS: usize = 240;

/// Odd page start
const ODD: usize = 120;

/// CRC position, within the page pair
const CRC_START: usize = ODD + 82;

/// Word types making up an ephemeris
const EPHEMERIS_WORDS: usize = 5;

/// Nominal almanac semi major axis square root (m^1/2)
pub(super) const SQRT_A_NOMINAL: f64 = 5_440.588_203_494_177;

/// Nominal almanac inclination (deg)
pub(super) const I_NOMINAL_DEG: f64 = 56.0;

/// Position of one almanac field: (unit index, start, width)
pub(super) type Field = (usize, usize, usize);

/// Where the fields of one satellite almanac sit, within the two
/// units carrying it.
#[derive(Debug, Clone, Copy)]
pub(super) struct AlmanacLayout {
    /// The unit giving WNa and t0a
    pub toa_unit: usize,
    pub svid: Field,
    pub delta_sqrt_a: Field,
    pub ecc: Field,
    pub omega: Field,
    pub delta_i: Field,
    /// Ω0 may be split over both units
    pub omega0: &'static [Field],
    pub omega_dot: Field,
    pub m0: Field,
    pub af0: Field,
    pub af1: Field,
    /// Health status fields (E5b, E1-B) for I/NAV, (E5a) for F/NAV
    pub health: &'static [Field],
}

/// Reads one field of the almanac units
fn field<'a>(units: &[&'a NavBits], f: Field) -> Result<&'a NavBits, BitRangeError> {
    units.get(f.0).copied().ok_or(BitRangeError::OutOfBounds {
        start: f.1,
        len: f.2,
        size: 0,
    })
}

fn unsigned(units: &[&NavBits], f: Field) -> Result<u64, BitRangeError> {
    field(units, f)?.unsigned(f.1, f.2)
}

fn signed(units: &[&NavBits], f: Field, pow2: i32) -> Result<f64, BitRangeError> {
    field(units, f)?.scaled_signed(f.1, f.2, pow2)
}

/// Builds a Galileo almanac orbit from its layout. `units` are the two
/// units carrying it, `wna_t0a` the positions of WNa (2 bits) and
/// t0a (10 bits) in the unit designated by the layout.
/// Returns the subject SVID, the orbit and the raw health statuses.
pub(super) fn galileo_almanac(
    units: &[&NavBits],
    layout: &AlmanacLayout,
    wna_t0a: (usize, usize),
) -> Result<(u8, KeplerOrbit, Vec<GalHealthStatus>), BitRangeError> {
    let reference = field(units, (layout.toa_unit, wna_t0a.0, 2))?;
    let (week, _) = week_seconds(reference.xmit, TimeScale::GST);
    let wna = adjust_week_rollover(reference.unsigned(wna_t0a.0, 2)? as u32, week, 2);
    let t0a = reference.unsigned(wna_t0a.1, 10)? as f64 * 600.0;
    let toa = from_week_seconds(wna, t0a, TimeScale::GST);

    let svid = unsigned(units, layout.svid)? as u8;
    let sqrt_a = SQRT_A_NOMINAL + signed(units, layout.delta_sqrt_a, -9)?;

    let mut omega0 = 0_i64;
    let mut width = 0;
    for f in layout.omega0.iter() {
        omega0 = (omega0 << f.2) | unsigned(units, *f)? as i64;
        width += f.2;
    }
    if width > 0 && omega0 >> (width - 1) > 0 {
        omega0 -= 1 << width;
    }

    let mut orbit = KeplerOrbit::new(toa);
    orbit.a = sqrt_a * sqrt_a;
    orbit.ecc = unsigned(units, layout.ecc)? as f64 * 2.0_f64.powi(-16);
    orbit.w = signed(units, layout.omega, -15)? * PI;
    orbit.i0 = I_NOMINAL_DEG.to_radians() + signed(units, layout.delta_i, -14)? * PI;
    orbit.omega0 = omega0 as f64 * 2.0_f64.powi(-15) * PI;
    orbit.omega_dot = signed(units, layout.omega_dot, -33)? * PI;
    orbit.m0 = signed(units, layout.m0, -15)? * PI;
    orbit.af0 = signed(units, layout.af0, -19)?;
    orbit.af1 = signed(units, layout.af1, -38)?;

    let mut health = Vec::with_capacity(layout.health.len());
    for f in layout.health.iter() {
        health.push(GalHealthStatus::from_u64(unsigned(units, *f)?).unwrap_or_default());
    }
    orbit.healthy = health.iter().all(|hs| *hs == GalHealthStatus::OK);
    Ok((svid, orbit, health))
}

/// I/NAV almanacs: SV1 in words 7 and 8, SV2 in 8 and 9, SV3 in 9 and 10
const INAV_ALMANACS: [(usize, AlmanacLayout); 3] = [
    (
        7,
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
            af0: (1, 10, 16),
            af1: (1, 26, 13),
            health: &[(1, 39, 2), (1, 41, 2)],
        },
    ),
    (
        8,
        AlmanacLayout {
            toa_unit: 1,
            svid: (0, 43, 6),
            delta_sqrt_a: (0, 49, 13),
            ecc: (0, 62, 11),
            omega: (0, 73, 16),
            delta_i: (0, 89, 11),
            omega0: &[(0, 100, 16)],
            omega_dot: (0, 116, 11),
            m0: (1, 22, 16),
            af0: (1, 38, 16),
            af1: (1, 54, 13),
            health: &[(1, 67, 2), (1, 69, 2)],
        },
    ),
    (
        9,
        AlmanacLayout {
            toa_unit: 0,
            svid: (0, 71, 6),
            delta_sqrt_a: (0, 77, 13),
            ecc: (0, 90, 11),
            omega: (0, 101, 16),
            delta_i: (0, 117, 11),
            omega0: &[(1, 10, 16)],
            omega_dot: (1, 26, 11),
            m0: (1, 37, 16),
            af0: (1, 53, 16),
            af1: (1, 69, 13),
            health: &[(1, 82, 2), (1, 84, 2)],
        },
    ),
];

/// Words of one satellite and signal, indexed by word type
type Words = [Option<NavBits>; 11];

/// [GalInavDecoder] decodes I/NAV nominal page pairs (even page then
/// odd page, 120 bits each, tail bits included).
#[derive(Debug)]
pub struct GalInavDecoder {
    signals: Vec<NavSignalID>,
    stats: DecoderStats,
    filter: NavMessageTypes,
    words: HashMap<(SV, NavSignalID), Words>,
    /// Latest SISA index (word type 3)
    sisa: HashMap<(SV, NavSignalID), u8>,
}

impl Default for GalInavDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GalInavDecoder {
    pub fn new() -> Self {
        Self {
            signals: vec![NavSignalID::gal_inav_e1b(), NavSignalID::gal_inav_e5b()],
            stats: DecoderStats::default(),
            filter: NavMessageTypes::all(),
            words: HashMap::new(),
            sisa: HashMap::new(),
        }
    }

    /// Reassembles the 128 bit data word of a page pair
    fn word(bits: &NavBits) -> Result<NavBits, BitRangeError> {
        let mut word = NavBits::new(bits.sv, bits.signal, bits.xmit);
        word.station = bits.station.clone();
        word.push_range(bits, 2, 112)?;
        word.push_range(bits, ODD + 2, 16)?;
        Ok(word.seal())
    }

    fn crc_ok(bits: &NavBits) -> Result<bool, BitRangeError> {
        let covered = (0..114)
            .chain(ODD..ODD + 82)
            .map(|i| bits.bit(i))
            .collect::<Result<Vec<bool>, _>>()?;
        Ok(crc24q(covered) == bits.unsigned(CRC_START, 24)? as u32)
    }

    /// Word type 5 records: iono, group delays and, once word type 3
    /// gave the SISA, per signal health.
    fn word5(w5: &NavBits, sisa: Option<u8>) -> Result<Vec<NavRecord>, BitRangeError> {
        let sat = NavSatelliteID::own(w5.sv, w5.signal);
        let iono = nequick(w5, 6, NavType::GalInav)?;
        let isc = GalIsc {
            bgd_e1e5a: Some(w5.scaled_signed(47, 10, -32)?),
            bgd_e1e5b: Some(w5.scaled_signed(57, 10, -32)?),
        };
        let mut records = vec![
            NavRecord::new(sat, w5.xmit, NavData::Iono(Iono::NeQuick(iono))),
            NavRecord::new(sat, w5.xmit, NavData::Isc(Isc::GalInav(isc))),
        ];
        if let Some(sisa) = sisa {
            for (signal, hs, dvs) in [
                (NavSignalID::gal_inav_e5b(), 67, 71),
                (NavSignalID::gal_inav_e1b(), 69, 72),
            ] {
                let health = GalHealth {
                    status: GalHealthStatus::from_u64(w5.unsigned(hs, 2)?).unwrap_or_default(),
                    dvs: GalDataValidity::from_u64(w5.unsigned(dvs, 1)?).unwrap_or_default(),
                    sisa,
                };
                records.push(NavRecord::new(
                    NavSatelliteID::own(w5.sv, signal),
                    w5.xmit,
                    NavData::Health(Health::GalInav(health)),
                ));
            }
        }
        Ok(records)
    }

    /// Builds the ephemeris once words 1 to 4 share the same IODnav
    /// and word 5 is known.
    fn complete_ephemeris(&mut self, key: (SV, NavSignalID)) -> Result<Option<NavRecord>, BitRangeError> {
        let words = match self.words.get_mut(&key) {
            Some(words) => words,
            None => return Ok(None),
        };
        let (w1, w2, w3, w4, w5) = match (&words[1], &words[2], &words[3], &words[4], &words[5]) {
            (Some(w1), Some(w2), Some(w3), Some(w4), Some(w5)) => (w1, w2, w3, w4, w5),
            _ => return Ok(None),
        };
        let iod = w1.unsigned(6, 10)?;
        if w2.unsigned(6, 10)? != iod || w3.unsigned(6, 10)? != iod || w4.unsigned(6, 10)? != iod {
            return Ok(None);
        }

        let toe = nearest_week_epoch(w1.unsigned(16, 14)? as f64 * 60.0, w1.xmit, TimeScale::GST);
        let toc = nearest_week_epoch(w4.unsigned(54, 14)? as f64 * 60.0, w4.xmit, TimeScale::GST);
        let sqrt_a = w1.scaled_unsigned(94, 32, -19)?;
        let sisa = w3.unsigned(120, 8)? as u8;

        let hs_e5b = GalHealthStatus::from_u64(w5.unsigned(67, 2)?).unwrap_or_default();
        let hs_e1b = GalHealthStatus::from_u64(w5.unsigned(69, 2)?).unwrap_or_default();
        let dvs_e5b = GalDataValidity::from_u64(w5.unsigned(71, 1)?).unwrap_or_default();
        let dvs_e1b = GalDataValidity::from_u64(w5.unsigned(72, 1)?).unwrap_or_default();

        let mut orbit = KeplerOrbit::new(toe);
        orbit.toc = toc;
        orbit.m0 = w1.semicircles(30, 32, -31)?;
        orbit.ecc = w1.scaled_unsigned(62, 32, -33)?;
        orbit.a = sqrt_a * sqrt_a;
        orbit.omega0 = w2.semicircles(16, 32, -31)?;
        orbit.i0 = w2.semicircles(48, 32, -31)?;
        orbit.w = w2.semicircles(80, 32, -31)?;
        orbit.idot = w2.semicircles(112, 14, -43)?;
        orbit.omega_dot = w3.semicircles(16, 24, -43)?;
        orbit.dn = w3.semicircles(40, 16, -43)?;
        orbit.cuc = w3.scaled_signed(56, 16, -29)?;
        orbit.cus = w3.scaled_signed(72, 16, -29)?;
        orbit.crc = w3.scaled_signed(88, 16, -5)?;
        orbit.crs = w3.scaled_signed(104, 16, -5)?;
        orbit.cic = w4.scaled_signed(22, 16, -29)?;
        orbit.cis = w4.scaled_signed(38, 16, -29)?;
        orbit.af0 = w4.scaled_signed(68, 31, -34)?;
        orbit.af1 = w4.scaled_signed(99, 21, -46)?;
        orbit.af2 = w4.scaled_signed(120, 6, -59)?;
        let health = match key.1.code {
            Wild::Exact(TrackingCode::E5bI) => galileo_health(hs_e5b, dvs_e5b, sisa),
            _ => galileo_health(hs_e1b, dvs_e1b, sisa),
        };
        orbit.healthy = health == SVHealth::Healthy;

        let eph = GalInavEphemeris {
            orbit,
            xmit: [w1.xmit, w2.xmit, w3.xmit, w4.xmit, w5.xmit],
            iod_nav: iod as u16,
            sisa,
            bgd_e1e5a: w5.scaled_signed(47, 10, -32)?,
            bgd_e1e5b: w5.scaled_signed(57, 10, -32)?,
            hs_e1b,
            hs_e5b,
            dvs_e1b,
            dvs_e5b,
        };
        let first = eph.xmit.iter().copied().min().unwrap_or(w1.xmit);
        // word type 5 stays, it also feeds health and group delays
        for slot in words.iter_mut().take(EPHEMERIS_WORDS).skip(1) {
            *slot = None;
        }
        debug!("{}: i/nav ephemeris iod={} toe={}", key.0, iod, toe);
        Ok(Some(NavRecord::new(
            NavSatelliteID::own(key.0, key.1),
            first,
            NavData::Ephemeris(Ephemeris::GalInav(eph)),
        )))
    }

    /// Almanacs completed by the arrival of word type `wt`
    fn almanacs(&self, key: (SV, NavSignalID), wt: usize) -> Result<Vec<NavRecord>, BitRangeError> {
        let words = match self.words.get(&key) {
            Some(words) => words,
            None => return Ok(Vec::new()),
        };
        let mut records = Vec::new();
        for (first, layout) in INAV_ALMANACS.iter() {
            // words are broadcast in ascending order, the second one completes
            if wt != first + 1 {
                continue;
            }
            let (a, b) = match (&words[*first], &words[first + 1]) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            let ioda = a.unsigned(6, 4)?;
            if b.unsigned(6, 4)? != ioda {
                continue;
            }
            let units = [a, b];
            let (svid, orbit, health) = galileo_almanac(&units, layout, (10, 12))?;
            if svid == 0 {
                continue;
            }
            records.push(NavRecord::new(
                NavSatelliteID::new(SV::new(Constellation::Galileo, svid), key.0, key.1),
                a.xmit.min(b.xmit),
                NavData::Almanac(Almanac::GalInav(GalAlmanac {
                    orbit,
                    xmit: [a.xmit, b.xmit],
                    ioda: ioda as u8,
                    hs_e5b: health.first().copied(),
                    hs_e1b: health.get(1).copied(),
                    hs_e5a: None,
                })),
            ));
        }
        Ok(records)
    }

    /// Word types 6 (GST to UTC) and 10 (GST to GPST)
    fn time_offset(word: &NavBits, wt: usize) -> Result<NavRecord, BitRangeError> {
        let offset = if wt == 6 {
            gst_utc(word, [6, 38, 62, 70, 78, 86, 94, 97], NavType::GalInav)?
        } else {
            gst_gps(word, [86, 102, 114, 122], NavType::GalInav)?
        };
        Ok(NavRecord::new(
            NavSatelliteID::own(word.sv, word.signal),
            word.xmit,
            NavData::TimeOffset(TimeOffset::Std(offset)),
        ))
    }
}

/// NeQuick coefficients and disturbance flags, laid out from `start`
pub(super) fn nequick(bits: &NavBits, start: usize, source: NavType) -> Result<NeQuickModel, BitRangeError> {
    let mut regions = NeQuickRegions::empty();
    for k in 0..5 {
        if bits.bit(start + 36 + k)? {
            regions |= NeQuickRegions::from_bits_truncate(1 << k);
        }
    }
    Ok(NeQuickModel {
        source,
        ai: [
            bits.scaled_unsigned(start, 11, -2)?,
            bits.scaled_signed(start + 11, 11, -8)?,
            bits.scaled_signed(start + 22, 14, -15)?,
        ],
        regions,
    })
}

/// GST to GPST parameters. `at` gives the positions of A0G, A1G,
/// t0G and WN0G.
pub(super) fn gst_gps(bits: &NavBits, at: [usize; 4], source: NavType) -> Result<StdTimeOffset, BitRangeError> {
    let (week, _) = week_seconds(bits.xmit, TimeScale::GST);
    let tot = bits.unsigned(at[2], 8)? as f64 * 3600.0;
    let wn = adjust_week_rollover(bits.unsigned(at[3], 6)? as u32, week, 6);
    let ref_time = from_week_seconds(wn, tot, TimeScale::GST);
    Ok(StdTimeOffset {
        source,
        src: TimeScale::GST,
        tgt: TimeScale::GPST,
        a0: bits.scaled_signed(at[0], 16, -35)?,
        a1: bits.scaled_signed(at[1], 12, -51)?,
        a2: 0.0,
        ref_time,
        delta_t_ls: 0.0,
        delta_t_lsf: 0.0,
        effectivity: ref_time,
        wn_lsf: 0,
        dn: 0,
        tot,
        preamble: 0,
    })
}

/// GST to UTC parameters. `at` gives the positions of A0, A1, ΔtLS,
/// t0t, WNot, WNLSF, DN and ΔtLSF.
pub(super) fn gst_utc(bits: &NavBits, at: [usize; 8], source: NavType) -> Result<StdTimeOffset, BitRangeError> {
    let (week, _) = week_seconds(bits.xmit, TimeScale::GST);
    let tot = bits.unsigned(at[3], 8)? as f64 * 3600.0;
    let wnot = adjust_week_rollover(bits.unsigned(at[4], 8)? as u32, week, 8);
    let wn_lsf = adjust_week_rollover(bits.unsigned(at[5], 8)? as u32, week, 8);
    let dn = bits.unsigned(at[6], 3)? as u8;
    Ok(StdTimeOffset {
        source,
        src: TimeScale::GST,
        tgt: TimeScale::UTC,
        a0: bits.scaled_signed(at[0], 32, -30)?,
        a1: bits.scaled_signed(at[1], 24, -50)?,
        a2: 0.0,
        ref_time: from_week_seconds(wnot, tot, TimeScale::GST),
        delta_t_ls: bits.signed(at[2], 8)? as f64,
        delta_t_lsf: bits.signed(at[7], 8)? as f64,
        effectivity: leap_effectivity(wn_lsf, dn.saturating_sub(1) as u32, TimeScale::GST),
        wn_lsf,
        dn,
        tot,
        preamble: 0,
    })
}

impl NavDecoder for GalInavDecoder {
    fn signals(&self) -> &[NavSignalID] {
        &self.signals
    }

    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        check_unit(bits, &self.signals, PAGE_PAIR_BITS, &mut self.stats)?;
        let key = (bits.sv, bits.signal);

        if !Self::crc_ok(bits)? {
            warn!("{}({}): i/nav crc error", bits.sv, bits.xmit);
            self.stats.parity_errors += 1;
            self.words.remove(&key);
            self.sisa.remove(&key);
            return Err(DecodingError::Checksum);
        }
        // even page first, alert pages carry no navigation data
        if bits.bit(0)? || !bits.bit(ODD)? || bits.bit(1)? || bits.bit(ODD + 1)? {
            debug!("{}: i/nav alert or misaligned page pair", bits.sv);
            return Ok(Vec::new());
        }

        let word = Self::word(bits)?;
        let wt = word.unsigned(0, 6)? as usize;
        let mut records = Vec::new();
        match wt {
            1..=10 => {
                if wt == 3 {
                    self.sisa.insert(key, word.unsigned(120, 8)? as u8);
                }
                self.words.entry(key).or_default()[wt] = Some(word.clone());
                match wt {
                    5 => records.extend(Self::word5(&word, self.sisa.get(&key).copied())?),
                    6 | 10 => records.push(Self::time_offset(&word, wt)?),
                    _ => {},
                }
                if wt <= EPHEMERIS_WORDS {
                    if let Some(eph) = self.complete_ephemeris(key)? {
                        records.push(eph);
                    }
                }
                if wt >= 8 {
                    records.extend(self.almanacs(key, wt)?);
                }
            },
            _ => debug!("{}: i/nav word type {} not handled", bits.sv, wt),
        }
        Ok(emit(records, self.filter, &mut self.stats))
    }

    fn reset(&mut self) {
        self.words.clear();
        self.sisa.clear();
    }

    fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    fn set_type_filter(&mut self, types: NavMessageTypes) {
        self.filter = types;
    }
}
