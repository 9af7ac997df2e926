//! GPS CNAV (L2C and L5) decoder, and the message fields shared with
//! CNAV-2.
use std::{collections::HashMap, f64::consts::PI};

use log::{debug, warn};

use crate::{
    bits::{BitRangeError, NavBits},
    decoder::{
        check_unit, checksum::crc24q_check, emit, leap_effectivity, DecoderStats, DecodingError,
        NavDecoder,
    },
    gnss_time::{adjust_week_rollover, from_week_seconds, nearest_week_epoch, week_seconds},
    identity::{CarrierBand, NavMessageTypes, NavSatelliteID, NavSignalID, NavType, TrackingCode, Wild},
    navigation::{
        Almanac, CnavHeader, Ephemeris, GpsCnavEphemeris, GpsCnavHealth, GpsCnavIsc,
        GpsMidiAlmanac, Health, Iono, Isc, KeplerOrbit, KlobucharModel, NavData, NavRecord,
        StdTimeOffset, TimeOffset,
    },
    prelude::{Constellation, TimeScale, SV},
};

/// Message length
const MESSAGE_BITS: usize = 300;

/// Number of bits covered by the CRC
const CRC_COVERAGE: usize = 276;

/// Semi major axis reference (m)
pub(super) const A_REF: f64 = 26_559_710.0;

/// Rate of right ascension reference (semicircles/s)
pub(super) const OMEGA_DOT_REF: f64 = -2.6E-9;

/// Midi almanac inclination reference (semicircles)
const I_REF: f64 = 0.3;

/// Group delay value meaning "not available"
const ISC_NOT_AVAILABLE: i64 = -4096;

/// 13 bit group delay, scaled 2^-35 s
pub(super) fn isc_value(bits: &NavBits, start: usize) -> Result<Option<f64>, BitRangeError> {
    let raw = bits.signed(start, 13)?;
    if raw == ISC_NOT_AVAILABLE {
        Ok(None)
    } else {
        Ok(Some(raw as f64 * 2.0_f64.powi(-35)))
    }
}

/// L1 C/A, L2C, L5I5 and L5Q5 group delays, in sequence from `start`
pub(super) fn legacy_iscs(bits: &NavBits, start: usize) -> Result<[Option<f64>; 4], BitRangeError> {
    Ok([
        isc_value(bits, start)?,
        isc_value(bits, start + 13)?,
        isc_value(bits, start + 26)?,
        isc_value(bits, start + 39)?,
    ])
}

/// Klobuchar α (from `start`) and β (from `start + 32`) coefficients
pub(super) fn klobuchar(
    bits: &NavBits,
    start: usize,
    source: NavType,
    preamble: u16,
) -> Result<KlobucharModel, BitRangeError> {
    Ok(KlobucharModel {
        source,
        alpha: [
            bits.scaled_signed(start, 8, -30)?,
            bits.scaled_signed(start + 8, 8, -27)?,
            bits.scaled_signed(start + 16, 8, -24)?,
            bits.scaled_signed(start + 24, 8, -24)?,
        ],
        beta: [
            bits.scaled_signed(start + 32, 8, 11)?,
            bits.scaled_signed(start + 40, 8, 14)?,
            bits.scaled_signed(start + 48, 8, 16)?,
            bits.scaled_signed(start + 56, 8, 16)?,
        ],
        preamble,
    })
}

/// GPS to UTC parameters, laid out from `start`:
/// A0, A1, A2, ΔtLS, tot, WNot, WNlsf, DN, ΔtLSF.
pub(super) fn utc_offset(
    bits: &NavBits,
    start: usize,
    source: NavType,
    preamble: u16,
) -> Result<StdTimeOffset, BitRangeError> {
    let (week, _) = week_seconds(bits.xmit, TimeScale::GPST);
    let tot = bits.unsigned(start + 44, 16)? as f64 * 16.0;
    let wnot = adjust_week_rollover(bits.unsigned(start + 60, 13)? as u32, week, 13);
    let wn_lsf = adjust_week_rollover(bits.unsigned(start + 73, 13)? as u32, week, 13);
    let dn = bits.unsigned(start + 86, 4)? as u8;
    Ok(StdTimeOffset {
        source,
        src: TimeScale::GPST,
        tgt: TimeScale::UTC,
        a0: bits.scaled_signed(start, 16, -35)?,
        a1: bits.scaled_signed(start + 16, 13, -51)?,
        a2: bits.scaled_signed(start + 29, 7, -68)?,
        ref_time: from_week_seconds(wnot, tot, TimeScale::GPST),
        delta_t_ls: bits.signed(start + 36, 8)? as f64,
        delta_t_lsf: bits.signed(start + 90, 8)? as f64,
        effectivity: leap_effectivity(wn_lsf, dn.saturating_sub(1) as u32, TimeScale::GPST),
        wn_lsf,
        dn,
        tot,
        preamble,
    })
}

/// GPS to GNSS time offset. Only the Galileo (GNSS ID 1) offset is
/// supported, other systems yield None.
pub(super) fn ggto(
    bits: &NavBits,
    gnss: usize,
    t: usize,
    wn: usize,
    a0: usize,
    source: NavType,
    preamble: u16,
) -> Result<Option<StdTimeOffset>, BitRangeError> {
    let tgt = match bits.unsigned(gnss, 3)? {
        1 => TimeScale::GST,
        id => {
            debug!("{}: unsupported ggto system {}", bits.sv, id);
            return Ok(None);
        },
    };
    let (week, _) = week_seconds(bits.xmit, TimeScale::GPST);
    let tot = bits.unsigned(t, 16)? as f64 * 16.0;
    let wnot = adjust_week_rollover(bits.unsigned(wn, 13)? as u32, week, 13);
    let ref_time = from_week_seconds(wnot, tot, TimeScale::GPST);
    Ok(Some(StdTimeOffset {
        source,
        src: TimeScale::GPST,
        tgt,
        a0: bits.scaled_signed(a0, 16, -35)?,
        a1: bits.scaled_signed(a0 + 16, 13, -51)?,
        a2: bits.scaled_signed(a0 + 29, 7, -68)?,
        ref_time,
        delta_t_ls: 0.0,
        delta_t_lsf: 0.0,
        effectivity: ref_time,
        wn_lsf: 0,
        dn: 0,
        tot,
        preamble,
    }))
}

/// Midi almanac laid out from `start` (WNa), the PRN being
/// `prn_width` bits wide. Returns the subject PRN, the orbit and the
/// L1, L2 and L5 health bits.
pub(super) fn midi_almanac(
    bits: &NavBits,
    start: usize,
    prn_width: usize,
) -> Result<(u8, KeplerOrbit, [bool; 3]), BitRangeError> {
    let (week, _) = week_seconds(bits.xmit, TimeScale::GPST);
    let wna = adjust_week_rollover(bits.unsigned(start, 13)? as u32, week, 13);
    let toa = from_week_seconds(wna, bits.unsigned(start + 13, 8)? as f64 * 4096.0, TimeScale::GPST);
    let prn = bits.unsigned(start + 21, prn_width)? as u8;
    let h = start + 21 + prn_width;
    let health = [bits.bit(h)?, bits.bit(h + 1)?, bits.bit(h + 2)?];
    let e = h + 3;
    let sqrt_a = bits.scaled_unsigned(e + 33, 17, -4)?;

    let mut orbit = KeplerOrbit::new(toa);
    orbit.ecc = bits.scaled_unsigned(e, 11, -16)?;
    orbit.i0 = (I_REF + bits.scaled_signed(e + 11, 11, -14)?) * PI;
    orbit.omega_dot = bits.semicircles(e + 22, 11, -33)?;
    orbit.a = sqrt_a * sqrt_a;
    orbit.omega0 = bits.semicircles(e + 50, 16, -15)?;
    orbit.w = bits.semicircles(e + 66, 16, -15)?;
    orbit.m0 = bits.semicircles(e + 82, 16, -15)?;
    orbit.af0 = bits.scaled_signed(e + 98, 11, -20)?;
    orbit.af1 = bits.scaled_signed(e + 109, 10, -37)?;
    orbit.healthy = !health.iter().any(|h| *h);
    Ok((prn, orbit, health))
}

/// Signal a CNAV health bit applies to, the message format being kept
pub(super) fn health_signal(
    signal: &NavSignalID,
    band: CarrierBand,
    code: TrackingCode,
) -> NavSignalID {
    NavSignalID {
        carrier: Wild::Exact(band),
        code: Wild::Exact(code),
        ..*signal
    }
}

fn header(bits: &NavBits) -> Result<CnavHeader, BitRangeError> {
    Ok(CnavHeader {
        preamble: bits.unsigned(0, 8)? as u8,
        msg_type: bits.unsigned(14, 6)? as u8,
        tow_count: bits.unsigned(20, 17)? as u32,
        alert: bits.bit(37)?,
    })
}

/// Messages making up one ephemeris
#[derive(Debug, Default)]
struct Accumulator {
    msg10: Option<NavBits>,
    msg11: Option<NavBits>,
    clock: Option<NavBits>,
}

/// [GpsCnavDecoder] decodes 300 bit CNAV messages broadcast on L2C or L5.
#[derive(Debug)]
pub struct GpsCnavDecoder {
    signals: Vec<NavSignalID>,
    stats: DecoderStats,
    filter: NavMessageTypes,
    ephemeris: HashMap<(SV, NavSignalID), Accumulator>,
}

impl Default for GpsCnavDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsCnavDecoder {
    pub fn new() -> Self {
        Self {
            signals: vec![NavSignalID::gps_cnav_l2(), NavSignalID::gps_cnav_l5()],
            stats: DecoderStats::default(),
            filter: NavMessageTypes::all(),
            ephemeris: HashMap::new(),
        }
    }

    fn nav_type(bits: &NavBits) -> NavType {
        bits.signal.nav.exact().copied().unwrap_or(NavType::GpsCnavL2)
    }

    /// Message type 10 health bits, one record per signal
    fn health(bits: &NavBits, hdr: CnavHeader) -> Result<Vec<NavRecord>, BitRangeError> {
        let signals = [
            (CarrierBand::L1, TrackingCode::CA, 51),
            (CarrierBand::L2, TrackingCode::L2CM, 52),
            (CarrierBand::L5, TrackingCode::L5I, 53),
        ];
        let mut records = Vec::with_capacity(3);
        for (band, code, offset) in signals {
            records.push(NavRecord::new(
                NavSatelliteID::own(bits.sv, health_signal(&bits.signal, band, code)),
                bits.xmit,
                NavData::Health(Health::GpsCnav(GpsCnavHealth {
                    header: Some(hdr),
                    unhealthy: bits.bit(offset)?,
                })),
            ));
        }
        Ok(records)
    }

    /// Builds the ephemeris once messages 10, 11 and a clock message
    /// share the same reference time.
    fn complete_ephemeris(&mut self, key: (SV, NavSignalID)) -> Result<Option<NavRecord>, BitRangeError> {
        let (msg10, msg11, clock) = match self.ephemeris.get(&key) {
            Some(Accumulator {
                msg10: Some(msg10),
                msg11: Some(msg11),
                clock: Some(clock),
            }) => {
                let toe10 = msg10.unsigned(70, 11)?;
                let toe11 = msg11.unsigned(38, 11)?;
                let toc = clock.unsigned(60, 11)?;
                if toe10 != toe11 || toe11 != toc {
                    debug!("{}: toe/toc mismatch {}/{}/{}", key.0, toe10, toe11, toc);
                    return Ok(None);
                }
                (msg10.clone(), msg11.clone(), clock.clone())
            },
            _ => return Ok(None),
        };
        self.ephemeris.remove(&key);

        let (xmit_week, xmit_sow) = week_seconds(msg10.xmit, TimeScale::GPST);
        let wn = adjust_week_rollover(msg10.unsigned(38, 13)? as u32, xmit_week, 13);
        let reference = from_week_seconds(wn, xmit_sow, TimeScale::GPST);
        let toe = nearest_week_epoch(msg10.unsigned(70, 11)? as f64 * 300.0, reference, TimeScale::GPST);
        let toc = nearest_week_epoch(clock.unsigned(60, 11)? as f64 * 300.0, reference, TimeScale::GPST);
        let top = nearest_week_epoch(msg10.unsigned(54, 11)? as f64 * 300.0, reference, TimeScale::GPST);

        let health_l1 = msg10.bit(51)?;
        let health_l2 = msg10.bit(52)?;
        let health_l5 = msg10.bit(53)?;

        let mut orbit = KeplerOrbit::new(toe);
        orbit.toc = toc;
        orbit.a = A_REF + msg10.scaled_signed(81, 26, -9)?;
        orbit.a_dot = msg10.scaled_signed(107, 25, -21)?;
        orbit.dn = msg10.semicircles(132, 17, -44)?;
        orbit.dn_dot = msg10.semicircles(149, 23, -57)?;
        orbit.m0 = msg10.semicircles(172, 33, -32)?;
        orbit.ecc = msg10.scaled_unsigned(205, 33, -34)?;
        orbit.w = msg10.semicircles(238, 33, -32)?;
        orbit.omega0 = msg11.semicircles(49, 33, -32)?;
        orbit.i0 = msg11.semicircles(82, 33, -32)?;
        orbit.omega_dot = (OMEGA_DOT_REF + msg11.scaled_signed(115, 17, -44)?) * PI;
        orbit.idot = msg11.semicircles(132, 15, -44)?;
        orbit.cis = msg11.scaled_signed(147, 16, -30)?;
        orbit.cic = msg11.scaled_signed(163, 16, -30)?;
        orbit.crs = msg11.scaled_signed(179, 24, -8)?;
        orbit.crc = msg11.scaled_signed(203, 24, -8)?;
        orbit.cus = msg11.scaled_signed(227, 21, -30)?;
        orbit.cuc = msg11.scaled_signed(248, 21, -30)?;
        orbit.af0 = clock.scaled_signed(71, 26, -35)?;
        orbit.af1 = clock.scaled_signed(97, 20, -48)?;
        orbit.af2 = clock.scaled_signed(117, 10, -60)?;
        orbit.healthy = match Self::nav_type(&msg10) {
            NavType::GpsCnavL5 => !health_l5,
            _ => !health_l2,
        };

        let xmit = [msg10.xmit, msg11.xmit, clock.xmit];
        let first = xmit.iter().copied().min().unwrap_or(msg10.xmit);
        let eph = GpsCnavEphemeris {
            orbit,
            headers: [header(&msg10)?, header(&msg11)?, header(&clock)?],
            xmit,
            top,
            ura_ed: msg10.signed(65, 5)? as i8,
            ura_ned0: clock.signed(49, 5)? as i8,
            ura_ned1: clock.unsigned(54, 3)? as u8,
            ura_ned2: clock.unsigned(57, 3)? as u8,
            health_l1,
            health_l2,
            health_l5,
            integrity: msg10.bit(271)?,
            l2c_phasing: msg10.bit(272)?,
        };
        debug!("{}: cnav ephemeris toe={}", key.0, toe);
        Ok(Some(NavRecord::new(
            NavSatelliteID::own(key.0, key.1),
            first,
            NavData::Ephemeris(Ephemeris::GpsCnav(eph)),
        )))
    }

    /// Message type 30: group delays and ionosphere
    fn message30(bits: &NavBits, hdr: CnavHeader) -> Result<Vec<NavRecord>, BitRangeError> {
        let sat = NavSatelliteID::own(bits.sv, bits.signal);
        let [isc_l1ca, isc_l2c, isc_l5i5, isc_l5q5] = legacy_iscs(bits, 140)?;
        let isc = GpsCnavIsc {
            header: Some(hdr),
            tgd: isc_value(bits, 127)?,
            isc_l1ca,
            isc_l2c,
            isc_l5i5,
            isc_l5q5,
        };
        let iono = klobuchar(bits, 192, Self::nav_type(bits), hdr.preamble as u16)?;
        Ok(vec![
            NavRecord::new(sat, bits.xmit, NavData::Isc(Isc::GpsCnav(isc))),
            NavRecord::new(sat, bits.xmit, NavData::Iono(Iono::Klobuchar(iono))),
        ])
    }

    /// Message type 37: midi almanac
    fn message37(bits: &NavBits, hdr: CnavHeader) -> Result<Option<NavRecord>, BitRangeError> {
        let (prn, orbit, [health_l1, health_l2, health_l5]) = midi_almanac(bits, 127, 6)?;
        if prn == 0 {
            return Ok(None);
        }
        Ok(Some(NavRecord::new(
            NavSatelliteID::new(SV::new(Constellation::GPS, prn), bits.sv, bits.signal),
            bits.xmit,
            NavData::Almanac(Almanac::GpsCnav(GpsMidiAlmanac {
                orbit,
                header: Some(hdr),
                xmit: bits.xmit,
                health_l1,
                health_l2,
                health_l5,
            })),
        )))
    }

    fn time_offset(bits: &NavBits, offset: StdTimeOffset) -> NavRecord {
        NavRecord::new(
            NavSatelliteID::own(bits.sv, bits.signal),
            bits.xmit,
            NavData::TimeOffset(TimeOffset::Std(offset)),
        )
    }
}

impl NavDecoder for GpsCnavDecoder {
    fn signals(&self) -> &[NavSignalID] {
        &self.signals
    }

    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        check_unit(bits, &self.signals, MESSAGE_BITS, &mut self.stats)?;
        let key = (bits.sv, bits.signal);

        if !crc24q_check(bits, 0, CRC_COVERAGE, CRC_COVERAGE)? {
            warn!("{}({}): cnav crc error", bits.sv, bits.xmit);
            self.stats.parity_errors += 1;
            self.ephemeris.remove(&key);
            return Err(DecodingError::Checksum);
        }

        let hdr = header(bits)?;
        let nav = Self::nav_type(bits);
        let preamble = hdr.preamble as u16;
        let mut records = Vec::new();
        match hdr.msg_type {
            10 => {
                records.extend(Self::health(bits, hdr)?);
                self.ephemeris.entry(key).or_default().msg10 = Some(bits.clone());
            },
            11 => {
                self.ephemeris.entry(key).or_default().msg11 = Some(bits.clone());
            },
            30..=37 => {
                self.ephemeris.entry(key).or_default().clock = Some(bits.clone());
                match hdr.msg_type {
                    30 => records.extend(Self::message30(bits, hdr)?),
                    33 => {
                        let offset = utc_offset(bits, 127, nav, preamble)?;
                        records.push(Self::time_offset(bits, offset));
                    },
                    35 => {
                        if let Some(offset) = ggto(bits, 156, 127, 143, 159, nav, preamble)? {
                            records.push(Self::time_offset(bits, offset));
                        }
                    },
                    37 => records.extend(Self::message37(bits, hdr)?),
                    _ => {},
                }
            },
            msg => debug!("{}: cnav message type {} not handled", bits.sv, msg),
        }
        if matches!(hdr.msg_type, 10 | 11 | 30..=37) {
            if let Some(eph) = self.complete_ephemeris(key)? {
                records.push(eph);
            }
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::Epoch;

    #[test]
    fn not_available_isc() {
        let mut bits = NavBits::new(
            SV::new(Constellation::GPS, 1),
            NavSignalID::gps_cnav_l2(),
            Epoch::from_gregorian_at_midnight(2024, 1, 1, TimeScale::GPST),
        );
        // -4096 then -1
        bits.push_bits(0x1000, 13).unwrap();
        bits.push_bits(0x1FFF, 13).unwrap();
        let bits = bits.seal();
        assert_eq!(isc_value(&bits, 0).unwrap(), None);
        assert_eq!(isc_value(&bits, 13).unwrap(), Some(-(2.0_f64.powi(-35))));
    }

    #[test]
    fn health_signals() {
        let signal = health_signal(&NavSignalID::gps_cnav_l5(), CarrierBand::L1, TrackingCode::CA);
        assert_eq!(signal.carrier, Wild::Exact(CarrierBand::L1));
        assert_eq!(signal.code, Wild::Exact(TrackingCode::CA));
        assert_eq!(signal.nav, Wild::Exact(NavType::GpsCnavL5));
    }
}
