//! GLONASS civil FDMA (L1/L2 C/A) decoder.
//!
//! Strings are 85 bits, container index 0 being the idle bit b85 and
//! index 84 the check bit b1. Field positions are given with the ICD
//! bit numbers through [at].
use std::collections::HashMap;

use log::{debug, warn};
use nalgebra::Vector3;

use crate::{
    bits::{BitRangeError, NavBits},
    decoder::{
        check_unit,
        checksum::{glonass_check, HammingOutcome},
        emit, DecoderStats, DecodingError, NavDecoder,
    },
    identity::{NavMessageTypes, NavSatelliteID, NavSignalID},
    navigation::{
        Almanac, Ephemeris, GloFnavAlmanac, GloFnavEphemeris, GloFnavHealth, GloFnavIsc, Health,
        Isc, NavData, NavRecord,
    },
    prelude::{Constellation, Duration, Epoch, SV},
};

/// String length
const STRING_BITS: usize = 85;

/// String period (s)
const STRING_PERIOD: f64 = 2.0;

/// Frame period (s), 15 strings
const FRAME_PERIOD: f64 = 30.0;

/// Moscow time offset to UTC (s)
const MSK_OFFSET: f64 = 10_800.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// (start, len) of the field spanning ICD bits b`hi`..b`lo`
const fn at(hi: usize, lo: usize) -> (usize, usize) {
    (STRING_BITS - hi, hi - lo + 1)
}

fn unsigned(bits: &NavBits, field: (usize, usize)) -> Result<u64, BitRangeError> {
    bits.unsigned(field.0, field.1)
}

fn sign_magnitude(bits: &NavBits, field: (usize, usize), pow2: i32) -> Result<f64, BitRangeError> {
    bits.scaled_sign_magnitude(field.0, field.1, pow2)
}

fn flag(bits: &NavBits, b: usize) -> Result<bool, BitRangeError> {
    bits.bit(STRING_BITS - b)
}

/// Start of the Moscow day containing `t`, as a UTC epoch
fn moscow_day(t: Epoch) -> Epoch {
    let msk = t + Duration::from_seconds(MSK_OFFSET);
    let (y, m, d, _, _, _, _) = msk.to_gregorian_utc();
    Epoch::from_gregorian_utc_at_midnight(y, m, d) - Duration::from_seconds(MSK_OFFSET)
}

/// Frame number (1..=5) within the 2.5 minute superframe
fn frame_number(xmit: Epoch) -> u32 {
    let sod = (xmit - moscow_day(xmit)).to_seconds();
    ((sod.rem_euclid(5.0 * FRAME_PERIOD)) / FRAME_PERIOD) as u32 + 1
}

/// Frequency channel, 5 bit two's complement
fn channel(raw: u64) -> i8 {
    if raw >= 16 {
        raw as i8 - 32
    } else {
        raw as i8
    }
}

/// [GloFnavDecoder] decodes 85 bit GLONASS strings. Single bit errors
/// are corrected, double errors reject the string.
#[derive(Debug)]
pub struct GloFnavDecoder {
    signals: Vec<NavSignalID>,
    stats: DecoderStats,
    filter: NavMessageTypes,
    /// Strings 1 to 4, per satellite and signal
    ephemeris: HashMap<(SV, NavSignalID), [Option<NavBits>; 4]>,
    /// Strings 6 to 15, per satellite and signal
    almanac: HashMap<(SV, NavSignalID), [Option<NavBits>; 10]>,
    /// Almanac day (string 5), per satellite and signal
    day: HashMap<(SV, NavSignalID), Epoch>,
}

impl Default for GloFnavDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GloFnavDecoder {
    pub fn new() -> Self {
        Self {
            signals: vec![NavSignalID::glo_fnav_g1(), NavSignalID::glo_fnav_g2()],
            stats: DecoderStats::default(),
            filter: NavMessageTypes::all(),
            ephemeris: HashMap::new(),
            almanac: HashMap::new(),
            day: HashMap::new(),
        }
    }

    /// Builds the ephemeris once strings 1 to 4 were received in a row
    fn complete_ephemeris(&mut self, key: (SV, NavSignalID)) -> Result<Vec<NavRecord>, BitRangeError> {
        let complete = match self.ephemeris.get(&key) {
            Some([Some(s1), Some(s2), Some(s3), Some(s4)]) => {
                let consecutive = [s1, s2, s3, s4]
                    .windows(2)
                    .all(|w| (w[1].xmit - w[0].xmit).to_seconds() == STRING_PERIOD);
                if consecutive {
                    Some([s1.clone(), s2.clone(), s3.clone(), s4.clone()])
                } else {
                    None
                }
            },
            _ => None,
        };
        let [s1, s2, s3, s4] = match complete {
            Some(strings) => strings,
            None => return Ok(Vec::new()),
        };
        self.ephemeris.remove(&key);

        let tb = unsigned(&s2, at(76, 70))? as f64 * 900.0;
        let mut toe = moscow_day(s1.xmit) + Duration::from_seconds(tb);
        let dt = (toe - s1.xmit).to_seconds();
        if dt > SECONDS_PER_DAY / 2.0 {
            toe = toe - Duration::from_seconds(SECONDS_PER_DAY);
        } else if dt < -SECONDS_PER_DAY / 2.0 {
            toe = toe + Duration::from_seconds(SECONDS_PER_DAY);
        }

        let state = |s: &NavBits| -> Result<(f64, f64, f64), BitRangeError> {
            Ok((
                sign_magnitude(s, at(35, 9), -11)? * 1.0E3,
                sign_magnitude(s, at(64, 41), -20)? * 1.0E3,
                sign_magnitude(s, at(40, 36), -30)? * 1.0E3,
            ))
        };
        let (x, vx, ax) = state(&s1)?;
        let (y, vy, ay) = state(&s2)?;
        let (z, vz, az) = state(&s3)?;

        let bn = unsigned(&s2, at(80, 78))? as u8;
        let ln = flag(&s3, 65)?;
        let interval = match unsigned(&s1, at(78, 77))? {
            1 => 30,
            2 => 45,
            3 => 60,
            _ => 0,
        };
        let eph = GloFnavEphemeris {
            toe,
            xmit: [s1.xmit, s2.xmit, s3.xmit, s4.xmit],
            pos: Vector3::new(x, y, z),
            vel: Vector3::new(vx, vy, vz),
            acc: Vector3::new(ax, ay, az),
            tau_n: sign_magnitude(&s4, at(80, 59), -30)?,
            gamma_n: sign_magnitude(&s3, at(79, 69), -40)?,
            delta_tau_n: sign_magnitude(&s4, at(58, 54), -30)?,
            bn,
            ln,
            interval,
            p2: flag(&s2, 77)?,
            p3: flag(&s3, 80)?,
            p4: flag(&s4, 34)?,
            en: unsigned(&s4, at(53, 49))? as u8,
            ft: unsigned(&s4, at(33, 30))? as u8,
            slot: unsigned(&s4, at(15, 11))? as u8,
            m: unsigned(&s4, at(10, 9))? as u8,
        };
        debug!("{}: glonass ephemeris tb={}", key.0, toe);
        let sat = NavSatelliteID::own(key.0, key.1);
        Ok(vec![
            NavRecord::new(
                sat,
                s1.xmit,
                NavData::Health(Health::GloFnav(GloFnavHealth {
                    bn: Some(bn),
                    ln: Some(ln),
                    cn: None,
                })),
            ),
            NavRecord::new(sat, s1.xmit, NavData::Ephemeris(Ephemeris::GloFnav(eph))),
        ])
    }

    /// Builds the almanac of the string pair starting at `index`
    /// (0 for strings 6 and 7), once the almanac day is known.
    fn almanac_pair(&mut self, key: (SV, NavSignalID), index: usize) -> Result<Vec<NavRecord>, BitRangeError> {
        let day = match self.day.get(&key) {
            Some(day) => *day,
            None => return Ok(Vec::new()),
        };
        let strings = match self.almanac.get_mut(&key) {
            Some(strings) => strings,
            None => return Ok(Vec::new()),
        };
        let (even, odd) = match (&strings[index], &strings[index + 1]) {
            (Some(even), Some(odd)) if (odd.xmit - even.xmit).to_seconds() == STRING_PERIOD => {
                (even.clone(), odd.clone())
            },
            _ => return Ok(Vec::new()),
        };
        strings[index] = None;
        strings[index + 1] = None;

        let slot = unsigned(&even, at(77, 73))? as u8;
        if slot == 0 {
            return Ok(Vec::new());
        }
        let cn = flag(&even, 80)?;
        let ln = flag(&odd, 9)?;
        let t_lambda = unsigned(&odd, at(64, 44))? as f64 * 2.0_f64.powi(-5);
        let almanac = GloFnavAlmanac {
            xmit: [even.xmit, odd.xmit],
            toa: day + Duration::from_seconds(t_lambda),
            cn,
            m: unsigned(&even, at(79, 78))? as u8,
            slot,
            tau: sign_magnitude(&even, at(72, 63), -18)?,
            lambda: sign_magnitude(&even, at(62, 42), -20)?,
            delta_i: sign_magnitude(&even, at(41, 24), -20)?,
            ecc: unsigned(&even, at(23, 9))? as f64 * 2.0_f64.powi(-20),
            omega: sign_magnitude(&odd, at(80, 65), -15)?,
            delta_t: sign_magnitude(&odd, at(43, 22), -9)?,
            delta_t_dot: sign_magnitude(&odd, at(21, 15), -14)?,
            h: channel(unsigned(&odd, at(14, 10))?),
            ln,
        };
        let sat = NavSatelliteID::new(SV::new(Constellation::Glonass, slot), key.0, key.1);
        Ok(vec![
            NavRecord::new(
                sat,
                even.xmit,
                NavData::Health(Health::GloFnav(GloFnavHealth {
                    bn: None,
                    ln: Some(ln),
                    cn: Some(cn),
                })),
            ),
            NavRecord::new(sat, even.xmit, NavData::Almanac(Almanac::GloFnav(almanac))),
        ])
    }

    /// String 5: almanac day and health, releases waiting almanacs
    fn string5(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, BitRangeError> {
        let key = (bits.sv, bits.signal);
        let mut records = vec![NavRecord::new(
            NavSatelliteID::own(bits.sv, bits.signal),
            bits.xmit,
            NavData::Health(Health::GloFnav(GloFnavHealth {
                bn: None,
                ln: Some(flag(bits, 9)?),
                cn: None,
            })),
        )];
        let na = unsigned(bits, at(80, 70))?;
        let n4 = unsigned(bits, at(36, 32))?;
        if na == 0 || n4 == 0 {
            debug!("{}: glonass string 5 without day reference", bits.sv);
            return Ok(records);
        }
        let year = 1996 + 4 * (n4 as i32 - 1);
        let day = Epoch::from_gregorian_utc_at_midnight(year, 1, 1)
            + Duration::from_seconds((na - 1) as f64 * SECONDS_PER_DAY)
            - Duration::from_seconds(MSK_OFFSET);
        self.day.insert(key, day);
        for index in (0..10).step_by(2) {
            records.extend(self.almanac_pair(key, index)?);
        }
        Ok(records)
    }
}

impl NavDecoder for GloFnavDecoder {
    fn signals(&self) -> &[NavSignalID] {
        &self.signals
    }

    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        check_unit(bits, &self.signals, STRING_BITS, &mut self.stats)?;
        let key = (bits.sv, bits.signal);

        let string = match glonass_check(bits)? {
            HammingOutcome::Valid => bits.clone(),
            HammingOutcome::Corrected(index) => {
                debug!("{}({}): glonass bit {} corrected", bits.sv, bits.xmit, index);
                let mut raw = bits.to_bools();
                raw[index] = !raw[index];
                let mut corrected = NavBits::from_bools(bits.sv, bits.signal, bits.xmit, &raw);
                corrected.station = bits.station.clone();
                corrected
            },
            HammingOutcome::Invalid => {
                warn!("{}({}): glonass hamming error", bits.sv, bits.xmit);
                self.stats.parity_errors += 1;
                self.ephemeris.remove(&key);
                self.almanac.remove(&key);
                return Err(DecodingError::Checksum);
            },
        };

        let m = unsigned(&string, at(84, 81))? as usize;
        let mut records = Vec::new();
        match m {
            1..=4 => {
                if m == 4 {
                    records.push(NavRecord::new(
                        NavSatelliteID::own(string.sv, string.signal),
                        string.xmit,
                        NavData::Isc(Isc::GloFnav(GloFnavIsc {
                            delta_tau_n: sign_magnitude(&string, at(58, 54), -30)?,
                        })),
                    ));
                }
                self.ephemeris.entry(key).or_default()[m - 1] = Some(string);
                records.extend(self.complete_ephemeris(key)?);
            },
            5 => records.extend(self.string5(&string)?),
            6..=15 => {
                // strings 14 and 15 of the fifth frame carry no almanac
                if m >= 14 && frame_number(string.xmit) == 5 {
                    return Ok(emit(records, self.filter, &mut self.stats));
                }
                self.almanac.entry(key).or_default()[m - 6] = Some(string);
                records.extend(self.almanac_pair(key, (m & !1) - 6)?);
            },
            _ => debug!("{}: glonass string {} not handled", bits.sv, m),
        }
        Ok(emit(records, self.filter, &mut self.stats))
    }

    fn reset(&mut self) {
        self.ephemeris.clear();
        self.almanac.clear();
        self.day.clear();
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
    #[test]
    fn icd_bit_numbers() {
        assert_eq!(at(84, 81), (1, 4));
        assert_eq!(at(8, 1), (77, 8));
        assert_eq!(at(35, 9), (50, 27));
    }
    #[test]
    fn frequency_channels() {
        assert_eq!(channel(0), 0);
        assert_eq!(channel(6), 6);
        assert_eq!(channel(25), -7);
        assert_eq!(channel(31), -1);
    }
    #[test]
    fn superframe_frames() {
        // 00:00 MSK is 21:00 UTC
        let start = Epoch::from_gregorian_utc(2024, 1, 1, 21, 0, 0, 0);
        assert_eq!(frame_number(start), 1);
        assert_eq!(frame_number(start + Duration::from_seconds(125.0)), 5);
        assert_eq!(frame_number(start + Duration::from_seconds(150.0)), 1);
    }
}
