//! GPS CNAV-2 (L1C) decoder
use std::{collections::HashMap, f64::consts::PI};

use log::{debug, warn};

use crate::{
    bits::{BitRangeError, NavBits},
    decoder::{
        check_unit,
        checksum::crc24q_check,
        emit,
        gps_cnav::{
            ggto, isc_value, klobuchar, legacy_iscs, midi_almanac, utc_offset, A_REF,
            OMEGA_DOT_REF,
        },
        DecoderStats, DecodingError, NavDecoder,
    },
    gnss_time::{adjust_week_rollover, from_week_seconds, nearest_week_epoch, week_seconds},
    identity::{NavMessageTypes, NavSatelliteID, NavSignalID, NavType},
    navigation::{
        Almanac, Ephemeris, GpsCnav2Ephemeris, GpsCnav2Isc, GpsCnavHealth, GpsMidiAlmanac, Health,
        Iono, Isc, KeplerOrbit, NavData, NavRecord, TimeOffset,
    },
    prelude::{Constellation, Duration, Epoch, TimeScale, SV},
};

/// TOI, subframe 2 and subframe 3
const FRAME_BITS: usize = 883;

/// Subframe 2 position and length, CRC included
const SF2_START: usize = 9;
const SF2_BITS: usize = 600;

/// Subframe 3 position and length, CRC included
const SF3_START: usize = SF2_START + SF2_BITS;
const SF3_BITS: usize = 274;

/// Subframe start times, relative to the frame start (s)
const SF2_OFFSET: f64 = 0.52;
const SF3_OFFSET: f64 = 12.52;

/// Subframe 3 page 1 legacy group delays, with the page transmit time
type LegacyIscs = (Epoch, [Option<f64>; 4]);

/// [GpsCnav2Decoder] decodes 883 bit CNAV-2 frames (symbols already
/// decoded and de-interleaved).
#[derive(Debug)]
pub struct GpsCnav2Decoder {
    signals: Vec<NavSignalID>,
    stats: DecoderStats,
    filter: NavMessageTypes,
    /// Latest page 1 group delays, per satellite
    legacy: HashMap<SV, LegacyIscs>,
}

impl Default for GpsCnav2Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsCnav2Decoder {
    pub fn new() -> Self {
        Self {
            signals: vec![NavSignalID::gps_cnav2()],
            stats: DecoderStats::default(),
            filter: NavMessageTypes::all(),
            legacy: HashMap::new(),
        }
    }

    /// Subframe 2: ephemeris and health
    fn subframe2(sf2: &NavBits) -> Result<Vec<NavRecord>, BitRangeError> {
        let (xmit_week, xmit_sow) = week_seconds(sf2.xmit, TimeScale::GPST);
        let wn = adjust_week_rollover(sf2.unsigned(0, 13)? as u32, xmit_week, 13);
        let reference = from_week_seconds(wn, xmit_sow, TimeScale::GPST);
        let top = nearest_week_epoch(sf2.unsigned(21, 11)? as f64 * 300.0, reference, TimeScale::GPST);
        let toe = nearest_week_epoch(sf2.unsigned(38, 11)? as f64 * 300.0, reference, TimeScale::GPST);
        let health_l1c = sf2.bit(32)?;

        let mut orbit = KeplerOrbit::new(toe);
        orbit.a = A_REF + sf2.scaled_signed(49, 26, -9)?;
        orbit.a_dot = sf2.scaled_signed(75, 25, -21)?;
        orbit.dn = sf2.semicircles(100, 17, -44)?;
        orbit.dn_dot = sf2.semicircles(117, 23, -57)?;
        orbit.m0 = sf2.semicircles(140, 33, -32)?;
        orbit.ecc = sf2.scaled_unsigned(173, 33, -34)?;
        orbit.w = sf2.semicircles(206, 33, -32)?;
        orbit.omega0 = sf2.semicircles(239, 33, -32)?;
        orbit.i0 = sf2.semicircles(272, 33, -32)?;
        orbit.omega_dot = (OMEGA_DOT_REF + sf2.scaled_signed(305, 17, -44)?) * PI;
        orbit.idot = sf2.semicircles(322, 15, -44)?;
        orbit.cis = sf2.scaled_signed(337, 16, -30)?;
        orbit.cic = sf2.scaled_signed(353, 16, -30)?;
        orbit.crs = sf2.scaled_signed(369, 24, -8)?;
        orbit.crc = sf2.scaled_signed(393, 24, -8)?;
        orbit.cus = sf2.scaled_signed(417, 21, -30)?;
        orbit.cuc = sf2.scaled_signed(438, 21, -30)?;
        orbit.af0 = sf2.scaled_signed(470, 26, -35)?;
        orbit.af1 = sf2.scaled_signed(496, 20, -48)?;
        orbit.af2 = sf2.scaled_signed(516, 10, -60)?;
        orbit.healthy = !health_l1c;

        let eph = GpsCnav2Ephemeris {
            orbit,
            xmit: sf2.xmit,
            top,
            ura_ed: sf2.signed(33, 5)? as i8,
            ura_ned0: sf2.signed(459, 5)? as i8,
            ura_ned1: sf2.unsigned(464, 3)? as u8,
            ura_ned2: sf2.unsigned(467, 3)? as u8,
            health_l1c,
            integrity: sf2.bit(565)?,
        };
        let sat = NavSatelliteID::own(sf2.sv, sf2.signal);
        Ok(vec![
            NavRecord::new(
                sat,
                sf2.xmit,
                NavData::Health(Health::GpsCnav2(GpsCnavHealth {
                    header: None,
                    unhealthy: health_l1c,
                })),
            ),
            NavRecord::new(sat, sf2.xmit, NavData::Ephemeris(Ephemeris::GpsCnav2(eph))),
        ])
    }

    /// Subframe 2 group delays, completed by the latest page 1
    fn isc(sf2: &NavBits, legacy: Option<&LegacyIscs>) -> Result<NavRecord, BitRangeError> {
        let (xmit_sf3, [isc_l1ca, isc_l2c, isc_l5i5, isc_l5q5]) = match legacy {
            Some((xmit, iscs)) => (Some(*xmit), *iscs),
            None => (None, [None; 4]),
        };
        let isc = GpsCnav2Isc {
            xmit_sf2: sf2.xmit,
            xmit_sf3,
            tgd: isc_value(sf2, 526)?,
            isc_l1cp: isc_value(sf2, 539)?,
            isc_l1cd: isc_value(sf2, 552)?,
            isc_l1ca,
            isc_l2c,
            isc_l5i5,
            isc_l5q5,
        };
        Ok(NavRecord::new(
            NavSatelliteID::own(sf2.sv, sf2.signal),
            sf2.xmit,
            NavData::Isc(Isc::GpsCnav2(isc)),
        ))
    }

    /// Subframe 3 pages
    fn subframe3(&mut self, sf3: &NavBits) -> Result<Vec<NavRecord>, BitRangeError> {
        let sat = NavSatelliteID::own(sf3.sv, sf3.signal);
        let mut records = Vec::new();
        match sf3.unsigned(8, 6)? {
            1 => {
                let offset = utc_offset(sf3, 14, NavType::GpsCnav2, 0)?;
                records.push(NavRecord::new(
                    sat,
                    sf3.xmit,
                    NavData::TimeOffset(TimeOffset::Std(offset)),
                ));
                let iono = klobuchar(sf3, 112, NavType::GpsCnav2, 0)?;
                records.push(NavRecord::new(sat, sf3.xmit, NavData::Iono(Iono::Klobuchar(iono))));
                self.legacy.insert(sf3.sv, (sf3.xmit, legacy_iscs(sf3, 176)?));
            },
            2 => {
                if let Some(offset) = ggto(sf3, 14, 17, 33, 46, NavType::GpsCnav2, 0)? {
                    records.push(NavRecord::new(
                        sat,
                        sf3.xmit,
                        NavData::TimeOffset(TimeOffset::Std(offset)),
                    ));
                }
            },
            4 => {
                let (prn, orbit, [health_l1, health_l2, health_l5]) = midi_almanac(sf3, 14, 8)?;
                if prn > 0 {
                    records.push(NavRecord::new(
                        NavSatelliteID::new(SV::new(Constellation::GPS, prn), sf3.sv, sf3.signal),
                        sf3.xmit,
                        NavData::Almanac(Almanac::GpsCnav2(GpsMidiAlmanac {
                            orbit,
                            header: None,
                            xmit: sf3.xmit,
                            health_l1,
                            health_l2,
                            health_l5,
                        })),
                    ));
                }
            },
            page => debug!("{}: cnav-2 page {} not handled", sf3.sv, page),
        }
        Ok(records)
    }
}

impl NavDecoder for GpsCnav2Decoder {
    fn signals(&self) -> &[NavSignalID] {
        &self.signals
    }

    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError> {
        check_unit(bits, &self.signals, FRAME_BITS, &mut self.stats)?;

        let sf2_ok = crc24q_check(bits, SF2_START, SF2_BITS - 24, SF2_START + SF2_BITS - 24)?;
        let sf3_ok = crc24q_check(bits, SF3_START, SF3_BITS - 24, SF3_START + SF3_BITS - 24)?;
        if !sf2_ok || !sf3_ok {
            warn!("{}({}): cnav-2 crc error", bits.sv, bits.xmit);
            self.stats.parity_errors += 1;
            self.legacy.remove(&bits.sv);
            return Err(DecodingError::Checksum);
        }

        let mut sf2 = bits.sub_bits(SF2_START, SF2_BITS)?;
        sf2.xmit = bits.xmit + Duration::from_seconds(SF2_OFFSET);
        let mut sf3 = bits.sub_bits(SF3_START, SF3_BITS)?;
        sf3.xmit = bits.xmit + Duration::from_seconds(SF3_OFFSET);

        let mut records = Self::subframe2(&sf2)?;
        records.extend(self.subframe3(&sf3)?);
        records.push(Self::isc(&sf2, self.legacy.get(&bits.sv))?);
        Ok(emit(records, self.filter, &mut self.stats))
    }

    fn reset(&mut self) {
        self.legacy.clear();
    }

    fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    fn set_type_filter(&mut self, types: NavMessageTypes) {
        self.filter = types;
    }
}
