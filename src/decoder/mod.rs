//! Navigation message decoders.
//!
//! Each decoder turns [NavBits] transmission units of one family of
//! signals into [NavRecord]s. Units are checked (parity, CRC, BCH or
//! Hamming) before they touch the per satellite accumulators, a unit
//! failing its check only resets the accumulators of its satellite.
use thiserror::Error;

use crate::{
    bits::{BitRangeError, NavBits},
    identity::{NavMessageTypes, NavSignalID},
    navigation::NavRecord,
    prelude::{Epoch, TimeScale},
};

pub mod checksum;

mod bds_d1;
mod bds_d2;
mod gal_fnav;
mod gal_inav;
mod glo_fnav;
mod gps_cnav;
mod gps_cnav2;
mod gps_lnav;
mod registry;

pub use bds_d1::BdsD1Decoder;
pub use bds_d2::BdsD2Decoder;
pub use gal_fnav::GalFnavDecoder;
pub use gal_inav::GalInavDecoder;
pub use glo_fnav::GloFnavDecoder;
pub use gps_cnav::GpsCnavDecoder;
pub use gps_cnav2::GpsCnav2Decoder;
pub use gps_lnav::GpsLnavDecoder;
pub use registry::{DecoderRegistry, RegistryError};

/// Errors raised while decoding one transmission unit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodingError {
    #[error("parity check failed on word {word}")]
    Parity { word: usize },
    #[error("checksum mismatch")]
    Checksum,
    #[error("bad unit length: expecting {expected} bits, got {got}")]
    BadLength { expected: usize, got: usize },
    #[error("signal is not handled by this decoder")]
    UnexpectedSignal,
    #[error("bit range error: {0}")]
    BitRange(#[from] BitRangeError),
}

/// Decoder counters
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DecoderStats {
    /// Transmission units submitted
    pub units: usize,
    /// Units that failed their integrity check
    pub parity_errors: usize,
    /// Units rejected for their length or signal
    pub rejected: usize,
    /// Records emitted
    pub records: usize,
}

/// A navigation message decoder
pub trait NavDecoder: Send {
    /// Signals this decoder handles
    fn signals(&self) -> &[NavSignalID];
    /// Submits one transmission unit and returns the records it completes.
    fn decode(&mut self, bits: &NavBits) -> Result<Vec<NavRecord>, DecodingError>;
    /// Drops every accumulator
    fn reset(&mut self);
    /// Counters since creation
    fn stats(&self) -> &DecoderStats;
    /// Restricts the kinds of records emitted
    fn set_type_filter(&mut self, types: NavMessageTypes);
}

/// Checks that `bits` is a unit of `expected` bits, broadcast on
/// one of `signals`.
pub(crate) fn check_unit(
    bits: &NavBits,
    signals: &[NavSignalID],
    expected: usize,
    stats: &mut DecoderStats,
) -> Result<(), DecodingError> {
    stats.units += 1;
    if !signals.iter().any(|signal| signal.matches(&bits.signal)) {
        stats.rejected += 1;
        return Err(DecodingError::UnexpectedSignal);
    }
    if bits.len() != expected {
        stats.rejected += 1;
        return Err(DecodingError::BadLength {
            expected,
            got: bits.len(),
        });
    }
    Ok(())
}

/// Applies the type filter and updates the counters
pub(crate) fn emit(
    mut records: Vec<NavRecord>,
    filter: NavMessageTypes,
    stats: &mut DecoderStats,
) -> Vec<NavRecord> {
    records.retain(|record| filter.retains(record.kind()));
    stats.records += records.len();
    records
}

/// Leap second effectivity: start of day `day` (0 = first day of the
/// week) of week `wn`.
pub(crate) fn leap_effectivity(wn: u32, day: u32, ts: TimeScale) -> Epoch {
    crate::gnss_time::from_week_seconds(wn, day as f64 * 86_400.0, ts)
}
