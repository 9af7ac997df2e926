//! Transmitted bits container and typed field extraction.
use std::f64::consts::PI;

use thiserror::Error;

use gnss_rs::prelude::SV;
use hifitime::Epoch;

use crate::identity::NavSignalID;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest field that may be extracted at once.
pub const MAX_FIELD_WIDTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BitRangeError {
    #[error("bits {start}..{} out of container bounds ({size} bits)", start + len)]
    OutOfBounds {
        start: usize,
        len: usize,
        size: usize,
    },
    #[error("field width {0} exceeds 64 bits")]
    TooWide(usize),
    #[error("container is sealed")]
    Sealed,
}

/// [NavBits] is one transmission unit (subframe, page, word, string..),
/// annotated with the satellite that transmitted it, the signal it was
/// received on and its transmit time.
///
/// Bits are appended then the container is sealed: past that point
/// the content never changes. Field extraction never mutates, it is
/// performed on the bit index counted from the first transmitted bit
/// (index 0).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavBits {
    /// Transmitting satellite
    pub sv: SV,
    /// Signal this unit was received on
    pub signal: NavSignalID,
    /// Transmit time of the first bit
    pub xmit: Epoch,
    /// Receiving station, when known
    pub station: Option<String>,
    data: Vec<u8>,
    len: usize,
    sealed: bool,
}

impl NavBits {
    /// Builds a new empty (unsealed) container.
    pub fn new(sv: SV, signal: NavSignalID, xmit: Epoch) -> Self {
        Self {
            sv,
            signal,
            xmit,
            station: None,
            data: Vec::with_capacity(40),
            len: 0,
            sealed: false,
        }
    }

    /// Builds a sealed container from MSB first packed bytes.
    /// Only the first `nbits` bits are retained.
    pub fn from_bytes(
        sv: SV,
        signal: NavSignalID,
        xmit: Epoch,
        bytes: &[u8],
        nbits: usize,
    ) -> Result<Self, BitRangeError> {
        if nbits > bytes.len() * 8 {
            return Err(BitRangeError::OutOfBounds {
                start: 0,
                len: nbits,
                size: bytes.len() * 8,
            });
        }
        let mut s = Self::new(sv, signal, xmit);
        for i in 0..nbits {
            s.push_bool(bytes[i / 8] & (0x80 >> (i % 8)) > 0)?;
        }
        Ok(s.seal())
    }

    /// Builds a sealed container from a bit slice.
    pub fn from_bools(sv: SV, signal: NavSignalID, xmit: Epoch, bits: &[bool]) -> Self {
        let mut s = Self::new(sv, signal, xmit);
        for b in bits {
            s.append(*b);
        }
        s.seal()
    }

    /// Copies and returns [NavBits] with receiving station annotation.
    pub fn with_station(&self, station: &str) -> Self {
        let mut s = self.clone();
        s.station = Some(station.to_string());
        s
    }

    /// Seals this container.
    pub fn seal(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of bits
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn append(&mut self, b: bool) {
        if self.len % 8 == 0 {
            self.data.push(0);
        }
        if b {
            let idx = self.len / 8;
            self.data[idx] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// Appends a single bit.
    pub fn push_bool(&mut self, b: bool) -> Result<(), BitRangeError> {
        if self.sealed {
            return Err(BitRangeError::Sealed);
        }
        self.append(b);
        Ok(())
    }

    /// Appends the `width` LSBs of `value`, MSB first.
    pub fn push_bits(&mut self, value: u64, width: usize) -> Result<(), BitRangeError> {
        if width > MAX_FIELD_WIDTH {
            return Err(BitRangeError::TooWide(width));
        }
        if self.sealed {
            return Err(BitRangeError::Sealed);
        }
        for i in (0..width).rev() {
            self.append((value >> i) & 0x01 > 0);
        }
        Ok(())
    }

    /// Appends `len` bits of `other` starting at `start`.
    pub fn push_range(
        &mut self,
        other: &NavBits,
        start: usize,
        len: usize,
    ) -> Result<(), BitRangeError> {
        other.check(start, len)?;
        if self.sealed {
            return Err(BitRangeError::Sealed);
        }
        for i in start..start + len {
            self.append(other.get(i));
        }
        Ok(())
    }

    /// Appends a bit slice.
    pub fn extend(&mut self, bits: &[bool]) -> Result<(), BitRangeError> {
        if self.sealed {
            return Err(BitRangeError::Sealed);
        }
        for b in bits {
            self.append(*b);
        }
        Ok(())
    }

    fn check(&self, start: usize, len: usize) -> Result<(), BitRangeError> {
        if start + len > self.len {
            Err(BitRangeError::OutOfBounds {
                start,
                len,
                size: self.len,
            })
        } else {
            Ok(())
        }
    }

    fn get(&self, i: usize) -> bool {
        self.data[i / 8] & (0x80 >> (i % 8)) > 0
    }

    /// Returns bit at index `i`.
    pub fn bit(&self, i: usize) -> Result<bool, BitRangeError> {
        self.check(i, 1)?;
        Ok(self.get(i))
    }

    /// Returns all bits, in transmission order.
    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    /// Returns a sealed copy of bits `start..start+len`, with identical annotations.
    pub fn sub_bits(&self, start: usize, len: usize) -> Result<Self, BitRangeError> {
        let mut s = Self::new(self.sv, self.signal, self.xmit);
        s.station = self.station.clone();
        s.push_range(self, start, len)?;
        Ok(s.seal())
    }

    /// Interprets `len` bits starting at `start` as unsigned integer.
    pub fn unsigned(&self, start: usize, len: usize) -> Result<u64, BitRangeError> {
        if len > MAX_FIELD_WIDTH {
            return Err(BitRangeError::TooWide(len));
        }
        self.check(start, len)?;
        let mut value = 0_u64;
        for i in start..start + len {
            value <<= 1;
            if self.get(i) {
                value |= 1;
            }
        }
        Ok(value)
    }

    /// Interprets `len` bits starting at `start` as two's complement integer.
    pub fn signed(&self, start: usize, len: usize) -> Result<i64, BitRangeError> {
        let raw = self.unsigned(start, len)?;
        Ok(twos_complement(raw, len))
    }

    /// Interprets `len` bits starting at `start` as sign-magnitude integer
    /// (MSB is the sign), which is how GLONASS encodes signed fields.
    pub fn sign_magnitude(&self, start: usize, len: usize) -> Result<i64, BitRangeError> {
        if len == 0 {
            return Ok(0);
        }
        let raw = self.unsigned(start, len)?;
        let magnitude = (raw & ((1_u64 << (len - 1)) - 1)) as i64;
        if raw >> (len - 1) > 0 {
            Ok(-magnitude)
        } else {
            Ok(magnitude)
        }
    }

    /// Concatenates several (start, len) fields into one unsigned integer,
    /// first field being the most significant.
    pub fn unsigned_split(&self, fields: &[(usize, usize)]) -> Result<u64, BitRangeError> {
        let total: usize = fields.iter().map(|(_, len)| len).sum();
        if total > MAX_FIELD_WIDTH {
            return Err(BitRangeError::TooWide(total));
        }
        let mut value = 0_u64;
        for (start, len) in fields {
            let part = self.unsigned(*start, *len)?;
            value = if *len == 64 { part } else { (value << *len) | part };
        }
        Ok(value)
    }

    /// Same as [Self::unsigned_split] but two's complement.
    pub fn signed_split(&self, fields: &[(usize, usize)]) -> Result<i64, BitRangeError> {
        let total: usize = fields.iter().map(|(_, len)| len).sum();
        let raw = self.unsigned_split(fields)?;
        Ok(twos_complement(raw, total))
    }

    /// Unsigned field scaled by 2^`pow2`.
    pub fn scaled_unsigned(
        &self,
        start: usize,
        len: usize,
        pow2: i32,
    ) -> Result<f64, BitRangeError> {
        Ok(self.unsigned(start, len)? as f64 * 2.0_f64.powi(pow2))
    }

    /// Two's complement field scaled by 2^`pow2`.
    pub fn scaled_signed(&self, start: usize, len: usize, pow2: i32) -> Result<f64, BitRangeError> {
        Ok(self.signed(start, len)? as f64 * 2.0_f64.powi(pow2))
    }

    /// Sign-magnitude field scaled by 2^`pow2`.
    pub fn scaled_sign_magnitude(
        &self,
        start: usize,
        len: usize,
        pow2: i32,
    ) -> Result<f64, BitRangeError> {
        Ok(self.sign_magnitude(start, len)? as f64 * 2.0_f64.powi(pow2))
    }

    /// Two's complement field, in semi-circles scaled by 2^`pow2`, returned in radians.
    pub fn semicircles(&self, start: usize, len: usize, pow2: i32) -> Result<f64, BitRangeError> {
        Ok(self.scaled_signed(start, len, pow2)? * PI)
    }

    pub fn scaled_unsigned_split(
        &self,
        fields: &[(usize, usize)],
        pow2: i32,
    ) -> Result<f64, BitRangeError> {
        Ok(self.unsigned_split(fields)? as f64 * 2.0_f64.powi(pow2))
    }

    pub fn scaled_signed_split(
        &self,
        fields: &[(usize, usize)],
        pow2: i32,
    ) -> Result<f64, BitRangeError> {
        Ok(self.signed_split(fields)? as f64 * 2.0_f64.powi(pow2))
    }

    pub fn semicircles_split(
        &self,
        fields: &[(usize, usize)],
        pow2: i32,
    ) -> Result<f64, BitRangeError> {
        Ok(self.scaled_signed_split(fields, pow2)? * PI)
    }
}

fn twos_complement(raw: u64, len: usize) -> i64 {
    if len == 0 || len >= 64 {
        return raw as i64;
    }
    if raw >> (len - 1) > 0 {
        (raw as i64) - (1_i64 << len)
    } else {
        raw as i64
    }
}

impl std::fmt::Display for NavBits {
    /// Formats as hexadecimal, MSB first, last nibble zero padded
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for i in (0..self.len).step_by(4) {
            let mut nibble = 0_u8;
            for j in 0..4 {
                nibble <<= 1;
                if i + j < self.len && self.get(i + j) {
                    nibble |= 1;
                }
            }
            write!(f, "{:X}", nibble)?;
        }
        Ok(())
    }
}
