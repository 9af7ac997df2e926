//! Transmission unit builders: field lists in, integrity protected
//! bit streams out.
use crate::{
    bits::NavBits,
    decoder::checksum::{bds_encode, crc24q, glonass_encode, lnav_encode},
    gnss_time::from_week_seconds,
    identity::NavSignalID,
    prelude::{Constellation, Epoch, TimeScale, SV},
};

/// Routes traces to the test harness, RUST_LOG sets the level
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// (start, width, value), MSB first
pub type Field = (usize, usize, u64);

/// Writes `value` over `width` bits at `start`
pub fn set(bits: &mut [bool], start: usize, width: usize, value: u64) {
    for i in 0..width {
        bits[start + i] = (value >> (width - 1 - i)) & 0x01 > 0;
    }
}

/// Zeroed stream of `len` bits, with `fields` written in
pub fn fields(len: usize, fields: &[Field]) -> Vec<bool> {
    let mut bits = vec![false; len];
    for (start, width, value) in fields {
        set(&mut bits, *start, *width, *value);
    }
    bits
}

fn value(bits: &[bool]) -> u64 {
    bits.iter().fold(0, |v, b| (v << 1) | *b as u64)
}

/// Two's complement encoding of `value` over `width` bits
pub fn twos(value: i64, width: usize) -> u64 {
    (value as u64) & ((1_u64 << width) - 1)
}

/// Sign magnitude encoding of `value` over `width` bits
pub fn sign_magnitude(value: i64, width: usize) -> u64 {
    let magnitude = value.unsigned_abs() & ((1_u64 << (width - 1)) - 1);
    if value < 0 {
        (1 << (width - 1)) | magnitude
    } else {
        magnitude
    }
}

/// GPS LNAV subframe. Fields are positioned on the recovered stream
/// (data bits of word `n` at `30 * n .. 30 * n + 24`), parity is
/// computed and D30* inversion applied.
pub fn lnav_subframe(content: &[Field]) -> Vec<bool> {
    let data = fields(300, content);
    let mut words = [0_u32; 10];
    for (n, word) in words.iter_mut().enumerate() {
        *word = value(&data[30 * n..30 * n + 24]) as u32;
    }
    lnav_encode(&words)
}

/// LNAV TLM / HOW fields
pub fn lnav_header(preamble: u8, subframe: u8) -> Vec<Field> {
    vec![(0, 8, preamble as u64), (49, 3, subframe as u64)]
}

/// 300 bit CNAV message, CRC appended
pub fn cnav_message(content: &[Field]) -> Vec<bool> {
    let mut bits = fields(300, content);
    let crc = crc24q(bits[..276].iter().copied());
    set(&mut bits, 276, 24, crc as u64);
    bits
}

/// 244 bit Galileo F/NAV page, CRC appended
pub fn fnav_page(content: &[Field]) -> Vec<bool> {
    let mut bits = fields(244, content);
    let crc = crc24q(bits[..214].iter().copied());
    set(&mut bits, 214, 24, crc as u64);
    bits
}

/// BeiDou D1 subframe. Fields are positioned on the 224 bit
/// information stream (parity removed), BCH parity is computed.
pub fn bds_subframe(content: &[Field]) -> Vec<bool> {
    let info = fields(224, content);
    let header = value(&info[..15]) as u32;
    let word1 = value(&info[15..26]) as u32;
    let mut words = [0_u32; 9];
    for (n, word) in words.iter_mut().enumerate() {
        let start = 26 + 22 * n;
        *word = value(&info[start..start + 22]) as u32;
    }
    bds_encode(header, word1, &words)
}

/// GLONASS string. Fields are (hi, lo, value) in ICD bit numbers,
/// Hamming check bits are computed.
pub fn glonass_string(content: &[(usize, usize, u64)]) -> Vec<bool> {
    let mut head = vec![false; 77];
    for (hi, lo, value) in content {
        set(&mut head, 85 - hi, hi - lo + 1, *value);
    }
    glonass_encode(&head)
}

pub fn gps(prn: u8) -> SV {
    SV::new(Constellation::GPS, prn)
}

pub fn galileo(prn: u8) -> SV {
    SV::new(Constellation::Galileo, prn)
}

pub fn beidou(prn: u8) -> SV {
    SV::new(Constellation::BeiDou, prn)
}

pub fn glonass(slot: u8) -> SV {
    SV::new(Constellation::Glonass, slot)
}

/// GPS week / second of week epoch
pub fn gpst(week: u32, sow: f64) -> Epoch {
    from_week_seconds(week, sow, TimeScale::GPST)
}

/// Sealed container
pub fn unit(sv: SV, signal: NavSignalID, xmit: Epoch, bits: &[bool]) -> NavBits {
    NavBits::from_bools(sv, signal, xmit, bits)
}

/// Container with bit `index` inverted
pub fn corrupt(bits: &NavBits, index: usize) -> NavBits {
    let mut raw = bits.to_bools();
    raw[index] = !raw[index];
    NavBits::from_bools(bits.sv, bits.signal, bits.xmit, &raw)
}
