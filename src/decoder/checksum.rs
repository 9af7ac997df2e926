//! Transmission unit integrity checks: GPS LNAV parity, CRC-24Q,
//! BeiDou BCH(15,11) and GLONASS Hamming codes.
use crate::bits::{BitRangeError, NavBits};

/// Data bits covered by each of the six LNAV parity bits (D25..D30),
/// as 24 bit masks, d1 being the MSB.
const LNAV_PARITY_MASKS: [u32; 6] = [
    0xEC7CD2, // D25
    0x763E69, // D26
    0xBB1F34, // D27
    0x5D8F9A, // D28
    0xAEC7CD, // D29
    0x2DEA27, // D30
];

/// D29* / D30* dependency of each parity bit: true for D30*
const LNAV_PARITY_PREV: [bool; 6] = [false, true, false, true, true, false];

fn parity_of(value: u32) -> u32 {
    value.count_ones() & 0x01
}

/// Six parity bits of 24 source data bits, given the last two
/// transmitted bits of the previous word.
pub fn lnav_parity(data: u32, d29: bool, d30: bool) -> u32 {
    let mut parity = 0;
    for (mask, uses_d30) in LNAV_PARITY_MASKS.iter().zip(LNAV_PARITY_PREV.iter()) {
        let prev = if *uses_d30 { d30 } else { d29 };
        let bit = parity_of(data & mask) ^ prev as u32;
        parity = (parity << 1) | bit;
    }
    parity
}

/// Checks the ten words of a 300 bit LNAV subframe and recovers the
/// source data bits. Returns a copy where the data bits of each word are
/// restored (complemented back when D30* is set), or the first failing
/// word (1..=10).
pub fn lnav_recover(bits: &NavBits) -> Result<Result<NavBits, usize>, BitRangeError> {
    let mut out = NavBits::new(bits.sv, bits.signal, bits.xmit);
    out.station = bits.station.clone();
    // words 2 and 10 end with 00, so each subframe starts with D29* = D30* = 0
    let (mut d29, mut d30) = (false, false);
    for word in 0..10 {
        let start = word * 30;
        let raw = bits.unsigned(start, 24)? as u32;
        let parity = bits.unsigned(start + 24, 6)? as u32;
        let data = if d30 { !raw & 0xFFFFFF } else { raw };
        if lnav_parity(data, d29, d30) != parity {
            return Ok(Err(word + 1));
        }
        out.push_bits(data as u64, 24)?;
        out.push_bits(parity as u64, 6)?;
        d29 = parity & 0x02 > 0;
        d30 = parity & 0x01 > 0;
    }
    Ok(Ok(out.seal()))
}

/// Encodes 10 words of 24 source data bits into a transmitted 300 bit
/// subframe.
pub fn lnav_encode(words: &[u32; 10]) -> Vec<bool> {
    let mut out = Vec::with_capacity(300);
    let (mut d29, mut d30) = (false, false);
    for data in words.iter() {
        let data = data & 0xFFFFFF;
        let parity = lnav_parity(data, d29, d30);
        let tx = if d30 { !data & 0xFFFFFF } else { data };
        let word = (tx << 6) | parity;
        for i in (0..30).rev() {
            out.push((word >> i) & 0x01 > 0);
        }
        d29 = parity & 0x02 > 0;
        d30 = parity & 0x01 > 0;
    }
    out
}

/// CRC-24Q generator polynomial (x^24 term implied)
const CRC24Q_POLY: u32 = 0x864CFB;

/// CRC-24Q of a bit sequence, MSB first.
pub fn crc24q<I: IntoIterator<Item = bool>>(bits: I) -> u32 {
    let mut crc = 0_u32;
    for bit in bits {
        let top = ((crc >> 23) & 0x01 > 0) ^ bit;
        crc = (crc << 1) & 0xFFFFFF;
        if top {
            crc ^= CRC24Q_POLY;
        }
    }
    crc
}

/// CRC-24Q of `len` bits starting at `start`.
pub fn crc24q_range(bits: &NavBits, start: usize, len: usize) -> Result<u32, BitRangeError> {
    let mut all = Vec::with_capacity(len);
    for i in start..start + len {
        all.push(bits.bit(i)?);
    }
    Ok(crc24q(all))
}

/// True when the 24 bits at `crc_start` match the CRC of `start..start+len`.
pub fn crc24q_check(
    bits: &NavBits,
    start: usize,
    len: usize,
    crc_start: usize,
) -> Result<bool, BitRangeError> {
    let crc = crc24q_range(bits, start, len)?;
    Ok(crc == bits.unsigned(crc_start, 24)? as u32)
}

/// BCH(15,11) generator: x^4 + x + 1
const BCH_POLY: u32 = 0b10011;

/// Remainder of a 15 bit codeword (MSB first) modulo the generator.
fn bch_remainder(codeword: u32) -> u32 {
    let mut rem = codeword & 0x7FFF;
    for i in (4..15).rev() {
        if rem & (1 << i) > 0 {
            rem ^= BCH_POLY << (i - 4);
        }
    }
    rem
}

/// Four parity bits of 11 information bits.
pub fn bch15_11_parity(info: u32) -> u32 {
    bch_remainder((info & 0x7FF) << 4)
}

/// True when the 15 bit codeword is valid.
pub fn bch15_11_check(codeword: u32) -> bool {
    bch_remainder(codeword) == 0
}

/// Checks every BCH codeword of a de-interleaved 300 bit BeiDou D1
/// subframe. Word 1 carries one codeword after 15 uncoded bits,
/// words 2 to 10 carry two: 11 + 11 information bits then 4 + 4
/// parity bits. Returns the first failing word (1..=10).
pub fn bds_check(bits: &NavBits) -> Result<Option<usize>, BitRangeError> {
    let word1 = bits.unsigned(15, 15)? as u32;
    if !bch15_11_check(word1) {
        return Ok(Some(1));
    }
    for word in 1..10 {
        let start = word * 30;
        let info_a = bits.unsigned(start, 11)? as u32;
        let info_b = bits.unsigned(start + 11, 11)? as u32;
        let par_a = bits.unsigned(start + 22, 4)? as u32;
        let par_b = bits.unsigned(start + 26, 4)? as u32;
        if !bch15_11_check((info_a << 4) | par_a) || !bch15_11_check((info_b << 4) | par_b) {
            return Ok(Some(word + 1));
        }
    }
    Ok(None)
}

/// Encodes a BeiDou D1 subframe from its 15 uncoded header bits,
/// 11 word 1 information bits and the 22 information bits of
/// words 2 to 10.
pub fn bds_encode(header: u32, word1_info: u32, words: &[u32; 9]) -> Vec<bool> {
    let mut out = Vec::with_capacity(300);
    let mut push = |value: u32, width: usize| {
        for i in (0..width).rev() {
            out.push((value >> i) & 0x01 > 0);
        }
    };
    push(header, 15);
    push(word1_info, 11);
    push(bch15_11_parity(word1_info), 4);
    for info in words.iter() {
        let info_a = (info >> 11) & 0x7FF;
        let info_b = info & 0x7FF;
        push(info_a, 11);
        push(info_b, 11);
        push(bch15_11_parity(info_a), 4);
        push(bch15_11_parity(info_b), 4);
    }
    out
}

/// Hamming code position (1 based) of each GLONASS data bit b9..b84,
/// power of two positions being reserved to check bits.
fn glonass_positions() -> impl Iterator<Item = usize> {
    (1..).filter(|p: &usize| !p.is_power_of_two()).take(76)
}

/// Outcome of a GLONASS string check
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HammingOutcome {
    /// No error
    Valid,
    /// Single error, corrected at this container index
    Corrected(usize),
    /// Uncorrectable
    Invalid,
}

/// Container index of data bit `b_j` (j = 9..=84): b85 is index 0
fn glonass_index(j: usize) -> usize {
    85 - j
}

/// Seven Hamming check bits β1..β7 and the overall parity β8 of the
/// 76 data bits b9..b84, `data[0]` being b9.
fn glonass_check_bits(data: &[bool]) -> [bool; 8] {
    let mut beta = [false; 8];
    for (bit, pos) in data.iter().zip(glonass_positions()) {
        if *bit {
            for (k, b) in beta.iter_mut().enumerate().take(7) {
                if pos & (1 << k) > 0 {
                    *b = !*b;
                }
            }
        }
    }
    let data_parity = data.iter().filter(|b| **b).count() % 2 == 1;
    let check_parity = beta.iter().take(7).filter(|b| **b).count() % 2 == 1;
    beta[7] = data_parity ^ check_parity;
    beta
}

/// Checks (and locates single errors of) an 85 bit GLONASS string.
pub fn glonass_check(bits: &NavBits) -> Result<HammingOutcome, BitRangeError> {
    let mut data = Vec::with_capacity(76);
    for j in 9..=84 {
        data.push(bits.bit(glonass_index(j))?);
    }
    // β1..β8 are b1..b8
    let mut received = [false; 8];
    for (k, beta) in received.iter_mut().enumerate() {
        *beta = bits.bit(glonass_index(k + 1))?;
    }
    let expected = glonass_check_bits(&data);

    let mut syndrome = 0_usize;
    for k in 0..7 {
        if expected[k] != received[k] {
            syndrome |= 1 << k;
        }
    }
    // overall parity over b1..b84 as received
    let overall = (data.iter().filter(|b| **b).count()
        + received.iter().filter(|b| **b).count())
        % 2
        == 1;

    Ok(match (syndrome, overall) {
        (0, false) => HammingOutcome::Valid,
        // error on β8 only
        (0, true) => HammingOutcome::Valid,
        (s, true) => {
            if s.is_power_of_two() {
                // error on a check bit, data intact
                HammingOutcome::Valid
            } else {
                match glonass_positions().position(|p| p == s) {
                    Some(n) => HammingOutcome::Corrected(glonass_index(n + 9)),
                    None => HammingOutcome::Invalid,
                }
            }
        },
        (_, false) => HammingOutcome::Invalid,
    })
}

/// Appends Hamming check bits to 77 bits (idle bit b85 then b84..b9),
/// returning the full 85 bit string.
pub fn glonass_encode(head: &[bool]) -> Vec<bool> {
    let mut out: Vec<bool> = head.iter().take(77).copied().collect();
    out.resize(77, false);
    // data b9..b84 in increasing bit number order
    let data: Vec<bool> = (9..=84).map(|j| out[glonass_index(j)]).collect();
    let beta = glonass_check_bits(&data);
    // b8..b1 follow: β8 first
    for k in (0..8).rev() {
        out.push(beta[k]);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        identity::NavSignalID,
        prelude::{Constellation, Epoch, SV},
    };

    fn container(bits: &[bool]) -> NavBits {
        NavBits::from_bools(
            SV::new(Constellation::GPS, 1),
            NavSignalID::any(),
            Epoch::from_gregorian_utc_at_midnight(2024, 1, 1),
            bits,
        )
    }

    #[test]
    fn crc24q_reference() {
        // CRC of an empty message is zero, a message followed by its
        // CRC has a zero remainder
        assert_eq!(crc24q(std::iter::empty()), 0);
        let msg: Vec<bool> = (0..100).map(|i| i % 3 == 0).collect();
        let crc = crc24q(msg.clone());
        let mut full = msg.clone();
        for i in (0..24).rev() {
            full.push((crc >> i) & 0x01 > 0);
        }
        assert_eq!(crc24q(full), 0);
        // single bit 1 yields the polynomial
        assert_eq!(crc24q([true]), CRC24Q_POLY);
    }

    #[test]
    fn bch_codewords() {
        for info in [0_u32, 1, 0x2AA, 0x7FF, 0x123] {
            let cw = (info << 4) | bch15_11_parity(info);
            assert!(bch15_11_check(cw));
            for flip in 0..15 {
                assert!(!bch15_11_check(cw ^ (1 << flip)));
            }
        }
    }

    #[test]
    fn lnav_parity_roundtrip() {
        let words = [
            0x8B0000, 0x000D00, 0x123456, 0xABCDEF, 0xFFFFFF, 0x000000, 0x5A5A5A, 0xA5A5A5,
            0x0F0F0F, 0x3C3C00,
        ];
        let tx = lnav_encode(&words);
        assert_eq!(tx.len(), 300);
        let bits = container(&tx);
        let recovered = lnav_recover(&bits).unwrap().unwrap();
        for (i, word) in words.iter().enumerate() {
            assert_eq!(recovered.unsigned(i * 30, 24).unwrap() as u32, *word);
        }
        let mut corrupted = tx.clone();
        corrupted[100] = !corrupted[100];
        assert_eq!(lnav_recover(&container(&corrupted)).unwrap(), Err(4));
    }

    #[test]
    fn glonass_hamming() {
        let head: Vec<bool> = (0..77).map(|i| i > 0 && (i * 7) % 5 == 1).collect();
        let string = glonass_encode(&head);
        assert_eq!(string.len(), 85);
        assert_eq!(
            glonass_check(&container(&string)).unwrap(),
            HammingOutcome::Valid
        );
        let mut single = string.clone();
        single[30] = !single[30];
        assert_eq!(
            glonass_check(&container(&single)).unwrap(),
            HammingOutcome::Corrected(30)
        );
        let mut double = string.clone();
        double[30] = !double[30];
        double[31] = !double[31];
        assert_eq!(
            glonass_check(&container(&double)).unwrap(),
            HammingOutcome::Invalid
        );
    }

    #[test]
    fn bds_subframe() {
        let words = [0x3FFFFF, 0, 0x155555, 0x2AAAAA, 1, 2, 3, 4, 5];
        let tx = bds_encode(0x712 << 4, 0x1AB, &words);
        assert_eq!(tx.len(), 300);
        assert_eq!(bds_check(&container(&tx)).unwrap(), None);
        let mut corrupted = tx.clone();
        corrupted[200] = !corrupted[200];
        assert_eq!(bds_check(&container(&corrupted)).unwrap(), Some(7));
    }
}
