use nalgebra::Vector3;

use crate::{
    decoder::{DecodingError, GloFnavDecoder, NavDecoder},
    identity::{NavMessageType, NavSignalID},
    navigation::{Ephemeris, Isc, SVHealth},
    prelude::{Duration, Epoch},
    tests::toolkit::*,
};

const KM: f64 = 2048.0;

fn string1() -> Vec<bool> {
    glonass_string(&[
        (84, 81, 1),
        (78, 77, 1),
        (35, 9, sign_magnitude((10_000.0 * KM) as i64, 27)),
    ])
}

fn string2() -> Vec<bool> {
    glonass_string(&[
        (84, 81, 2),
        (76, 70, 48),
        (35, 9, sign_magnitude((-5_000.0 * KM) as i64, 27)),
    ])
}

fn string3() -> Vec<bool> {
    glonass_string(&[
        (84, 81, 3),
        (35, 9, sign_magnitude((20_000.0 * KM) as i64, 27)),
    ])
}

pub fn string4(slot: u8) -> Vec<bool> {
    glonass_string(&[
        (84, 81, 4),
        (80, 59, sign_magnitude(-1000, 22)),
        (58, 54, 3),
        (15, 11, slot as u64),
    ])
}

#[test]
fn string4_isc() {
    let mut decoder = GloFnavDecoder::new();
    let t = Epoch::from_gregorian_utc(2024, 1, 1, 9, 0, 6, 0);
    let bits = unit(glonass(5), NavSignalID::glo_fnav_g1(), t, &string4(5));
    let records = decoder.decode(&bits).unwrap();
    assert_eq!(records.len(), 1);
    match records[0].as_isc() {
        Some(Isc::GloFnav(isc)) => assert_eq!(isc.delta_tau_n, 3.0 * 2.0_f64.powi(-30)),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn hamming_correction() {
    let t = Epoch::from_gregorian_utc(2024, 1, 1, 9, 0, 6, 0);
    let bits = unit(glonass(5), NavSignalID::glo_fnav_g2(), t, &string4(5));
    let clean = GloFnavDecoder::new().decode(&bits).unwrap();

    let mut decoder = GloFnavDecoder::new();
    let corrected = decoder.decode(&corrupt(&bits, 30)).unwrap();
    assert_eq!(corrected, clean);
    assert_eq!(decoder.stats().parity_errors, 0);

    let double = corrupt(&corrupt(&bits, 30), 40);
    assert_eq!(decoder.decode(&double), Err(DecodingError::Checksum));
    assert_eq!(decoder.stats().parity_errors, 1);
}

#[test]
fn bad_length() {
    let mut decoder = GloFnavDecoder::new();
    let t = Epoch::from_gregorian_utc(2024, 1, 1, 9, 0, 0, 0);
    let bits = unit(glonass(5), NavSignalID::glo_fnav_g1(), t, &[false; 84]);
    assert_eq!(
        decoder.decode(&bits),
        Err(DecodingError::BadLength {
            expected: 85,
            got: 84
        })
    );
}

#[test]
fn ephemeris() {
    let mut decoder = GloFnavDecoder::new();
    let t0 = Epoch::from_gregorian_utc(2024, 1, 1, 9, 0, 0, 0);
    let strings = [string1(), string2(), string3(), string4(5)];
    let mut records = Vec::new();
    for (i, string) in strings.iter().enumerate() {
        let xmit = t0 + Duration::from_seconds(2.0 * i as f64);
        records.extend(
            decoder
                .decode(&unit(glonass(5), NavSignalID::glo_fnav_g1(), xmit, string))
                .unwrap(),
        );
    }
    assert_eq!(records.len(), 3);
    let health = records
        .iter()
        .find(|r| r.kind() == NavMessageType::Health)
        .unwrap();
    assert!(health.validate());
    assert_eq!(health.health(), Some(SVHealth::Healthy));

    let record = records
        .iter()
        .find(|r| r.kind() == NavMessageType::Ephemeris)
        .unwrap();
    assert_eq!(record.timestamp, t0);
    match record.as_ephemeris() {
        Some(Ephemeris::GloFnav(eph)) => {
            // tb = 12:00 Moscow time
            assert_eq!(eph.toe, t0);
            assert_eq!(eph.pos, Vector3::new(1.0E7, -5.0E6, 2.0E7));
            assert_eq!(eph.vel, Vector3::zeros());
            assert_eq!(eph.interval, 30);
            assert_eq!(eph.slot, 5);
            assert_eq!(eph.tau_n, -1000.0 * 2.0_f64.powi(-30));
            assert_eq!(eph.bn, 0);
            assert!(!eph.ln);
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn strings_must_be_consecutive() {
    let mut decoder = GloFnavDecoder::new();
    let t0 = Epoch::from_gregorian_utc(2024, 1, 1, 9, 0, 0, 0);
    let signal = NavSignalID::glo_fnav_g1();
    for (i, string) in [string1(), string2(), string3()].iter().enumerate() {
        let xmit = t0 + Duration::from_seconds(2.0 * i as f64);
        decoder.decode(&unit(glonass(5), signal, xmit, string)).unwrap();
    }
    // next frame string 4
    let late = t0 + Duration::from_seconds(36.0);
    let records = decoder
        .decode(&unit(glonass(5), signal, late, &string4(5)))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind(), NavMessageType::ISC);
}
