use crate::{
    decoder::{DecodingError, GpsLnavDecoder, NavDecoder},
    identity::{NavMessageType, NavSignalID},
    library::{NavLibrary, RecordSource},
    navigation::{Ephemeris, GpsLnavHealth, Health, NavRecord, SVHealth},
    prelude::Duration,
    store::{NavStore, StoreError},
    tests::toolkit::*,
};

pub const WEEK: u32 = 2300;
const IOD: u64 = 0x2a;
const TOE: u64 = 352_800;
const SQRT_A: f64 = 5153.6;

pub fn subframe1(preamble: u8, health: u64) -> Vec<bool> {
    let mut content = lnav_header(preamble, 1);
    content.extend([
        (60, 10, (WEEK % 1024) as u64),
        (76, 6, health),
        (196, 8, twos(-10, 8)),
        (210, 8, IOD),
        (218, 16, TOE / 16),
    ]);
    lnav_subframe(&content)
}

fn subframe2() -> Vec<bool> {
    let sqrt_a = (SQRT_A * 2.0_f64.powi(19)).round() as u64;
    let ecc = (0.01 * 2.0_f64.powi(33)).round() as u64;
    let mut content = lnav_header(0x8b, 2);
    content.extend([
        (60, 8, IOD),
        (166, 8, ecc >> 24),
        (180, 24, ecc & 0xFFFFFF),
        (226, 8, sqrt_a >> 24),
        (240, 24, sqrt_a & 0xFFFFFF),
        (270, 16, TOE / 16),
    ]);
    lnav_subframe(&content)
}

fn subframe3() -> Vec<bool> {
    let i0 = (0.3 * 2.0_f64.powi(31)).round() as u64;
    let mut content = lnav_header(0x8b, 3);
    content.extend([(136, 8, i0 >> 24), (150, 24, i0 & 0xFFFFFF), (270, 8, IOD)]);
    lnav_subframe(&content)
}

#[test]
fn health_preamble() {
    let mut decoder = GpsLnavDecoder::new();
    let t0 = gpst(WEEK, 349_200.0);
    let store = NavStore::new();

    let valid = unit(gps(7), NavSignalID::gps_lnav(), t0, &subframe1(0x8b, 0));
    let records = decoder.decode(&valid).unwrap();
    assert_eq!(records.len(), 2);
    let health = records
        .iter()
        .find(|r| r.kind() == NavMessageType::Health)
        .unwrap();
    assert_eq!(health.health(), Some(SVHealth::Healthy));
    for record in records {
        assert_eq!(store.insert(record), Ok(true));
    }

    let invalid = unit(gps(8), NavSignalID::gps_lnav(), t0, &subframe1(0x8c, 0));
    let records = decoder.decode(&invalid).unwrap();
    assert_eq!(records.len(), 2);
    for record in records {
        assert!(!record.validate());
        assert_eq!(store.insert(record), Err(StoreError::Validation));
    }
    assert_eq!(store.size(), 2);
    assert_eq!(store.num_satellites(), 1);
}

/// Raw LNAV health bits of a health record
fn lnav_health(record: &NavRecord) -> Option<u8> {
    match record.as_health() {
        Some(Health::GpsLnav(GpsLnavHealth { bits, .. })) => Some(*bits),
        _ => None,
    }
}

#[test]
fn health_codes() {
    let mut decoder = GpsLnavDecoder::new();
    let t0 = gpst(WEEK, 349_200.0);

    // 0b101010: signal component problems
    let sf1 = unit(gps(7), NavSignalID::gps_lnav(), t0, &subframe1(0x8b, 0x2a));
    let records = decoder.decode(&sf1).unwrap();
    let health = records
        .iter()
        .find(|r| r.kind() == NavMessageType::Health)
        .unwrap();
    assert_eq!(lnav_health(health), Some(0x2a));
    assert_eq!(health.health(), Some(SVHealth::Unhealthy));
    assert_eq!(health.sv(), Some(gps(7)));
    assert!(health.validate());

    // subframe 5 page 25: PRN 1 healthy, PRN 3 with code 0x2a
    let mut content = lnav_header(0x8b, 5);
    content.extend([(60, 2, 1), (62, 6, 51), (68, 8, 0x90), (76, 8, WEEK as u64 % 256)]);
    content.push((102, 6, 0x2a));
    let page = unit(
        gps(7),
        NavSignalID::gps_lnav(),
        t0 + Duration::from_seconds(24.0),
        &lnav_subframe(&content),
    );
    let records = decoder.decode(&page).unwrap();
    assert_eq!(records.len(), 24);
    let of = |prn| {
        records
            .iter()
            .find(|r| r.sv() == Some(gps(prn)))
            .unwrap()
    };
    assert_eq!(lnav_health(of(1)), Some(0));
    assert_eq!(of(1).health(), Some(SVHealth::Healthy));
    assert_eq!(lnav_health(of(3)), Some(0x2a));
    assert_eq!(of(3).health(), Some(SVHealth::Unhealthy));
    assert_eq!(of(3).xmit_sv(), Some(gps(7)));
    assert_eq!(lnav_health(of(4)), Some(0));
}

fn decode_all(decoder: &mut GpsLnavDecoder, units: &[Vec<bool>], t0: crate::prelude::Epoch) -> Vec<NavRecord> {
    let mut records = Vec::new();
    for (i, bits) in units.iter().enumerate() {
        let xmit = t0 + Duration::from_seconds(6.0 * i as f64);
        records.extend(
            decoder
                .decode(&unit(gps(7), NavSignalID::gps_lnav(), xmit, bits))
                .unwrap(),
        );
    }
    records
}

#[test]
fn ephemeris_and_xvt() {
    let mut decoder = GpsLnavDecoder::new();
    let t0 = gpst(WEEK, 349_200.0);
    let records = decode_all(
        &mut decoder,
        &[subframe1(0x8b, 0), subframe2(), subframe3()],
        t0,
    );
    let eph = records
        .iter()
        .find(|r| r.kind() == NavMessageType::Ephemeris)
        .unwrap();
    match eph.as_ephemeris() {
        Some(Ephemeris::GpsLnav(lnav)) => {
            assert_eq!(lnav.iodc, IOD as u16);
            assert_eq!(lnav.iode, IOD as u8);
            assert_eq!(lnav.orbit.toe, gpst(WEEK, TOE as f64));
            assert!((lnav.orbit.a.sqrt() - SQRT_A).abs() < 1.0E-5);
            assert!((lnav.orbit.ecc - 0.01).abs() < 1.0E-9);
        },
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(eph.user_time(), t0 + Duration::from_seconds(18.0));
    assert_eq!(eph.fit.begin, gpst(WEEK, 345_600.0));
    assert!(eph.validate());

    let mut library = NavLibrary::new();
    let report = library.add_source(RecordSource::new("lnav", records)).unwrap();
    assert_eq!(report.satellites, 1);

    let when = t0 + Duration::from_seconds(100.0);
    let xvt = library.xvt(gps(7), when, false).unwrap();
    let radius = xvt.x.norm();
    assert!(radius > 26.2E6 && radius < 26.9E6, "radius {}", radius);
    assert_eq!(library.health(gps(7), when), Some(SVHealth::Healthy));
    assert!(library.xvt(gps(7), t0, false).is_none());
    assert!(library.xvt(gps(9), when, true).is_none());
}

#[test]
fn parity_failure_recovery() {
    init_logger();
    let mut decoder = GpsLnavDecoder::new();
    let t0 = gpst(WEEK, 349_200.0);
    let signal = NavSignalID::gps_lnav();
    let sf1 = unit(gps(7), signal, t0, &subframe1(0x8b, 0));
    let sf2 = unit(gps(7), signal, t0 + Duration::from_seconds(6.0), &subframe2());
    let sf3 = unit(gps(7), signal, t0 + Duration::from_seconds(12.0), &subframe3());

    assert_eq!(decoder.decode(&sf1).unwrap().len(), 2);
    assert_eq!(
        decoder.decode(&corrupt(&sf2, 95)),
        Err(DecodingError::Parity { word: 4 })
    );
    assert_eq!(decoder.stats().parity_errors, 1);

    // subframe 1 was dropped with the failing unit
    assert!(decoder.decode(&sf3).unwrap().is_empty());
    assert!(decoder.decode(&sf2).unwrap().is_empty());
    let records = decoder.decode(&sf1).unwrap();
    assert_eq!(
        records
            .iter()
            .filter(|r| r.kind() == NavMessageType::Ephemeris)
            .count(),
        1
    );
    assert_eq!(decoder.stats().units, 5);
}
