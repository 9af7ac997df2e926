use crate::{
    config::NavConfig,
    identity::{NavMessageID, NavMessageType, NavSatelliteID, NavSignalID, WildSatID},
    navigation::{
        Ephemeris, GpsLnavEphemeris, KeplerOrbit, LnavHeader, NavData, NavRecord,
        NavSearchOrder, NavValidityType,
    },
    prelude::{Constellation, Epoch, SV},
    store::NavStore,
    tests::toolkit::*,
};

const WEEK: u32 = 2300;

pub fn lnav_ephemeris(prn: u8, xmit_sow: f64, toe_sow: f64, preamble: u8) -> NavRecord {
    let mut orbit = KeplerOrbit::new(gpst(WEEK, toe_sow));
    orbit.a = 5153.6 * 5153.6;
    orbit.i0 = 0.3 * std::f64::consts::PI;
    let header = |subframe| LnavHeader {
        preamble,
        subframe,
        ..Default::default()
    };
    let xmit = [
        gpst(WEEK, xmit_sow),
        gpst(WEEK, xmit_sow + 6.0),
        gpst(WEEK, xmit_sow + 12.0),
    ];
    NavRecord::new(
        NavSatelliteID::own(gps(prn), NavSignalID::gps_lnav()),
        xmit[0],
        NavData::Ephemeris(Ephemeris::GpsLnav(GpsLnavEphemeris {
            orbit,
            headers: [header(1), header(2), header(3)],
            xmit,
            iodc: 1,
            iode: 1,
            fit_interval: false,
            ura: 0,
            health: 0,
            l2_codes: 0,
            l2p_data: false,
            tgd: 0.0,
            aodo: 0.0,
        })),
    )
}

fn ephemeris_of(sat: WildSatID) -> NavMessageID {
    NavMessageID::new(
        NavSatelliteID::pattern(sat, NavSignalID::any()),
        NavMessageType::Ephemeris,
    )
}

fn find(store: &NavStore, sat: WildSatID, when: Epoch, order: NavSearchOrder) -> Option<SV> {
    store
        .find(&ephemeris_of(sat), when, NavValidityType::ValidOnly, order)
        .and_then(|record| record.sv())
}

#[test]
fn fit_ordering() {
    let store = NavStore::new();
    let record = lnav_ephemeris(7, 352_800.0, 360_000.0, 0x8b);
    assert_eq!(record.user_time(), gpst(WEEK, 352_818.0));
    assert_eq!(record.fit.begin, gpst(WEEK, 352_800.0));
    assert_eq!(record.fit.end, Some(gpst(WEEK, 367_200.0)));
    assert!(record.fit.begin <= record.user_time());
    assert_eq!(store.insert(record), Ok(true));

    let g07 = WildSatID::exact(gps(7));
    // transmitted, not yet received
    let early = gpst(WEEK, 352_810.0);
    assert_eq!(find(&store, g07, early, NavSearchOrder::User), None);
    assert_eq!(find(&store, g07, early, NavSearchOrder::Nearest), Some(gps(7)));
    // received, fit interval over
    let late = gpst(WEEK, 368_000.0);
    assert_eq!(find(&store, g07, late, NavSearchOrder::User), Some(gps(7)));
    assert_eq!(find(&store, g07, late, NavSearchOrder::Nearest), None);
    assert_eq!(find(&store, g07, late, NavSearchOrder::Unknown), None);
}

#[test]
fn wildcard_find() {
    let store = NavStore::new();
    store.insert(lnav_ephemeris(7, 345_600.0, 352_800.0, 0x8b)).unwrap();
    store.insert(lnav_ephemeris(8, 349_200.0, 352_800.0, 0x8b)).unwrap();
    let when = gpst(WEEK, 350_000.0);
    let any_gps = WildSatID::any_prn(Constellation::GPS);

    assert_eq!(find(&store, any_gps, when, NavSearchOrder::User), Some(gps(8)));
    assert_eq!(find(&store, WildSatID::any(), when, NavSearchOrder::User), Some(gps(8)));
    assert_eq!(find(&store, WildSatID::exact(gps(7)), when, NavSearchOrder::User), Some(gps(7)));
    assert_eq!(find(&store, WildSatID::any_system(7), when, NavSearchOrder::User), Some(gps(7)));
    assert_eq!(
        find(&store, WildSatID::any_prn(Constellation::Galileo), when, NavSearchOrder::User),
        None
    );

    // newer upload for G07
    store.insert(lnav_ephemeris(7, 349_800.0, 356_400.0, 0x8b)).unwrap();
    assert_eq!(find(&store, any_gps, when, NavSearchOrder::User), Some(gps(7)));
    let record = store
        .find(&ephemeris_of(WildSatID::exact(gps(7))), when, NavValidityType::ValidOnly, NavSearchOrder::User)
        .unwrap();
    assert_eq!(record.timestamp, gpst(WEEK, 349_800.0));
}

#[test]
fn validity_filters() {
    let store = NavStore::with_config(&NavConfig::default().with_store_validity(NavValidityType::Any));
    store.insert(lnav_ephemeris(7, 345_600.0, 352_800.0, 0x8b)).unwrap();
    store.insert(lnav_ephemeris(7, 349_200.0, 352_800.0, 0x8c)).unwrap();
    assert_eq!(store.size(), 2);

    let id = ephemeris_of(WildSatID::exact(gps(7)));
    let when = gpst(WEEK, 350_000.0);
    let pick = |validity| {
        store
            .find(&id, when, validity, NavSearchOrder::User)
            .map(|record| record.timestamp)
    };
    assert_eq!(pick(NavValidityType::ValidOnly), Some(gpst(WEEK, 345_600.0)));
    assert_eq!(pick(NavValidityType::InvalidOnly), Some(gpst(WEEK, 349_200.0)));
    assert_eq!(pick(NavValidityType::Any), Some(gpst(WEEK, 349_200.0)));
    assert_eq!(pick(NavValidityType::Unknown), None);
}

#[test]
fn edition() {
    let store = NavStore::new();
    assert!(store.is_empty());
    assert_eq!(store.first_time(), None);
    for (prn, sow) in [(7, 345_600.0), (8, 349_200.0), (9, 352_800.0)] {
        store.insert(lnav_ephemeris(prn, sow, 352_800.0, 0x8b)).unwrap();
    }
    assert_eq!(store.size(), 3);
    assert_eq!(store.num_satellites(), 3);
    assert_eq!(store.num_signals(), 1);
    assert_eq!(store.first_time(), Some(gpst(WEEK, 345_618.0)));
    assert_eq!(store.last_time(), Some(gpst(WEEK, 352_818.0)));

    let mut dump = Vec::new();
    store.dump(&mut dump).unwrap();
    let dump = String::from_utf8(dump).unwrap();
    assert_eq!(dump.lines().count(), 3);

    // G08 lies outside the window
    assert_eq!(store.edit_sat(gps(8), gpst(WEEK, 345_000.0), gpst(WEEK, 349_000.0)), 0);
    assert_eq!(store.edit_sat(gps(8), gpst(WEEK, 345_000.0), gpst(WEEK, 350_000.0)), 1);
    assert!(!store.available_sats().contains(&gps(8)));
    assert_eq!(store.edit_signal(&NavSignalID::gal_fnav(), gpst(WEEK, 0.0), gpst(WEEK, 600_000.0)), 0);
    assert_eq!(store.edit(gpst(WEEK, 345_618.0), gpst(WEEK, 352_818.0)), 1);
    assert_eq!(store.available_sats().into_iter().collect::<Vec<_>>(), vec![gps(9)]);
    store.clear();
    assert_eq!(store.size(), 0);
}
