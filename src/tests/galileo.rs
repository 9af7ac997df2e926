use crate::{
    decoder::{GalFnavDecoder, NavDecoder},
    identity::{NavMessageType, NavMessageTypes, NavSignalID},
    library::{NavLibrary, RecordSource},
    navigation::{Iono, Isc, SVHealth},
    prelude::{Duration, Epoch, TimeScale},
    tests::toolkit::*,
};

pub fn fnav_page1(svid: u8) -> Vec<bool> {
    fnav_page(&[
        (0, 6, 1),
        (6, 6, svid as u64),
        (94, 8, 107),
        (102, 11, 0x100),
        (143, 10, 10),
        (153, 2, 0),
        (187, 1, 0),
    ])
}

#[test]
fn fnav_page1_records() {
    let mut decoder = GalFnavDecoder::new();
    let t = Epoch::from_gregorian_at_midnight(2024, 6, 1, TimeScale::GST);
    let bits = unit(galileo(11), NavSignalID::gal_fnav(), t, &fnav_page1(11));
    let records = decoder.decode(&bits).unwrap();
    assert_eq!(records.len(), 3);
    let bgd = 10.0 * 2.0_f64.powi(-32);
    for record in records.iter() {
        assert!(record.validate());
        match record.kind() {
            NavMessageType::Health => assert_eq!(record.health(), Some(SVHealth::Healthy)),
            NavMessageType::ISC => match record.as_isc() {
                Some(Isc::GalFnav(isc)) => {
                    assert_eq!(isc.bgd_e1e5a, Some(bgd));
                    assert_eq!(isc.bgd_e1e5b, None);
                },
                other => panic!("unexpected {:?}", other),
            },
            NavMessageType::Iono => assert!(matches!(record.as_iono(), Some(Iono::NeQuick(_)))),
            kind => panic!("unexpected {}", kind),
        }
    }

    let mut library = NavLibrary::new();
    library.add_source(RecordSource::new("fnav", records)).unwrap();
    let when = t + Duration::from_seconds(20.0);
    let gamma = (1575.42_f64 / 1176.45).powi(2);
    let isc = library
        .isc(galileo(11), &NavSignalID::gal_fnav(), when)
        .unwrap();
    assert!((isc + gamma * bgd).abs() < 1.0E-15);
    assert!(library.isc(galileo(12), &NavSignalID::gal_fnav(), when).is_none());
    assert!(library.isc(galileo(11), &NavSignalID::any(), when).is_none());
}

#[test]
fn type_filter() {
    let mut decoder = GalFnavDecoder::new();
    decoder.set_type_filter(NavMessageTypes::ISC);
    let t = Epoch::from_gregorian_at_midnight(2024, 6, 1, TimeScale::GST);
    let bits = unit(galileo(11), NavSignalID::gal_fnav(), t, &fnav_page1(11));
    let records = decoder.decode(&bits).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind(), NavMessageType::ISC);
    assert_eq!(decoder.stats().records, 1);
}
