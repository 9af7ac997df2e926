use crate::{
    decoder::{DecodingError, GpsCnavDecoder, NavDecoder},
    identity::{CarrierBand, NavMessageType, NavSignalID, Wild},
    navigation::SVHealth,
    tests::toolkit::*,
};

fn message10(l2_unhealthy: bool) -> Vec<bool> {
    cnav_message(&[
        (0, 8, 0x8b),
        (8, 6, 12),
        (14, 6, 10),
        (52, 1, l2_unhealthy as u64),
    ])
}

#[test]
fn signal_health() {
    let mut decoder = GpsCnavDecoder::new();
    let t = gpst(2300, 86_400.0);
    let bits = unit(gps(12), NavSignalID::gps_cnav_l2(), t, &message10(true));
    let records = decoder.decode(&bits).unwrap();
    assert_eq!(records.len(), 3);
    for record in records.iter() {
        assert_eq!(record.kind(), NavMessageType::Health);
        assert!(record.validate());
        let expected = if record.id.sat.signal.carrier == Wild::Exact(CarrierBand::L2) {
            SVHealth::Unhealthy
        } else {
            SVHealth::Healthy
        };
        assert_eq!(record.health(), Some(expected));
    }
}

#[test]
fn crc_failure() {
    let mut decoder = GpsCnavDecoder::new();
    let t = gpst(2300, 86_400.0);
    let bits = unit(gps(12), NavSignalID::gps_cnav_l5(), t, &message10(false));
    assert_eq!(decoder.decode(&bits).unwrap().len(), 3);
    assert_eq!(decoder.decode(&corrupt(&bits, 100)), Err(DecodingError::Checksum));
    assert_eq!(decoder.stats().parity_errors, 1);
    assert_eq!(decoder.stats().records, 3);
}
