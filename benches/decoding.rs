//! Benchmarking navigation message decoding
//! through the standard registry
extern crate criterion;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gnss_nav::{
    decoder::checksum::{glonass_encode, lnav_encode},
    prelude::{Constellation, DecoderRegistry, Duration, Epoch, NavBits, NavSignalID, TimeScale, SV},
};

/// Five LNAV subframes, one frame worth of units
fn lnav_frame(t0: Epoch) -> Vec<NavBits> {
    let sv = SV::new(Constellation::GPS, 7);
    (1..=5_u32)
        .map(|subframe| {
            let xmit = t0 + Duration::from_seconds(6.0 * (subframe - 1) as f64);
            let tow = (345_600 / 6 + subframe) & 0x1FFFF;
            let mut words = [0_u32; 10];
            words[0] = 0x8b << 16;
            words[1] = (tow << 7) | (subframe << 2);
            NavBits::from_bools(sv, NavSignalID::gps_lnav(), xmit, &lnav_encode(&words))
        })
        .collect()
}

/// GLONASS strings 1 to 5
fn glonass_strings(t0: Epoch) -> Vec<NavBits> {
    let sv = SV::new(Constellation::Glonass, 5);
    (1..=5_u64)
        .map(|m| {
            let xmit = t0 + Duration::from_seconds(2.0 * (m - 1) as f64);
            let mut head = vec![false; 77];
            // idle bit then m (b84..b81)
            for i in 0..4 {
                head[1 + i] = (m >> (3 - i)) & 0x01 > 0;
            }
            NavBits::from_bools(sv, NavSignalID::glo_fnav_g1(), xmit, &glonass_encode(&head))
        })
        .collect()
}

fn benchmark(c: &mut Criterion) {
    let t0 = Epoch::from_gregorian_at_midnight(2024, 2, 1, TimeScale::GPST);
    let lnav = lnav_frame(t0);
    let glonass = glonass_strings(t0);

    let mut decoding_grp = c.benchmark_group("decoding");

    decoding_grp.bench_function("GPS/LNAV", |b| {
        let mut registry = DecoderRegistry::standard();
        b.iter(|| {
            for unit in lnav.iter() {
                let _ = black_box(registry.decode(unit));
            }
        })
    });

    decoding_grp.bench_function("GLO/FNAV", |b| {
        let mut registry = DecoderRegistry::standard();
        b.iter(|| {
            for unit in glonass.iter() {
                let _ = black_box(registry.decode(unit));
            }
        })
    });

    decoding_grp.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
