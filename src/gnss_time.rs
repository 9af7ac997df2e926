//! Week / second of week helpers, in the broadcast time scales.
use hifitime::{Duration, Epoch, TimeScale};

/// Seconds in one week
pub const SECONDS_PER_WEEK: f64 = 604_800.0;

/// Seconds in one day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Returns (week, second of week) of `t`, expressed in `ts`.
/// Weeks are counted from the reference epoch of `ts`, which is what
/// GPS, Galileo and BeiDou broadcast.
pub fn week_seconds(t: Epoch, ts: TimeScale) -> (u32, f64) {
    let total = t.to_duration_in_time_scale(ts).to_seconds();
    let week = (total / SECONDS_PER_WEEK).floor();
    let sow = total - week * SECONDS_PER_WEEK;
    (week.max(0.0) as u32, sow)
}

/// Builds an [Epoch] from a full week counter and second of week.
pub fn from_week_seconds(week: u32, sow: f64, ts: TimeScale) -> Epoch {
    let total = week as f64 * SECONDS_PER_WEEK + sow;
    Epoch::from_duration(Duration::from_seconds(total), ts)
}

/// Expands a truncated week counter of `bits` bits to the full week
/// nearest to `ref_week`.
pub fn adjust_week_rollover(wn: u32, ref_week: u32, bits: u32) -> u32 {
    let modulus = 1_i64 << bits;
    let half = modulus / 2;
    let wn = wn as i64 % modulus;
    let ref_week = ref_week as i64;
    let base = ref_week - ref_week.rem_euclid(modulus);
    let mut full = base + wn;
    if full - ref_week > half {
        full -= modulus;
    } else if ref_week - full > half {
        full += modulus;
    }
    full.max(0) as u32
}

/// Expands a time of week (`toe`, `toa`..) to the [Epoch] nearest to
/// `reference`, handling the week crossing in both directions.
pub fn nearest_week_epoch(tow: f64, reference: Epoch, ts: TimeScale) -> Epoch {
    let (week, sow) = week_seconds(reference, ts);
    let mut week = week as i64;
    let dt = tow - sow;
    if dt > SECONDS_PER_WEEK / 2.0 {
        week -= 1;
    } else if dt < -SECONDS_PER_WEEK / 2.0 {
        week += 1;
    }
    from_week_seconds(week.max(0) as u32, tow, ts)
}

/// Rounds `t` down to a multiple of `period` seconds (within the week).
pub fn round_down(t: Epoch, ts: TimeScale, period: f64) -> Epoch {
    let (week, sow) = week_seconds(t, ts);
    from_week_seconds(week, (sow / period).floor() * period, ts)
}

/// Rounds `t` up to a multiple of `period` seconds (within the week).
pub fn round_up(t: Epoch, ts: TimeScale, period: f64) -> Epoch {
    let (week, sow) = week_seconds(t, ts);
    from_week_seconds(week, (sow / period).ceil() * period, ts)
}

/// Latest of a list of epochs.
pub(crate) fn latest(epochs: &[Epoch]) -> Option<Epoch> {
    epochs.iter().copied().max()
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn week_rollover() {
        assert_eq!(adjust_week_rollover(0, 2048, 10), 2048);
        assert_eq!(adjust_week_rollover(1023, 2048, 10), 2047);
        assert_eq!(adjust_week_rollover(5, 2300, 10), 2053);
        assert_eq!(adjust_week_rollover(250, 2303, 8), 2298);
        assert_eq!(adjust_week_rollover(2, 2303, 8), 2306);
    }
    #[test]
    fn week_second_round_trip() {
        let t = from_week_seconds(2200, 345_600.0, TimeScale::GPST);
        let (week, sow) = week_seconds(t, TimeScale::GPST);
        assert_eq!(week, 2200);
        assert!((sow - 345_600.0).abs() < 1.0E-6);
    }
    #[test]
    fn nearest_week() {
        let reference = from_week_seconds(2200, 600_000.0, TimeScale::GPST);
        let t = nearest_week_epoch(7_200.0, reference, TimeScale::GPST);
        assert_eq!(t, from_week_seconds(2201, 7_200.0, TimeScale::GPST));
        let reference = from_week_seconds(2200, 1_000.0, TimeScale::GPST);
        let t = nearest_week_epoch(597_600.0, reference, TimeScale::GPST);
        assert_eq!(t, from_week_seconds(2199, 597_600.0, TimeScale::GPST));
    }
    #[test]
    fn rounding() {
        let t = from_week_seconds(2200, 7_300.0, TimeScale::GPST);
        assert_eq!(
            round_down(t, TimeScale::GPST, 7_200.0),
            from_week_seconds(2200, 7_200.0, TimeScale::GPST)
        );
        assert_eq!(
            round_up(t, TimeScale::GPST, 900.0),
            from_week_seconds(2200, 8_100.0, TimeScale::GPST)
        );
    }
}
