use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::db::models::Sample;

/// Merge two independently-timestamped signal series into one chronological
/// sequence of joint samples.
///
/// The output covers the union of all timestamps present in either mapping.
/// At a timestamp where a signal has no reading of its own, the last value
/// observed at or before that instant is carried forward; before any value has
/// been observed the carried value is `0.0`. Duplicate timestamps across the
/// two sources collapse to a single sample.
pub fn merge_signals(
    speed_by_time: &BTreeMap<DateTime<Utc>, f64>,
    charge_by_time: &BTreeMap<DateTime<Utc>, f64>,
) -> Vec<Sample> {
    let mut timestamps: Vec<DateTime<Utc>> = speed_by_time
        .keys()
        .chain(charge_by_time.keys())
        .copied()
        .collect();
    timestamps.sort_unstable();
    timestamps.dedup();

    let mut last_known_speed = 0.0;
    let mut last_known_charge = 0.0;
    let mut samples = Vec::with_capacity(timestamps.len());

    for timestamp in timestamps {
        if let Some(speed) = speed_by_time.get(&timestamp) {
            last_known_speed = *speed;
        }
        if let Some(charge) = charge_by_time.get(&timestamp) {
            last_known_charge = *charge;
        }
        samples.push(Sample::new(timestamp, last_known_speed, last_known_charge));
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn union_of_timestamps_sorted_ascending() {
        let speed = BTreeMap::from([(ts(10), 4.0), (ts(30), 5.0)]);
        let charge = BTreeMap::from([(ts(20), 90.0)]);

        let samples = merge_signals(&speed, &charge);

        let timestamps: Vec<_> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![ts(10), ts(20), ts(30)]);
    }

    #[test]
    fn forward_fill_carries_last_known_value() {
        let speed = BTreeMap::from([(ts(0), 2.0), (ts(40), 6.0)]);
        let charge = BTreeMap::from([(ts(20), 80.0)]);

        let samples = merge_signals(&speed, &charge);

        // t=0: charge not yet observed, carries 0.
        assert_eq!(samples[0].speed, 2.0);
        assert_eq!(samples[0].battery_charge, 0.0);
        // t=20: speed carried forward from t=0.
        assert_eq!(samples[1].speed, 2.0);
        assert_eq!(samples[1].battery_charge, 80.0);
        // t=40: charge carried forward from t=20.
        assert_eq!(samples[2].speed, 6.0);
        assert_eq!(samples[2].battery_charge, 80.0);
    }

    #[test]
    fn empty_mapping_fills_zero_for_entire_run() {
        let speed = BTreeMap::from([(ts(0), 1.0), (ts(10), 2.0)]);
        let charge = BTreeMap::new();

        let samples = merge_signals(&speed, &charge);

        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.battery_charge == 0.0));
    }

    #[test]
    fn duplicate_timestamps_collapse_to_one_sample() {
        let speed = BTreeMap::from([(ts(5), 3.0)]);
        let charge = BTreeMap::from([(ts(5), 75.0)]);

        let samples = merge_signals(&speed, &charge);

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].speed, 3.0);
        assert_eq!(samples[0].battery_charge, 75.0);
    }

    #[test]
    fn both_empty_yields_no_samples() {
        let samples = merge_signals(&BTreeMap::new(), &BTreeMap::new());
        assert!(samples.is_empty());
    }
}
