use chrono::{DateTime, Utc};

use crate::db::models::{Sample, TripMetrics};

impl TripMetrics {
    /// Compute the full metric set for a closed (or force-closed) trip.
    ///
    /// `start_charge` and `end_charge` are the values captured at the start
    /// and stop transitions, not re-read from the first/last sample.
    ///
    /// Distance is average speed times duration, not integrated instantaneous
    /// speed; the systematic bias for non-constant speed profiles is accepted.
    pub fn compute(
        samples: &[Sample],
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        start_charge: f64,
        end_charge: f64,
        battery_capacity_wh: f64,
    ) -> Self {
        let mut metrics = TripMetrics {
            battery_used_percent: start_charge - end_charge,
            ..TripMetrics::default()
        };

        if samples.is_empty() {
            return metrics;
        }

        let mut total_speed = 0.0;
        for sample in samples {
            total_speed += sample.speed;
            if sample.speed > metrics.max_speed {
                metrics.max_speed = sample.speed;
            }
        }
        metrics.average_speed = total_speed / samples.len() as f64;

        if let Some(end) = end_time {
            metrics.duration_secs = (end - start_time).num_seconds();
        }

        let avg_speed_kmh = metrics.average_speed * 3.6;
        let duration_hours = metrics.duration_secs as f64 / 3600.0;
        metrics.distance_km = avg_speed_kmh * duration_hours;

        if metrics.battery_used_percent > 0.0 {
            metrics.energy_consumed_wh =
                (metrics.battery_used_percent / 100.0) * battery_capacity_wh;

            if metrics.distance_km > 0.0 {
                metrics.energy_efficiency_wh_per_km =
                    metrics.energy_consumed_wh / metrics.distance_km;
            }
        }

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const CAPACITY_WH: f64 = 230.4;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn constant_speed_samples(speed: f64, count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample::new(ts(i as i64), speed, 80.0))
            .collect()
    }

    #[test]
    fn distance_is_average_speed_times_duration() {
        let samples = constant_speed_samples(10.0, 5);
        let start = ts(0);
        let end = Some(start + Duration::seconds(3600));

        let metrics = TripMetrics::compute(&samples, start, end, 80.0, 80.0, CAPACITY_WH);

        assert_eq!(metrics.duration_secs, 3600);
        assert_eq!(metrics.average_speed, 10.0);
        assert_eq!(metrics.distance_km, 36.0);
    }

    #[test]
    fn energy_from_charge_delta_and_pack_capacity() {
        let samples = constant_speed_samples(10.0, 4);
        let start = ts(0);
        let end = Some(start + Duration::seconds(3600));

        let metrics = TripMetrics::compute(&samples, start, end, 80.0, 60.0, CAPACITY_WH);

        assert_eq!(metrics.battery_used_percent, 20.0);
        assert!((metrics.energy_consumed_wh - 46.08).abs() < 1e-9);
        assert!((metrics.energy_efficiency_wh_per_km - 46.08 / 36.0).abs() < 1e-9);
    }

    #[test]
    fn negative_charge_delta_leaves_energy_fields_zero() {
        let samples = constant_speed_samples(5.0, 4);
        let start = ts(0);
        let end = Some(start + Duration::seconds(600));

        // Charge increased during the trip (regen or sensor noise).
        let metrics = TripMetrics::compute(&samples, start, end, 60.0, 65.0, CAPACITY_WH);

        assert_eq!(metrics.battery_used_percent, -5.0);
        assert_eq!(metrics.energy_consumed_wh, 0.0);
        assert_eq!(metrics.energy_efficiency_wh_per_km, 0.0);
    }

    #[test]
    fn zero_distance_skips_efficiency() {
        let samples: Vec<Sample> = (0..3).map(|i| Sample::new(ts(i), 0.0, 80.0)).collect();
        let start = ts(0);
        let end = Some(ts(120));

        let metrics = TripMetrics::compute(&samples, start, end, 80.0, 70.0, CAPACITY_WH);

        assert_eq!(metrics.distance_km, 0.0);
        assert!(metrics.energy_consumed_wh > 0.0);
        assert_eq!(metrics.energy_efficiency_wh_per_km, 0.0);
    }

    #[test]
    fn empty_sample_set_yields_zero_speed_metrics() {
        let metrics = TripMetrics::compute(&[], ts(0), Some(ts(100)), 80.0, 70.0, CAPACITY_WH);

        assert_eq!(metrics.max_speed, 0.0);
        assert_eq!(metrics.average_speed, 0.0);
        assert_eq!(metrics.distance_km, 0.0);
        assert_eq!(metrics.duration_secs, 0);
        // Charge delta still reflects the captured transition values.
        assert_eq!(metrics.battery_used_percent, 10.0);
    }

    #[test]
    fn missing_end_time_yields_zero_duration() {
        let samples = constant_speed_samples(8.0, 3);
        let metrics = TripMetrics::compute(&samples, ts(0), None, 80.0, 75.0, CAPACITY_WH);

        assert_eq!(metrics.duration_secs, 0);
        assert_eq!(metrics.distance_km, 0.0);
        assert_eq!(metrics.max_speed, 8.0);
    }
}
