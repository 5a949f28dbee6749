use chrono::{DateTime, Utc};
use log::debug;

use crate::db::models::{Sample, Trip, TripMetrics};
use crate::events::TripEvent;
use crate::segmentation::{config::SegmentationConfig, session::SegmentationSession};

/// Run one full segmentation pass over a merged sample buffer.
///
/// The session is reset first: the trip list is rebuilt from scratch on every
/// pass and ids restart at 1, so replaying an unchanged buffer is
/// deterministic. Returns the start/end notifications in the order they were
/// confirmed; each logical trip produces exactly one `TripStarted` and at most
/// one `TripEnded` within a pass.
///
/// `now` is the wall-clock instant the pass runs at. It feeds only the session
/// timeout check; trip boundaries always come from sample timestamps.
pub fn run_pass(
    session: &mut SegmentationSession,
    samples: &[Sample],
    now: DateTime<Utc>,
    config: &SegmentationConfig,
) -> Vec<TripEvent> {
    session.reset();

    let mut events = Vec::new();

    if samples.len() < 2 {
        return events;
    }

    // Stale-buffer check up front: if the newest data is already past the
    // session timeout and a trip is open, force-close it and skip the pass.
    if close_on_timeout(session, samples, now, config, &mut events) {
        return events;
    }

    for sample in samples {
        if session.in_trip {
            process_in_trip(session, sample, samples, config, &mut events);
        } else {
            process_no_trip(session, sample, samples, config, &mut events);
        }
    }

    // The pass may have left a trip open with no fresher data to close it;
    // re-check the timeout against the end of the buffer.
    close_on_timeout(session, samples, now, config, &mut events);

    events
}

fn process_no_trip(
    session: &mut SegmentationSession,
    sample: &Sample,
    buffer: &[Sample],
    config: &SegmentationConfig,
    events: &mut Vec<TripEvent>,
) {
    if !sample.is_moving() {
        // Any observed stop resets the dwell clock.
        session.candidate_start = None;
        return;
    }

    match session.candidate_start {
        None => {
            session.candidate_start = Some(sample.timestamp);
            debug!("potential trip start at {}", sample.timestamp);
        }
        Some(candidate) => {
            let moving_secs = (sample.timestamp - candidate).num_seconds();
            if moving_secs >= config.start_dwell_secs {
                let trip_id = session.allocate_trip_id();
                let start_charge = charge_nearest(buffer, candidate);
                let trip = Trip::open(trip_id, candidate, start_charge);

                debug!(
                    "trip {trip_id} started at {} (start charge {start_charge:.1}%)",
                    trip.start_time
                );
                events.push(TripEvent::TripStarted {
                    trip_id,
                    start_time: trip.start_time,
                });

                session.trips.push(trip);
                session.in_trip = true;
                session.candidate_start = None;
            }
        }
    }
    session.last_movement = Some(sample.timestamp);
}

fn process_in_trip(
    session: &mut SegmentationSession,
    sample: &Sample,
    buffer: &[Sample],
    config: &SegmentationConfig,
    events: &mut Vec<TripEvent>,
) {
    if let Some(trip) = session.trips.last_mut() {
        trip.samples.push(sample.clone());
    }

    if sample.is_moving() {
        session.last_movement = Some(sample.timestamp);
        session.candidate_stop = None;
        return;
    }

    match session.candidate_stop {
        None => {
            session.candidate_stop = Some(sample.timestamp);
        }
        Some(candidate) => {
            let stopped_secs = (sample.timestamp - candidate).num_seconds();
            if stopped_secs >= config.stop_dwell_secs {
                // End at the first non-moving sample, not the confirming one.
                if let Some(trip) = session.trips.last_mut() {
                    close_trip(trip, candidate, buffer, config, events);
                }
                session.in_trip = false;
                session.candidate_stop = None;
            }
        }
    }
}

/// Force-close the open trip when the buffer has gone stale.
///
/// Returns true when a close happened; the caller then suppresses any further
/// segmentation for the cycle. The trip ends at the last *data* timestamp,
/// never at wall-clock `now`.
fn close_on_timeout(
    session: &mut SegmentationSession,
    samples: &[Sample],
    now: DateTime<Utc>,
    config: &SegmentationConfig,
    events: &mut Vec<TripEvent>,
) -> bool {
    let Some(last) = samples.last() else {
        return false;
    };

    let since_last_data = (now - last.timestamp).num_seconds();
    if since_last_data < config.session_timeout_secs || !session.has_open_trip() {
        return false;
    }

    let last_data_time = last.timestamp;
    if let Some(trip) = session.trips.last_mut() {
        if trip.is_open() {
            debug!(
                "trip {} force-ended at {last_data_time} ({since_last_data}s since last data)",
                trip.id
            );
            close_trip(trip, last_data_time, samples, config, events);
        }
    }

    session.in_trip = false;
    session.candidate_start = None;
    session.candidate_stop = None;
    true
}

fn close_trip(
    trip: &mut Trip,
    end_time: DateTime<Utc>,
    buffer: &[Sample],
    config: &SegmentationConfig,
    events: &mut Vec<TripEvent>,
) {
    trip.end_time = Some(end_time);
    trip.end_battery_charge = charge_nearest(buffer, end_time);
    trip.metrics = TripMetrics::compute(
        &trip.samples,
        trip.start_time,
        trip.end_time,
        trip.start_battery_charge,
        trip.end_battery_charge,
        config.battery_capacity_wh,
    );

    events.push(TripEvent::TripEnded {
        trip_id: trip.id,
        end_time,
        max_speed: trip.metrics.max_speed,
        average_speed: trip.metrics.average_speed,
        distance_km: trip.metrics.distance_km,
        duration_secs: trip.metrics.duration_secs,
    });
}

/// Battery charge of the sample closest in time to `target`.
///
/// Linear scan with a stable first-encountered tie-break; a reading of 0 is
/// still a valid reading. Returns 0.0 on an empty buffer. Invoked at most
/// twice per trip (start and end), so O(n) is acceptable.
fn charge_nearest(samples: &[Sample], target: DateTime<Utc>) -> f64 {
    let mut closest_charge = 0.0;
    let mut min_diff = i64::MAX;

    for sample in samples {
        let diff = (sample.timestamp - target).num_seconds().abs();
        if diff < min_diff {
            min_diff = diff;
            closest_charge = sample.battery_charge;
        }
    }

    closest_charge
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(secs: i64, speed: f64) -> Sample {
        Sample::new(ts(secs), speed, 80.0)
    }

    fn config() -> SegmentationConfig {
        SegmentationConfig::default()
    }

    /// 1 Hz buffer: speed 5 m/s through `moving_until`, 0 afterwards.
    fn drive_then_stop(moving_until: i64, total: i64) -> Vec<Sample> {
        (0..=total)
            .map(|t| sample(t, if t <= moving_until { 5.0 } else { 0.0 }))
            .collect()
    }

    fn fresh_now(samples: &[Sample]) -> DateTime<Utc> {
        // Recent enough that the session timeout never fires.
        samples.last().map(|s| s.timestamp).unwrap_or_else(Utc::now) + Duration::seconds(10)
    }

    #[test]
    fn movement_burst_shorter_than_dwell_never_confirms() {
        let samples = drive_then_stop(50, 200);
        let mut session = SegmentationSession::new();

        let events = run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert!(events.is_empty());
        assert!(session.trips.is_empty());
    }

    #[test]
    fn movement_exactly_at_dwell_confirms() {
        let samples: Vec<Sample> = vec![sample(0, 4.0), sample(60, 4.0), sample(61, 4.0)];
        let mut session = SegmentationSession::new();

        let events = run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert_eq!(
            events[0],
            TripEvent::TripStarted {
                trip_id: 1,
                start_time: ts(0),
            }
        );
        assert_eq!(session.trips.len(), 1);
        assert_eq!(session.trips[0].start_time, ts(0));
    }

    #[test]
    fn intervening_stop_resets_start_dwell_clock() {
        let mut samples = vec![sample(0, 3.0), sample(30, 0.0), sample(40, 3.0)];
        samples.push(sample(99, 3.0)); // 59s after the new candidate: not yet
        samples.push(sample(100, 3.0)); // 60s: confirmed
        let mut session = SegmentationSession::new();

        run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert_eq!(session.trips.len(), 1);
        assert_eq!(session.trips[0].start_time, ts(40));
    }

    #[test]
    fn gap_between_two_moving_checkpoints_still_confirms() {
        // No samples at all between the two checkpoints.
        let samples = vec![sample(0, 6.0), sample(120, 6.0), sample(121, 6.0)];
        let mut session = SegmentationSession::new();

        run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert_eq!(session.trips.len(), 1);
        assert_eq!(session.trips[0].start_time, ts(0));
    }

    #[test]
    fn stop_gap_shorter_than_dwell_keeps_trip_open() {
        let mut samples: Vec<Sample> = (0..=70).map(|t| sample(t, 5.0)).collect();
        // 30s pause, then movement resumes until the end of the buffer.
        samples.extend((71..=100).map(|t| sample(t, 0.0)));
        samples.extend((101..=160).map(|t| sample(t, 5.0)));
        let mut session = SegmentationSession::new();

        let events = run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert_eq!(session.trips.len(), 1);
        assert!(session.trips[0].is_open());
        assert_eq!(events.len(), 1); // only the start notification
    }

    #[test]
    fn trip_ends_at_first_non_moving_timestamp() {
        let samples = drive_then_stop(65, 130);
        let mut session = SegmentationSession::new();

        let events = run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert_eq!(session.trips.len(), 1);
        let trip = &session.trips[0];
        assert_eq!(trip.start_time, ts(0));
        // First zero-speed sample is t=66; the confirming sample at t=126
        // must not become the end time.
        assert_eq!(trip.end_time, Some(ts(66)));
        assert_eq!(trip.metrics.duration_secs, 66);

        let ended = events
            .iter()
            .filter(|e| matches!(e, TripEvent::TripEnded { .. }))
            .count();
        let started = events
            .iter()
            .filter(|e| matches!(e, TripEvent::TripStarted { .. }))
            .count();
        assert_eq!((started, ended), (1, 1));
    }

    #[test]
    fn timeout_closes_open_trip_at_last_data_timestamp() {
        let samples: Vec<Sample> = (0..=90).map(|t| sample(t, 5.0)).collect();
        let mut session = SegmentationSession::new();
        let now = ts(90) + Duration::seconds(400);

        let events = run_pass(&mut session, &samples, now, &config());

        assert_eq!(session.trips.len(), 1);
        let trip = &session.trips[0];
        assert_eq!(trip.end_time, Some(ts(90)));
        assert!(matches!(
            events.last(),
            Some(TripEvent::TripEnded { end_time, .. }) if *end_time == ts(90)
        ));
    }

    #[test]
    fn fresh_data_does_not_trigger_timeout() {
        let samples: Vec<Sample> = (0..=90).map(|t| sample(t, 5.0)).collect();
        let mut session = SegmentationSession::new();

        run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert_eq!(session.trips.len(), 1);
        assert!(session.trips[0].is_open());
    }

    #[test]
    fn replay_is_deterministic_and_metrics_identical() {
        let mut samples = drive_then_stop(65, 130);
        // Second trip later in the window.
        samples.extend((200..=270).map(|t| sample(t, 7.0)));
        samples.extend((271..=340).map(|t| sample(t, 0.0)));
        let now = fresh_now(&samples);

        let mut first = SegmentationSession::new();
        let events_a = run_pass(&mut first, &samples, now, &config());
        let mut second = SegmentationSession::new();
        let events_b = run_pass(&mut second, &samples, now, &config());

        assert_eq!(events_a, events_b);
        assert_eq!(first.trips, second.trips);

        let ids: Vec<i64> = first.trips.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn end_to_end_single_trip_scenario() {
        let samples = drive_then_stop(65, 130);
        let mut session = SegmentationSession::new();

        run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert_eq!(session.trips.len(), 1);
        let trip = &session.trips[0];
        assert!(!trip.is_open());
        assert_eq!(trip.start_time, ts(0));
        assert_eq!(trip.end_time, Some(ts(66)));
        assert_eq!(trip.metrics.max_speed, 5.0);
        assert_eq!(trip.start_battery_charge, 80.0);
        assert_eq!(trip.end_battery_charge, 80.0);
    }

    #[test]
    fn tiny_buffer_is_ignored() {
        let samples = vec![sample(0, 5.0)];
        let mut session = SegmentationSession::new();

        let events = run_pass(&mut session, &samples, fresh_now(&samples), &config());

        assert!(events.is_empty());
        assert!(session.trips.is_empty());
    }

    #[test]
    fn charge_nearest_prefers_closest_and_breaks_ties_stably() {
        let samples = vec![
            Sample::new(ts(0), 0.0, 90.0),
            Sample::new(ts(20), 0.0, 70.0),
        ];

        // Equidistant from t=10: the first-encountered sample wins.
        assert_eq!(charge_nearest(&samples, ts(10)), 90.0);
        assert_eq!(charge_nearest(&samples, ts(19)), 70.0);
        assert_eq!(charge_nearest(&[], ts(0)), 0.0);
    }
}
