use chrono::{DateTime, Utc};

use crate::db::models::Trip;

/// Mutable working state for one segmentation pass.
///
/// Passed explicitly into `run_pass` rather than living as ambient state; the
/// trip list and candidates are rebuilt from scratch every pass, so the store
/// is the only memory that survives across polling cycles.
#[derive(Debug, Default)]
pub struct SegmentationSession {
    pub trips: Vec<Trip>,
    pub in_trip: bool,
    pub next_trip_id: i64,
    pub candidate_start: Option<DateTime<Utc>>,
    pub candidate_stop: Option<DateTime<Utc>>,
    pub last_movement: Option<DateTime<Utc>>,
}

impl SegmentationSession {
    pub fn new() -> Self {
        Self {
            trips: Vec::new(),
            in_trip: false,
            next_trip_id: 1,
            candidate_start: None,
            candidate_stop: None,
            last_movement: None,
        }
    }

    /// Restore the pass-start state: no trips, no candidates, ids from 1.
    pub fn reset(&mut self) {
        self.trips.clear();
        self.in_trip = false;
        self.next_trip_id = 1;
        self.candidate_start = None;
        self.candidate_stop = None;
        self.last_movement = None;
    }

    pub fn allocate_trip_id(&mut self) -> i64 {
        let id = self.next_trip_id;
        self.next_trip_id += 1;
        id
    }

    /// True when a trip is open, either via the in-trip flag or a recorded
    /// trip left without an end time.
    pub fn has_open_trip(&self) -> bool {
        self.in_trip || self.trips.last().map_or(false, Trip::is_open)
    }

    pub fn trip_by_id(&self, trip_id: i64) -> Option<&Trip> {
        self.trips.iter().find(|trip| trip.id == trip_id)
    }
}
