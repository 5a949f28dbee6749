//! Outbound trip notifications.
//!
//! Segmentation returns these as a plain list; the analyzer controller fans
//! them out over a broadcast channel so consumers (UI bindings, logging) stay
//! decoupled from the detection logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TripEvent {
    /// A trip start was confirmed after the start dwell elapsed.
    #[serde(rename_all = "camelCase")]
    TripStarted {
        trip_id: i64,
        start_time: DateTime<Utc>,
    },
    /// A trip was closed, either by the stop dwell or by session timeout.
    #[serde(rename_all = "camelCase")]
    TripEnded {
        trip_id: i64,
        end_time: DateTime<Utc>,
        max_speed: f64,
        average_speed: f64,
        distance_km: f64,
        duration_secs: i64,
    },
    /// Fired after any persistence-affecting change (pass writes, manual
    /// delete/rename/update).
    TripsUpdated,
}
