//! Trip data models: the in-memory working shape built by the segmenter and
//! the persisted shape loaded back from SQLite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Sample;

/// Statistics derived wholesale from a trip's sample set plus its start/end
/// times and the battery charges captured at the start/stop transitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripMetrics {
    /// Maximum observed speed in m/s.
    pub max_speed: f64,
    /// Arithmetic mean speed in m/s across all samples.
    pub average_speed: f64,
    /// Distance in km, derived from average speed and duration.
    pub distance_km: f64,
    pub duration_secs: i64,
    /// Charge delta in percent; negative when charge increased.
    pub battery_used_percent: f64,
    pub energy_consumed_wh: f64,
    pub energy_efficiency_wh_per_km: f64,
}

/// A detected trip within a single segmentation pass.
///
/// Created when a start condition is confirmed, grows by appended samples
/// while open, and is finalized (end time set, metrics computed) exactly once.
/// The `id` is a pass-local sequence starting at 1; durable identity in the
/// store is keyed on `start_time` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Charge estimate captured when the trip start was confirmed.
    pub start_battery_charge: f64,
    /// Charge estimate captured when the trip was closed.
    pub end_battery_charge: f64,
    pub trip_name: String,
    pub driver_name: String,
    pub notes: String,
    pub samples: Vec<Sample>,
    pub metrics: TripMetrics,
}

impl Trip {
    pub fn open(id: i64, start_time: DateTime<Utc>, start_battery_charge: f64) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            start_battery_charge,
            end_battery_charge: 0.0,
            trip_name: String::new(),
            driver_name: String::new(),
            notes: String::new(),
            samples: Vec::new(),
            metrics: TripMetrics::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A trip row as persisted in the store. Carries the durable row id used by
/// delete/update operations, not the pass-local segmentation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_battery_charge: f64,
    pub end_battery_charge: f64,
    pub trip_name: String,
    pub driver_name: String,
    pub notes: String,
    pub sample_count: i64,
    pub metrics: TripMetrics,
    pub created_at: DateTime<Utc>,
}

/// The metadata fields a caller may update on a persisted trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TripField {
    TripName,
    DriverName,
    Notes,
}

impl TripField {
    pub fn column(&self) -> &'static str {
        match self {
            TripField::TripName => "trip_name",
            TripField::DriverName => "driver_name",
            TripField::Notes => "notes",
        }
    }
}
