//! Merged telemetry sample data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One merged, timestamped observation of vehicle speed and battery charge.
///
/// Produced by the sample merger; each distinct timestamp present in either
/// source signal yields exactly one `Sample`. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Speed in m/s, forward-filled from the last observed reading.
    pub speed: f64,
    /// Battery state of charge in percent (0-100), forward-filled.
    pub battery_charge: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, speed: f64, battery_charge: f64) -> Self {
        Self {
            timestamp,
            speed,
            battery_charge,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.speed > 0.0
    }
}
