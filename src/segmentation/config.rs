/// Configuration for the trip segmentation state machine with tunable
/// thresholds.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Continuous-movement requirement before a trip start is confirmed.
    pub start_dwell_secs: i64,

    /// Inactivity requirement before an open trip is closed.
    pub stop_dwell_secs: i64,

    /// Wall-clock seconds since the newest sample before an open trip is
    /// force-closed at that sample's timestamp.
    pub session_timeout_secs: i64,

    /// Pack capacity used for energy computations, in watt-hours.
    pub battery_capacity_wh: f64,
}

/// Six 3200 mAh cells on a 12 V system: 19.2 Ah * 12 V = 230.4 Wh.
pub const DEFAULT_BATTERY_CAPACITY_MAH: f64 = 6.0 * 3200.0;
pub const DEFAULT_BATTERY_VOLTAGE: f64 = 12.0;

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            start_dwell_secs: 60,
            stop_dwell_secs: 60,
            session_timeout_secs: 300,
            battery_capacity_wh: battery_capacity_wh(
                DEFAULT_BATTERY_CAPACITY_MAH,
                DEFAULT_BATTERY_VOLTAGE,
            ),
        }
    }
}

/// Pack capacity in Wh from a mAh rating and nominal voltage.
pub fn battery_capacity_wh(capacity_mah: f64, voltage: f64) -> f64 {
    (capacity_mah / 1000.0) * voltage
}
