use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

/// Raw signal series extracted from one query response, keyed by timestamp.
#[derive(Debug, Default)]
pub struct SignalWindow {
    pub speed: BTreeMap<DateTime<Utc>, f64>,
    pub charge: BTreeMap<DateTime<Utc>, f64>,
    /// Rows with an unparseable value or timestamp; skipped, never fatal.
    pub skipped_rows: usize,
}

impl SignalWindow {
    pub fn is_empty(&self) -> bool {
        self.speed.is_empty() && self.charge.is_empty()
    }
}

/// Parse an annotated-CSV Flux query response into per-signal maps.
///
/// The header must carry `_value`, `_time` and `_measurement` columns;
/// anything else aborts the cycle. Individual rows that fail to parse are
/// counted and skipped. Rows whose measurement matches neither signal name
/// are ignored silently.
pub fn parse_query_response(
    body: &str,
    speed_measurement: &str,
    charge_measurement: &str,
) -> Result<SignalWindow> {
    let mut window = SignalWindow::default();

    let mut lines = body
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let Some(header) = lines.next() else {
        return Ok(window);
    };

    let headers: Vec<&str> = header.split(',').map(str::trim).collect();
    let value_idx = headers.iter().position(|h| *h == "_value");
    let time_idx = headers.iter().position(|h| *h == "_time");
    let measurement_idx = headers.iter().position(|h| *h == "_measurement");

    let (Some(value_idx), Some(time_idx), Some(measurement_idx)) =
        (value_idx, time_idx, measurement_idx)
    else {
        bail!("required _value, _time or _measurement column missing from response");
    };

    let max_idx = value_idx.max(time_idx).max(measurement_idx);

    for line in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() <= max_idx {
            window.skipped_rows += 1;
            continue;
        }

        // Responses with multiple result tables repeat the header.
        if fields[measurement_idx] == "_measurement" {
            continue;
        }

        let Ok(value) = fields[value_idx].parse::<f64>() else {
            window.skipped_rows += 1;
            continue;
        };
        let Ok(timestamp) = fields[time_idx].parse::<DateTime<Utc>>() else {
            window.skipped_rows += 1;
            continue;
        };

        let measurement = fields[measurement_idx];
        if measurement == speed_measurement {
            window.speed.insert(timestamp, value);
        } else if measurement == charge_measurement {
            window.charge.insert(timestamp, value);
        }
    }

    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SPEED: &str = "Vehicle/1/qt/speed";
    const CHARGE: &str = "Vehicle/1/qt/charge";

    #[test]
    fn routes_rows_into_per_signal_maps() {
        let body = "\
,result,table,_time,_value,_measurement
,vehicle_data,0,2025-06-01T10:00:00Z,4.2,Vehicle/1/qt/speed
,vehicle_data,0,2025-06-01T10:00:05Z,88.5,Vehicle/1/qt/charge
,vehicle_data,0,2025-06-01T10:00:10Z,4.5,Vehicle/1/qt/speed
";

        let window = parse_query_response(body, SPEED, CHARGE).unwrap();

        assert_eq!(window.speed.len(), 2);
        assert_eq!(window.charge.len(), 1);
        assert_eq!(window.skipped_rows, 0);
        let first_charge = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 5).unwrap();
        assert_eq!(window.charge[&first_charge], 88.5);
    }

    #[test]
    fn missing_required_column_is_fatal_for_the_cycle() {
        let body = ",result,table,_time,_value\n,vehicle_data,0,2025-06-01T10:00:00Z,4.2\n";
        assert!(parse_query_response(body, SPEED, CHARGE).is_err());
    }

    #[test]
    fn malformed_rows_are_counted_not_fatal() {
        let body = "\
,result,table,_time,_value,_measurement
,vehicle_data,0,2025-06-01T10:00:00Z,not-a-number,Vehicle/1/qt/speed
,vehicle_data,0,bad-timestamp,4.2,Vehicle/1/qt/speed
,vehicle_data,0,2025-06-01T10:00:10Z,4.5,Vehicle/1/qt/speed
,short,row
";

        let window = parse_query_response(body, SPEED, CHARGE).unwrap();

        assert_eq!(window.speed.len(), 1);
        assert_eq!(window.skipped_rows, 3);
    }

    #[test]
    fn unknown_measurements_and_annotations_are_ignored() {
        let body = "\
#datatype,string,long,dateTime:RFC3339,double,string
,result,table,_time,_value,_measurement
,vehicle_data,0,2025-06-01T10:00:00Z,1.0,Vehicle/1/qt/autonomy_level
";

        let window = parse_query_response(body, SPEED, CHARGE).unwrap();

        assert!(window.is_empty());
        assert_eq!(window.skipped_rows, 0);
    }

    #[test]
    fn empty_body_yields_empty_window() {
        let window = parse_query_response("", SPEED, CHARGE).unwrap();
        assert!(window.is_empty());
    }
}
