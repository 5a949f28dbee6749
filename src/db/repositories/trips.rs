use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_datetime},
    models::{Trip, TripField, TripMetrics, TripRecord},
};

fn row_to_record(row: &Row) -> Result<TripRecord> {
    let start_time: String = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let created_at: String = row.get("created_at")?;

    Ok(TripRecord {
        id: row.get("id")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_optional_datetime(end_time, "end_time")?,
        start_battery_charge: row.get("start_battery_charge")?,
        end_battery_charge: row.get("end_battery_charge")?,
        trip_name: row.get("trip_name")?,
        driver_name: row.get("driver_name")?,
        notes: row.get("notes")?,
        sample_count: row.get("sample_count")?,
        metrics: TripMetrics {
            max_speed: row.get("max_speed")?,
            average_speed: row.get("average_speed")?,
            distance_km: row.get("distance_km")?,
            duration_secs: row.get("duration_secs")?,
            battery_used_percent: row.get("battery_used_percent")?,
            energy_consumed_wh: row.get("energy_consumed_wh")?,
            energy_efficiency_wh_per_km: row.get("energy_efficiency_wh_per_km")?,
        },
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Insert or overwrite the trip keyed by its start time.
    ///
    /// Pass-local segmentation ids restart at 1 every recompute, so rows are
    /// keyed content-addressed on `start_time` instead; re-upserting the same
    /// logical trip refreshes its metrics without touching user-edited
    /// metadata or colliding with unrelated historical trips.
    pub async fn upsert_trip(&self, trip: &Trip) -> Result<()> {
        let record = trip.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO trips (
                    start_time,
                    end_time,
                    max_speed,
                    average_speed,
                    distance_km,
                    duration_secs,
                    start_battery_charge,
                    end_battery_charge,
                    battery_used_percent,
                    energy_consumed_wh,
                    energy_efficiency_wh_per_km,
                    trip_name,
                    driver_name,
                    notes,
                    sample_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                ON CONFLICT(start_time) DO UPDATE SET
                    end_time = excluded.end_time,
                    max_speed = excluded.max_speed,
                    average_speed = excluded.average_speed,
                    distance_km = excluded.distance_km,
                    duration_secs = excluded.duration_secs,
                    start_battery_charge = excluded.start_battery_charge,
                    end_battery_charge = excluded.end_battery_charge,
                    battery_used_percent = excluded.battery_used_percent,
                    energy_consumed_wh = excluded.energy_consumed_wh,
                    energy_efficiency_wh_per_km = excluded.energy_efficiency_wh_per_km,
                    sample_count = excluded.sample_count",
                params![
                    record.start_time.to_rfc3339(),
                    record.end_time.as_ref().map(|dt| dt.to_rfc3339()),
                    record.metrics.max_speed,
                    record.metrics.average_speed,
                    record.metrics.distance_km,
                    record.metrics.duration_secs,
                    record.start_battery_charge,
                    record.end_battery_charge,
                    record.metrics.battery_used_percent,
                    record.metrics.energy_consumed_wh,
                    record.metrics.energy_efficiency_wh_per_km,
                    record.trip_name,
                    record.driver_name,
                    record.notes,
                    record.samples.len() as i64,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Load every persisted trip, newest start time first.
    pub async fn load_trips(&self) -> Result<Vec<TripRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    id,
                    start_time,
                    end_time,
                    max_speed,
                    average_speed,
                    distance_km,
                    duration_secs,
                    start_battery_charge,
                    end_battery_charge,
                    battery_used_percent,
                    energy_consumed_wh,
                    energy_efficiency_wh_per_km,
                    trip_name,
                    driver_name,
                    notes,
                    sample_count,
                    created_at
                FROM trips
                ORDER BY start_time DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut trips = Vec::new();
            while let Some(row) = rows.next()? {
                trips.push(row_to_record(row)?);
            }

            Ok(trips)
        })
        .await
    }

    /// Delete a trip by its durable row id. Returns whether a row existed.
    pub async fn delete_trip(&self, trip_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let deleted = conn.execute("DELETE FROM trips WHERE id = ?1", params![trip_id])?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Update one of the mutable metadata fields on a persisted trip.
    /// Returns whether a row existed.
    pub async fn update_trip_field(
        &self,
        trip_id: i64,
        field: TripField,
        value: &str,
    ) -> Result<bool> {
        let value = value.to_string();
        self.execute(move |conn| {
            let sql = format!("UPDATE trips SET {} = ?1 WHERE id = ?2", field.column());
            let updated = conn.execute(&sql, params![value, trip_id])?;
            Ok(updated > 0)
        })
        .await
    }
}
