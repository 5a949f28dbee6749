use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use tokio::time::Duration;

use tripmeter::{
    AnalyzerController, Database, InfluxClient, SettingsStore, TripEvent,
};

fn data_dir() -> PathBuf {
    std::env::var("TRIPMETER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = data_dir();
    let settings = SettingsStore::new(data_dir.join("settings.json"))
        .context("failed to load settings")?;

    let db = Database::new(data_dir.join("vehicle_trips.db"))?;
    let client = InfluxClient::new(settings.influx())?;

    let analyzer_settings = settings.analyzer();
    let controller = AnalyzerController::new(
        db,
        client,
        analyzer_settings.segmentation_config(),
        Duration::from_secs(analyzer_settings.poll_interval_secs),
    );

    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                TripEvent::TripStarted {
                    trip_id,
                    start_time,
                } => info!("trip {trip_id} started at {start_time}"),
                TripEvent::TripEnded {
                    trip_id,
                    end_time,
                    distance_km,
                    duration_secs,
                    ..
                } => info!(
                    "trip {trip_id} ended at {end_time}: {distance_km:.2} km in {duration_secs}s"
                ),
                TripEvent::TripsUpdated => {}
            }
        }
    });

    controller.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");

    controller.stop().await;

    Ok(())
}
