pub mod analyzer;
pub mod db;
pub mod events;
pub mod influx;
pub mod segmentation;
pub mod settings;
pub mod utils;

pub use analyzer::AnalyzerController;
pub use db::{Database, Sample, Trip, TripField, TripMetrics, TripRecord};
pub use events::TripEvent;
pub use influx::{InfluxClient, InfluxSettings};
pub use segmentation::{SegmentationConfig, SegmentationSession};
pub use settings::SettingsStore;
