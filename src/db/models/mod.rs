pub mod sample;
pub mod trip;

pub use sample::Sample;
pub use trip::{Trip, TripField, TripMetrics, TripRecord};
