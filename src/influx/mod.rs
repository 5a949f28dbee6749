pub mod client;
pub mod csv;

pub use client::{InfluxClient, InfluxSettings};
pub use csv::SignalWindow;
