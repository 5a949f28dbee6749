pub mod controller;

pub use controller::AnalyzerController;
