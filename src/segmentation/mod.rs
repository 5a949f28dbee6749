pub mod algorithm;
pub mod config;
pub mod merge;
pub mod session;
pub mod stats;

pub use algorithm::run_pass;
pub use config::SegmentationConfig;
pub use merge::merge_signals;
pub use session::SegmentationSession;
