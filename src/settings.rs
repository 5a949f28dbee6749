use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::influx::InfluxSettings;
use crate::segmentation::config::{
    battery_capacity_wh, SegmentationConfig, DEFAULT_BATTERY_CAPACITY_MAH,
    DEFAULT_BATTERY_VOLTAGE,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    pub poll_interval_secs: u64,
    pub start_dwell_secs: i64,
    pub stop_dwell_secs: i64,
    pub session_timeout_secs: i64,
    pub battery_capacity_mah: f64,
    pub battery_voltage: f64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            start_dwell_secs: 60,
            stop_dwell_secs: 60,
            session_timeout_secs: 300,
            battery_capacity_mah: DEFAULT_BATTERY_CAPACITY_MAH,
            battery_voltage: DEFAULT_BATTERY_VOLTAGE,
        }
    }
}

impl AnalyzerSettings {
    pub fn segmentation_config(&self) -> SegmentationConfig {
        SegmentationConfig {
            start_dwell_secs: self.start_dwell_secs,
            stop_dwell_secs: self.stop_dwell_secs,
            session_timeout_secs: self.session_timeout_secs,
            battery_capacity_wh: battery_capacity_wh(
                self.battery_capacity_mah,
                self.battery_voltage,
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct AppSettings {
    influx: InfluxSettings,
    analyzer: AnalyzerSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn influx(&self) -> InfluxSettings {
        self.data.read().unwrap().influx.clone()
    }

    pub fn analyzer(&self) -> AnalyzerSettings {
        self.data.read().unwrap().analyzer.clone()
    }

    pub fn update_analyzer(&self, settings: AnalyzerSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.analyzer = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
