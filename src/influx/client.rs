use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::csv::{parse_query_response, SignalWindow};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote query endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxSettings {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Flux range start for the re-fetched window, e.g. "-10d".
    pub lookback: String,
    pub speed_measurement: String,
    pub charge_measurement: String,
}

impl Default for InfluxSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".into(),
            token: String::new(),
            org: "jetracer".into(),
            bucket: "jetracer".into(),
            lookback: "-10d".into(),
            speed_measurement: "Vehicle/1/qt/speed".into(),
            charge_measurement: "Vehicle/1/qt/charge".into(),
        }
    }
}

/// Client for the remote telemetry store. Re-requests the full lookback
/// window on every cycle; there is no incremental fetch.
pub struct InfluxClient {
    http: reqwest::Client,
    settings: InfluxSettings,
}

impl InfluxClient {
    pub fn new(settings: InfluxSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http, settings })
    }

    fn flux_query(&self) -> String {
        format!(
            "from(bucket: \"{bucket}\")\
             |> range(start: {lookback})\
             |> filter(fn: (r) => r[\"_measurement\"] == \"{speed}\" or r[\"_measurement\"] == \"{charge}\")\
             |> sort(columns: [\"_time\"])\
             |> yield(name: \"vehicle_data\")",
            bucket = self.settings.bucket,
            lookback = self.settings.lookback,
            speed = self.settings.speed_measurement,
            charge = self.settings.charge_measurement,
        )
    }

    /// Fetch and parse one full window of raw samples.
    pub async fn fetch_window(&self) -> Result<SignalWindow> {
        let url = format!("{}/api/v2/query?org={}", self.settings.url, self.settings.org);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Token {}", self.settings.token))
            .header("Content-Type", "application/vnd.flux")
            .header("Accept", "application/csv")
            .body(self.flux_query())
            .send()
            .await
            .context("query request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("query returned HTTP {status}");
        }

        let body = response
            .text()
            .await
            .context("failed to read query response body")?;

        log_info!("received {} bytes of telemetry CSV", body.len());

        let window = parse_query_response(
            &body,
            &self.settings.speed_measurement,
            &self.settings.charge_measurement,
        )?;

        if window.skipped_rows > 0 {
            log_warn!("skipped {} malformed telemetry rows", window.skipped_rows);
        }
        log_info!(
            "parsed {} speed points and {} charge points",
            window.speed.len(),
            window.charge.len()
        );

        Ok(window)
    }
}
