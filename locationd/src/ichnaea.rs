//! A reporter uploading observations to an ichnaea-compatible service
//! (Mozilla Location Service and friends).
//!
//! The payload mirrors the geosubmit shape closely enough for a stock
//! endpoint; the exact upload format is deliberately not part of the core
//! contract.

use crate::connectivity::{RadioCell, WirelessNetwork};
use crate::harvester::Reporter;

use location_types::{Position, Update};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Configuration {
    /// Submission endpoint, e.g. `https://location.services.mozilla.com`.
    pub uri: String,
    /// API key appended to the submission path.
    pub api_key: String,
}

pub struct IchnaeaReporter {
    config: Configuration,
    client: reqwest::Client,
    started: AtomicBool,
}

impl IchnaeaReporter {
    pub fn new(config: Configuration) -> Arc<Self> {
        Arc::new(Self {
            config,
            client: reqwest::Client::new(),
            started: AtomicBool::new(false),
        })
    }

    fn submission_url(&self) -> String {
        format!(
            "{}/v2/geosubmit?key={}",
            self.config.uri.trim_end_matches('/'),
            self.config.api_key
        )
    }

    fn payload(
        update: &Update<Position>,
        wifis: &[WirelessNetwork],
        cells: &[RadioCell],
    ) -> serde_json::Value {
        let position = &update.value;
        let wifi_access_points: Vec<_> = wifis
            .iter()
            .map(|wifi| {
                json!({
                    "macAddress": wifi.bssid,
                    "frequency": wifi.frequency,
                    "signalStrength": wifi.signal_strength,
                })
            })
            .collect();
        let cell_towers: Vec<_> = cells
            .iter()
            .map(|cell| match cell {
                RadioCell::Gsm {
                    mobile_country_code,
                    mobile_network_code,
                    location_area_code,
                    cell_id,
                } => json!({
                    "radioType": "gsm",
                    "mobileCountryCode": mobile_country_code,
                    "mobileNetworkCode": mobile_network_code,
                    "locationAreaCode": location_area_code,
                    "cellId": cell_id,
                }),
                RadioCell::Umts {
                    mobile_country_code,
                    mobile_network_code,
                    location_area_code,
                    cell_id,
                } => json!({
                    "radioType": "wcdma",
                    "mobileCountryCode": mobile_country_code,
                    "mobileNetworkCode": mobile_network_code,
                    "locationAreaCode": location_area_code,
                    "cellId": cell_id,
                }),
                RadioCell::Lte {
                    mobile_country_code,
                    mobile_network_code,
                    tracking_area_code,
                    cell_id,
                    physical_cell_id,
                } => json!({
                    "radioType": "lte",
                    "mobileCountryCode": mobile_country_code,
                    "mobileNetworkCode": mobile_network_code,
                    "locationAreaCode": tracking_area_code,
                    "cellId": cell_id,
                    "physicalCellId": physical_cell_id,
                }),
            })
            .collect();

        let mut item = json!({
            "position": {
                "latitude": position.latitude().0,
                "longitude": position.longitude().0,
            },
            "wifiAccessPoints": wifi_access_points,
            "cellTowers": cell_towers,
        });
        if let Some(accuracy) = position.accuracy.horizontal {
            item["position"]["accuracy"] = json!(accuracy.0);
        }
        if let Some(altitude) = position.altitude {
            item["position"]["altitude"] = json!(altitude.0);
        }
        json!({ "items": [item] })
    }
}

impl Reporter for IchnaeaReporter {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn report(&self, update: &Update<Position>, wifis: &[WirelessNetwork], cells: &[RadioCell]) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        let url = self.submission_url();
        let body = Self::payload(update, wifis, cells);
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("geosubmit accepted");
                }
                Ok(response) => {
                    warn!("geosubmit rejected with status {}", response.status());
                }
                Err(e) => {
                    warn!("geosubmit failed: {e}");
                }
            }
        });
    }
}
