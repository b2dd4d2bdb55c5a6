//! Connectivity information consumed by the harvester.
//!
//! Wi-Fi and cell enumeration is an opaque source here; the daemon only
//! needs the records and a way to enumerate them.

use serde::{Deserialize, Serialize};

/// Operating mode of a visible wireless network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WirelessMode {
    Adhoc,
    Infrastructure,
    Unknown,
}

/// One visible Wi-Fi network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirelessNetwork {
    pub bssid: String,
    pub ssid: String,
    pub mode: WirelessMode,
    /// Channel center frequency, MHz.
    pub frequency: u16,
    /// Received signal strength, dBm.
    pub signal_strength: i16,
}

/// One radio cell the device is connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "radio", rename_all = "snake_case")]
pub enum RadioCell {
    Gsm {
        mobile_country_code: u16,
        mobile_network_code: u16,
        location_area_code: u16,
        cell_id: u32,
    },
    Umts {
        mobile_country_code: u16,
        mobile_network_code: u16,
        location_area_code: u16,
        cell_id: u32,
    },
    Lte {
        mobile_country_code: u16,
        mobile_network_code: u16,
        tracking_area_code: u16,
        cell_id: u32,
        physical_cell_id: u16,
    },
}

/// Enumerates the currently observed radio environment.
pub trait Manager: Send + Sync {
    fn enumerate_visible_wireless_networks(&self, visitor: &mut dyn FnMut(&WirelessNetwork));
    fn enumerate_connected_radio_cells(&self, visitor: &mut dyn FnMut(&RadioCell));
}

/// A manager that sees nothing; placeholder until a platform backend is
/// wired in.
#[derive(Debug, Default)]
pub struct NullManager;

impl Manager for NullManager {
    fn enumerate_visible_wireless_networks(&self, _visitor: &mut dyn FnMut(&WirelessNetwork)) {}
    fn enumerate_connected_radio_cells(&self, _visitor: &mut dyn FnMut(&RadioCell)) {}
}

/// A manager reporting a fixed environment; tests and the diagnostics
/// command feed it.
#[derive(Debug, Default, Clone)]
pub struct StaticManager {
    pub wifis: Vec<WirelessNetwork>,
    pub cells: Vec<RadioCell>,
}

impl Manager for StaticManager {
    fn enumerate_visible_wireless_networks(&self, visitor: &mut dyn FnMut(&WirelessNetwork)) {
        for wifi in &self.wifis {
            visitor(wifi);
        }
    }

    fn enumerate_connected_radio_cells(&self, visitor: &mut dyn FnMut(&RadioCell)) {
        for cell in &self.cells {
            visitor(cell);
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_wifi(bssid: &str) -> WirelessNetwork {
    WirelessNetwork {
        bssid: bssid.to_string(),
        ssid: "test-net".to_string(),
        mode: WirelessMode::Infrastructure,
        frequency: 2412,
        signal_strength: -60,
    }
}

#[cfg(test)]
pub(crate) fn sample_cell() -> RadioCell {
    RadioCell::Gsm {
        mobile_country_code: 262,
        mobile_network_code: 2,
        location_area_code: 5313,
        cell_id: 131948771,
    }
}
