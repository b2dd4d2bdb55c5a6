//! Process-wide state toggles observable through the service.

use serde::{Deserialize, Serialize};

/// Whether the engine hands out updates at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Off,
    #[default]
    On,
}

/// Whether providers may run satellite-based positioning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SatelliteBasedPositioningState {
    #[default]
    On,
    Off,
}

/// Whether wifi and cell ids may be reported off-device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WifiAndCellIdReportingState {
    On,
    #[default]
    Off,
}

/// The service state as visible to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Disabled,
    Enabled,
    /// At least one provider is active on behalf of some session.
    Active,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Disabled => write!(f, "disabled"),
            ServiceState::Enabled => write!(f, "enabled"),
            ServiceState::Active => write!(f, "active"),
        }
    }
}
