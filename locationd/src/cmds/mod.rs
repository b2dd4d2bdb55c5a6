//! The daemon's command surface.

pub mod list;
pub mod monitor;
pub mod provider;
pub mod run;
pub mod set;
pub mod status;
pub mod test;

use std::path::PathBuf;

/// Which bus the service is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BusKind {
    /// Per-user bus; socket under the user's runtime directory.
    Session,
    /// System-wide bus; socket under the daemon's runtime directory.
    System,
}

/// Resolves the socket path the service listens on for the given bus.
pub fn socket_path_for_bus(bus: BusKind) -> PathBuf {
    match bus {
        BusKind::System => crate::runtime_dir().join("locationd.sock"),
        BusKind::Session => std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
            .join("locationd-session.sock"),
    }
}

/// Default settings store location.
pub fn default_settings_path() -> PathBuf {
    crate::runtime_dir().join("settings.conf")
}
