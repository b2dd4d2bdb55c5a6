//! # locationd
//!
//! A daemon brokering positioning updates between heterogeneous providers
//! (GNSS receivers, network location, remote providers) and client sessions.
//!
//! ## Architecture
//!
//! ```text
//! bytes → receiver → provider → fusion → engine → session → client (IPC)
//!                       ↑  events (reference position, reporting state)  ↓
//!                       └───────────────── bus ←──────────────── service ┘
//! ```
//!
//! The [`engine`] owns the provider set and the process-wide configuration;
//! [`service`] gates session creation behind the permission manager;
//! [`session`] multiplexes per-client update toggles onto shared providers;
//! [`harvester`] correlates reference positions with the observed radio
//! environment for crowd-sourced reporting.

pub mod bus;
pub mod cmds;
pub mod connectivity;
pub mod engine;
pub mod events;
pub mod harvester;
pub mod ichnaea;
pub mod ipc;
pub mod observable;
pub mod provider;
pub mod providers;
pub mod service;
pub mod session;
pub mod settings;
pub mod state;

/// Runtime state directory override; falls back to the historical default.
pub const RUNTIME_DIR_ENV: &str = "LOCATIOND_RUNTIME_DIR";
pub const DEFAULT_RUNTIME_DIR: &str = "/var/lib/ubuntu-location-service";

/// Resolves the runtime state directory.
pub fn runtime_dir() -> std::path::PathBuf {
    std::env::var_os(RUNTIME_DIR_ENV)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from(DEFAULT_RUNTIME_DIR))
}
