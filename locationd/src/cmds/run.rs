//! `run`: the Service daemon.

use crate::bus::SerializingBus;
use crate::cmds::{default_settings_path, socket_path_for_bus, BusKind};
use crate::connectivity::NullManager;
use crate::engine::{Engine, FusionProviderSelectionPolicy};
use crate::harvester::{Configuration as HarvesterConfiguration, DemultiplexingReporter, Harvester, Reporter};
use crate::ichnaea;
use crate::ipc::Skeleton;
use crate::providers::{dummy, gnss};
use crate::service::{
    AlwaysGrantingPermissionManager, DefaultPermissionManager, PermissionManager, Service,
};
use crate::settings::Settings;
use crate::state::{EngineStatus, WifiAndCellIdReportingState};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Which bus to acquire the service name on.
    #[arg(long, value_enum, default_value = "session")]
    pub bus: BusKind,
    /// Daemon configuration file (dotted keys).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Settings store; defaults to the runtime directory.
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Grant every client and feed a dummy provider.
    #[arg(long)]
    pub testing: bool,
}

fn own_uid() -> u32 {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata("/proc/self")
        .map(|metadata| metadata.uid())
        .unwrap_or(0)
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let settings = Settings::open(&settings_path)
        .with_context(|| format!("opening settings at {settings_path:?}"))?;
    if let Some(config) = &args.config {
        // A separate read-only config file shares the settings syntax; its
        // values seed missing settings keys.
        let config = Settings::open(config)?;
        for key in config.keys() {
            if !settings.has_value_for_key(&key) {
                settings.set_string_for_key(&key, config.get_string_for_key(&key, ""));
            }
        }
    }

    let bus = SerializingBus::new();
    let engine = Engine::new(Arc::new(FusionProviderSelectionPolicy), bus.clone());

    if args.testing {
        engine.add_provider(dummy::DummyProvider::new(dummy::Configuration::default()));
        info!("testing mode: dummy provider registered");
    } else {
        let configuration = gnss::Configuration {
            source: gnss::ByteSource::SerialPort {
                device: settings.get_string_for_key("provider.gps.device", "/dev/ttyUSB0"),
                baud_rate: settings.get_for_key("provider.gps.baud", 4800u32),
            },
            variant: match settings.get_string_for_key("provider.gps.protocol", "ubx").as_str() {
                "sirf" => gnss::ReceiverVariant::Sirf,
                _ => gnss::ReceiverVariant::Ubx,
            },
            sntp_host: settings.get_string_for_key("provider.gps.ntp_server", "pool.ntp.org"),
            sntp_timeout: std::time::Duration::from_millis(
                settings.get_for_key("provider.gps.ntp_timeout_ms", 5000u64),
            ),
        };
        engine.add_provider(gnss::GnssProvider::new(configuration));
    }

    // An out-of-process provider (see the `provider` subcommand) joins the
    // engine like any local one.
    if settings.has_value_for_key("provider.remote.socket") {
        let socket = settings.get_string_for_key("provider.remote.socket", "");
        match crate::ipc::provider::RemoteProvider::connect(&socket).await {
            Ok(remote) => {
                engine.add_provider(remote);
                info!("remote provider attached from {socket}");
            }
            Err(e) => warn!("remote provider at {socket} unavailable: {e}"),
        }
    }

    if settings.get_string_for_key("engine.state", "on") == "off" {
        engine.set_engine_state(EngineStatus::Off);
    }
    if settings.get_string_for_key("engine.reporting", "off") == "on" {
        engine.set_wifi_and_cell_id_reporting_state(WifiAndCellIdReportingState::On);
    }

    let permission_manager: Arc<dyn PermissionManager> = if args.testing {
        Arc::new(AlwaysGrantingPermissionManager)
    } else {
        Arc::new(DefaultPermissionManager::new(own_uid()))
    };
    let service = Service::new(engine, permission_manager);

    // Harvester: fan out to every configured reporter; absent configuration
    // means harvesting stays dormant.
    let mut reporters: Vec<Arc<dyn Reporter>> = Vec::new();
    if settings.has_value_for_key("ichnaea.uri") {
        reporters.push(ichnaea::IchnaeaReporter::new(ichnaea::Configuration {
            uri: settings.get_string_for_key("ichnaea.uri", ""),
            api_key: settings.get_string_for_key("ichnaea.key", "locationd"),
        }));
    }
    let harvester = Harvester::new(
        HarvesterConfiguration {
            connectivity_manager: Arc::new(NullManager),
            reporter: Arc::new(DemultiplexingReporter::new(reporters)),
        },
        bus,
    );
    harvester.start();

    let socket_path = socket_path_for_bus(args.bus);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let _ = std::fs::remove_file(&socket_path);
    // Failing to acquire the advertised name is the one fatal startup error.
    let listener = tokio::net::UnixListener::bind(&socket_path)
        .with_context(|| format!("acquiring bus name at {socket_path:?}"))?;
    info!("listening on {socket_path:?}");

    let skeleton = Skeleton::new(service);
    tokio::select! {
        result = skeleton.serve(listener) => {
            result.context("service loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    if let Err(e) = settings.sync() {
        warn!("final settings sync failed: {e}");
    }
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}
