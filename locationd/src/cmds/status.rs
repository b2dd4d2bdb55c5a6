//! `status`: print a summary of the running service.

use crate::cmds::{socket_path_for_bus, BusKind};
use crate::ipc::ServiceStub;

use anyhow::Context;

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(long, value_enum, default_value = "session")]
    pub bus: BusKind,
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let socket = socket_path_for_bus(args.bus);
    let stub = ServiceStub::connect(&socket)
        .await
        .with_context(|| format!("connecting to the service at {socket:?}"))?;

    println!("state: {}", stub.state().await?);
    println!("online: {}", stub.is_online().await?);
    println!(
        "satellite based positioning: {:?}",
        stub.does_satellite_based_positioning().await?
    );
    println!(
        "wifi and cell id reporting: {:?}",
        stub.does_report_cell_and_wifi_ids().await?
    );

    let vehicles = stub.visible_space_vehicles().await?;
    println!("visible space vehicles: {}", vehicles.len());
    for sv in vehicles {
        println!(
            "  {:?} {}: snr {:?} elevation {:?} azimuth {:?}",
            sv.key.gnss_id, sv.key.satellite_id, sv.snr, sv.elevation, sv.azimuth
        );
    }
    Ok(())
}
