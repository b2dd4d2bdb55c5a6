//! `monitor`: subscribe to a session and print updates as they arrive.

use crate::cmds::{socket_path_for_bus, BusKind};
use crate::ipc::ServiceStub;

use location_types::{Criteria, Heading, Position, Requires, Update, Velocity};

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
    let mut signals = stub
        .take_signals()
        .context("signal stream already consumed")?;

    let criteria = Criteria {
        requires: Requires {
            position: true,
            altitude: true,
            velocity: true,
            heading: true,
        },
        ..Criteria::default()
    };
    let session = stub.create_session_for_criteria(&criteria).await?;
    session.start_position_updates().await?;
    session.start_heading_updates().await?;
    session.start_velocity_updates().await?;
    eprintln!("monitoring session {} (ctrl-c to stop)", session.path());

    loop {
        tokio::select! {
            signal = signals.recv() => {
                let Some(signal) = signal else { break };
                match signal.member.as_str() {
                    "PositionChanged" => {
                        if let Ok(update) = serde_json::from_value::<Update<Position>>(signal.body) {
                            println!("position: {}", update.value);
                        }
                    }
                    "HeadingChanged" => {
                        if let Ok(update) = serde_json::from_value::<Update<Heading>>(signal.body) {
                            println!("heading: {}", update.value.degrees());
                        }
                    }
                    "VelocityChanged" => {
                        if let Ok(update) = serde_json::from_value::<Update<Velocity>>(signal.body) {
                            println!("velocity: {}", update.value.speed());
                        }
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.stop_position_updates().await.ok();
    session.stop_heading_updates().await.ok();
    session.stop_velocity_updates().await.ok();
    Ok(())
}
