//! `test`: runtime diagnostics against the in-process stack.

use crate::bus::SerializingBus;
use crate::engine::{Engine, FusionProviderSelectionPolicy};
use crate::providers::dummy;
use crate::service::{AlwaysGrantingPermissionManager, Credentials, Service};

use gnss_receiver::sntp;

use location_types::Criteria;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Which suite to exercise: `engine` or `sntp`.
    #[arg(long, default_value = "engine")]
    pub test_suite: String,
    /// Host queried by the sntp suite.
    #[arg(long, default_value = "pool.ntp.org")]
    pub ntp_host: String,
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    match args.test_suite.as_str() {
        "engine" => engine_suite().await,
        "sntp" => sntp_suite(&args.ntp_host).await,
        other => bail!("unknown test suite {other:?}"),
    }
}

/// Wires a dummy provider through engine, service and session and expects
/// updates to arrive.
async fn engine_suite() -> anyhow::Result<()> {
    let engine = Engine::new(
        Arc::new(FusionProviderSelectionPolicy),
        SerializingBus::new(),
    );
    engine.add_provider(dummy::DummyProvider::new(dummy::Configuration {
        update_period: Duration::from_millis(50),
        ..dummy::Configuration::default()
    }));
    let service = Service::new(engine, Arc::new(AlwaysGrantingPermissionManager));

    let (_, session) = service
        .create_session_for_criteria(
            &Criteria::position_only(),
            &Credentials { pid: std::process::id(), uid: 0 },
        )
        .context("session creation failed")?;

    let received = Arc::new(AtomicUsize::new(0));
    let sink = received.clone();
    let _connection = session.updates().position.connect(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    session
        .start_position_updates()
        .context("starting updates failed")?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    let count = received.load(Ordering::SeqCst);
    if count == 0 {
        bail!("no position updates within 500 ms");
    }
    println!("engine suite: ok ({count} updates)");
    Ok(())
}

/// One-shot reference time query.
async fn sntp_suite(host: &str) -> anyhow::Result<()> {
    let sample = sntp::Client::request_time(host, Duration::from_secs(5))
        .await
        .context("sntp query failed")?;
    println!(
        "sntp suite: ok ({} rtt {:?})",
        sample.ntp_time, sample.round_trip_time
    );
    Ok(())
}
