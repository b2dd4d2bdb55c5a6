//! Generates a synthetic NMEA byte stream for receiver development: either
//! a capture file to replay later or live output on stdout.

mod course;

use course::Course;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gnss-simulator", about = "Synthetic GNSS byte streams")]
struct Cli {
    /// Write the stream to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Number of one-second ticks to generate; 0 streams forever.
    #[arg(long, default_value_t = 60)]
    ticks: u64,
    /// Emit in real time rather than as fast as possible.
    #[arg(long)]
    realtime: bool,
    /// Course center latitude.
    #[arg(long, default_value_t = 48.117)]
    latitude: f64,
    /// Course center longitude.
    #[arg(long, default_value_t = 11.64)]
    longitude: f64,
    /// Ground speed in knots.
    #[arg(long, default_value_t = 4.0)]
    speed: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gnss_simulator=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let course = Course {
        center_latitude: cli.latitude,
        center_longitude: cli.longitude,
        speed_knots: cli.speed,
        ..Course::default()
    };

    let mut sink: Box<dyn tokio::io::AsyncWrite + Unpin> = match &cli.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {path:?}"))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    info!(
        "simulating around ({}, {}) for {} ticks",
        course.center_latitude,
        course.center_longitude,
        if cli.ticks == 0 { u64::MAX } else { cli.ticks }
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut tick = 0u64;
    while cli.ticks == 0 || tick < cli.ticks {
        if cli.realtime {
            ticker.tick().await;
        }
        sink.write_all(&course.bytes_at(tick)).await?;
        tick += 1;
    }
    sink.flush().await?;
    Ok(())
}
