//! `provider`: run one in-tree provider out-of-process.

use crate::ipc::provider::ProviderSkeleton;
use crate::providers::Registry;

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Registry name of the provider to serve, e.g. `dummy::Provider`.
    #[arg(long)]
    pub provider: String,
    /// Socket the provider is published on.
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let provider = Registry::instance()
        .create(&args.provider)
        .with_context(|| format!("unknown provider {:?}", args.provider))?
        .context("provider construction failed")?;

    let socket_path = args
        .socket
        .unwrap_or_else(|| crate::runtime_dir().join("provider.sock"));
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let _ = std::fs::remove_file(&socket_path);
    let listener = tokio::net::UnixListener::bind(&socket_path)
        .with_context(|| format!("binding provider socket at {socket_path:?}"))?;
    info!("serving {} on {socket_path:?}", args.provider);

    let skeleton = ProviderSkeleton::new(provider);
    tokio::select! {
        result = skeleton.serve(listener) => {
            result.context("provider loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {}
    }
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}
