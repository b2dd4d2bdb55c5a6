//! `list`: enumerate the providers known to this build.

use crate::providers::Registry;

#[derive(Debug, clap::Args)]
pub struct Args {}

pub async fn run(_args: Args) -> anyhow::Result<()> {
    for name in Registry::instance().names() {
        println!("{name}");
    }
    Ok(())
}
