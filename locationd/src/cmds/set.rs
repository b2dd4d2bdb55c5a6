//! `set`: persist one settings value.

use crate::cmds::default_settings_path;
use crate::settings::Settings;

use std::path::PathBuf;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Dotted settings key, e.g. `provider.gps.device`.
    #[arg(long)]
    pub key: String,
    /// Textual value to store.
    #[arg(long)]
    pub value: String,
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let path = args.settings.unwrap_or_else(default_settings_path);
    let settings = Settings::open(&path)?;
    settings.set_string_for_key(&args.key, &args.value);
    settings.sync()?;
    println!("{} = {}", args.key, args.value);
    Ok(())
}
