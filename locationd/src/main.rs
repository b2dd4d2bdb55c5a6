use clap::Parser;
use locationd::cmds;

#[derive(Debug, Parser)]
#[command(
    name = "locationd",
    about = "Positioning daemon brokering updates between providers and sessions"
)]
enum Cli {
    /// Enumerate registered providers.
    List(cmds::list::Args),
    /// Connect to the service and print updates.
    Monitor(cmds::monitor::Args),
    /// Run an in-tree provider out-of-process.
    Provider(cmds::provider::Args),
    /// Run the service daemon.
    Run(cmds::run::Args),
    /// Persist one setting.
    Set(cmds::set::Args),
    /// Print the service state summary.
    Status(cmds::status::Args),
    /// Runtime diagnostics.
    Test(cmds::test::Args),
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "locationd=info".into()),
        )
        .init();

    let result = match Cli::parse() {
        Cli::List(args) => cmds::list::run(args).await,
        Cli::Monitor(args) => cmds::monitor::run(args).await,
        Cli::Provider(args) => cmds::provider::run(args).await,
        Cli::Run(args) => cmds::run::run(args).await,
        Cli::Set(args) => cmds::set::run(args).await,
        Cli::Status(args) => cmds::status::run(args).await,
        Cli::Test(args) => cmds::test::run(args).await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("locationd: {e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}
