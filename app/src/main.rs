use anyhow::Context;
use clap::Parser;

use loglens_core::{init_logging, Config, LaunchOutcome, Launcher};

mod cli;
mod host;

use cli::Cli;
use host::HeadlessHost;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("loglens: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let params = cli.into_parameters();

    tracing::info!(pid = std::process::id(), "loglens instance starting");

    let mut launcher = Launcher::new(Config::default())?;
    let mut host = HeadlessHost;

    let outcome = launcher
        .launch(&params, &mut host)
        .context("could not start loglens")?;

    match outcome {
        LaunchOutcome::Forwarded => {
            // Secondary: files handed to the running instance, nothing left
            // to do here
            tracing::info!("Arguments forwarded to the running loglens instance");
            return Ok(());
        }
        LaunchOutcome::Primary { restored, .. } => {
            tracing::info!(restored, "Primary instance ready");
        }
    }

    tokio::select! {
        result = launcher.run(&mut host) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, saving session");
        }
    }

    launcher.shutdown()?;

    Ok(())
}
