//! `wip` command-line entry point.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use wip::app::{self, Cli};

#[cfg(feature = "dev")]
const DEFAULT_FILTER: &str = "debug";
#[cfg(not(feature = "dev"))]
const DEFAULT_FILTER: &str = "warn";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    // stderr keeps stdout clean for --json
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn try_main(cli: Cli) -> anyhow::Result<()> {
    let rt = Runtime::new().context("failed to start the async runtime")?;
    rt.block_on(app::run(cli))?;
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match try_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
