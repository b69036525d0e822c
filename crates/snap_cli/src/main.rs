mod app;
mod config;
mod logging;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use snap_engine::RunMode;

use crate::config::RunArgs;

#[derive(Parser)]
#[command(name = "snap-harvester")]
#[command(about = "Incremental snap harvester", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest items newer than the stored checkpoint
    Run(RunArgs),

    /// Crawl as deep as the initial pass budget allows, ignoring the checkpoint
    InitialLoad(RunArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let (mode, args) = match cli.command {
        Command::Run(args) => (RunMode::Incremental, args),
        Command::InitialLoad(args) => (RunMode::InitialLoad, args),
    };

    match app::run(mode, &args).await {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:#}");
            eprintln!("snap-harvester: {err:#}");
            ExitCode::FAILURE
        }
    }
}
