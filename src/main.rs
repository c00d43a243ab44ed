//! Blocksync CLI: differential block sync between local and remote containers.

use anyhow::Result;
use blocksync::engine::arg_parser::{Cli, Commands};
use blocksync::engine::cli::{handle_local, handle_pull, handle_push};
use clap::Parser;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Local { common } => handle_local(&common)?,
        Commands::Push { common, remote } => handle_push(&common, &remote)?,
        Commands::Pull { common, remote } => handle_pull(&common, &remote)?,
    }

    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
