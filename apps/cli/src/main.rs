//! ThesisForge CLI: turn a thesis bundle into a journal manuscript.
//!
//! Reads chapter files from disk, resolves configuration and provider
//! credentials, runs the pipeline and prints the structured response.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
