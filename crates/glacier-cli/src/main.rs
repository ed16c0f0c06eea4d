mod cli;
mod commands;

use crate::cli::{Command, CLI};
use clap::Parser;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // stdout carries ids only; diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = CLI::parse();

    let mut stdout = std::io::stdout().lock();
    match config.command {
        Command::Generate(args) => commands::generate(&args, &mut stdout)?,
        Command::Decode(args) => commands::decode(&args, &mut stdout)?,
    }
    stdout.flush()?;

    Ok(())
}
