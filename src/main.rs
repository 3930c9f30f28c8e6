mod cli;
mod commands;
mod error;
mod hg;
mod manifest;
mod precondition;
mod provider;
mod resource;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let dry_run = cli.dry_run;
    match cli.command {
        Command::Sync(args) => commands::sync::run(args, dry_run),
        Command::Checkout(args) => commands::checkout::run(args, dry_run),
        Command::Export(args) => commands::export::run(args, dry_run),
        Command::Apply(args) => commands::apply::run(args, dry_run),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "hgsync", &mut io::stdout());
            Ok(())
        }
    }
}
