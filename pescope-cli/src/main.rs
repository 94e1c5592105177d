mod app;
mod commands;
mod output;

use anyhow::Context;
use clap::Parser;
use pescope::CancellationToken;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            eprintln!("\nAborted.");
            std::process::exit(130);
        }
        eprintln!("\nCancelled, printing partial results.");
        handler_token.cancel();
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    // Show pescope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("pescope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    let session = commands::common::Session::new(&cli.global, cancel);
    match &cli.command {
        Command::Info { path } => commands::info::run(path, &session),
        Command::Map { path, image } => commands::map::run(path, *image, &session),
        Command::Imports { path } => commands::imports::run(path, &session),
        Command::Exports { path, all } => commands::exports::run(path, *all, &session),
        Command::Resources { path } => commands::resources::run(path, &session),
        Command::Relocs { path } => commands::relocs::run(path, &session),
        Command::Tls { path } => commands::tls::run(path, &session),
        Command::Loadconfig { path } => commands::loadconfig::run(path, &session),
        Command::Debug { path } => commands::debug::run(path, &session),
        Command::Dotnet { path } => commands::dotnet::run(path, &session),
        Command::Certs { path } => commands::certs::run(path, &session),
        Command::Checksum { path, fix, output } => {
            commands::checksum::run(path, *fix, output.as_deref(), &session)
        }
    }
}
