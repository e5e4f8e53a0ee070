mod app;
mod commands;
mod output;

use clap::Parser;
use throwscope::CancellationToken;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let token = CancellationToken::new();
    let handler = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        handler.cancel();
    })?;

    let cli = Cli::parse();

    // Show throwscope info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("throwscope", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Analyze {
            path,
            method,
            policy,
        } => commands::analyze::run(path, method, policy, &token, &cli.global),
        Command::Class {
            path,
            r#type,
            policy,
        } => commands::class::run(path, r#type, policy, &token, &cli.global),
        Command::Path {
            path,
            from,
            to,
            exception,
            policy,
        } => commands::path::run(
            path,
            &commands::path::PathQuery {
                from,
                to,
                exception: exception.as_deref(),
            },
            policy,
            &token,
            &cli.global,
        ),
        Command::Methods { path, r#type } => {
            commands::methods::run(path, r#type.as_deref(), &cli.global)
        }
    }
}
