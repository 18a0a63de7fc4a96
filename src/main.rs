mod app;
mod cli;
mod config;
mod endpoint;
mod logging;
mod picker;
mod prefs;
mod render;
mod session;
mod stream;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    match cli.command.take() {
        Some(Command::Check(args)) => {
            logging::init_for_stderr();
            let path = match args.config.or(cli.config) {
                Some(path) => path,
                None => prefs::load_prefs()?
                    .last_config_path
                    .context("no config path given and none remembered from a previous run")?,
            };
            run_check(&path)
        }
        None => {
            let log_path = logging::init_for_tui()?;
            tracing::info!("session log at {}", log_path.display());
            app::run_tui(cli).await
        }
    }
}

/// Prints each configured channel with its stream endpoint, credentials
/// stripped. Entry-level decode failures are listed without failing the
/// whole run; only an unreadable document is an error.
fn run_check(path: &Path) -> Result<()> {
    let loaded = config::load_channels(path)?;
    if loaded.entries.is_empty() {
        println!("No channels in {}.", path.display());
        return Ok(());
    }

    println!(
        "{} of {} channel(s) valid in {}:",
        loaded.valid_count(),
        loaded.entries.len(),
        path.display()
    );
    for entry in &loaded.entries {
        match &entry.parsed {
            Ok(channel) => {
                let url = endpoint::realmonitor_url(channel);
                println!(
                    "  slot {}: {} -> {}",
                    entry.index + 1,
                    channel.slot_label(),
                    endpoint::display_endpoint(&url)
                );
            }
            Err(err) => println!("  slot {}: invalid ({})", entry.index + 1, err.detail),
        }
    }
    if loaded.dropped > 0 {
        println!(
            "  ({} extra channel(s) beyond the grid ignored)",
            loaded.dropped
        );
    }
    Ok(())
}
