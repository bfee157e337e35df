mod cli;
mod config;
mod model;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Init => {
            let path = config::init_config()?;
            println!("Config at {}", path.display());
            Ok(())
        }
        cli::Command::Tui => {
            init_logging()?;
            let config = config::load_config()?;
            ui::run(config)
        }
    }
}

/// Log to a file; the terminal belongs to the TUI. Filter with RUST_LOG.
fn init_logging() -> Result<()> {
    let path = config::log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let file = fs::File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {:?}", path))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
