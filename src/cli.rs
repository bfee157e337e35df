use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blockday", version, about = "Keyboard-driven day planner for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config file if none exists
    Init,
    /// Launch the interactive planner (the default)
    Tui,
}
