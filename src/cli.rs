//! Command-line interface for matchlink.

use clap::{Parser, Subcommand, ValueEnum};

/// Matchlink - relay-match session protocol demo
#[derive(Parser, Debug)]
#[command(name = "matchlink")]
#[command(about = "Authoritative session protocol for relay-mediated matches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Scripted match played by the demo.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Script {
    /// Authority wins via the top row.
    Win,
    /// All nine tiles fill with no line.
    Draw,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run two sessions through a full match over the loopback relay
    Demo {
        /// Which scripted match to play
        #[arg(long, value_enum, default_value = "win")]
        script: Script,

        /// Drop the peer's connection mid-match to exercise recovery
        #[arg(long)]
        drop_midgame: bool,

        /// Optional TOML configuration file
        #[arg(long)]
        config: Option<std::path::PathBuf>,
    },
}
