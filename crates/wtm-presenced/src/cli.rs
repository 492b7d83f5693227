use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// wtm-presenced: anonymous proximity presence daemon.
#[derive(Parser, Debug)]
#[command(name = "wtm-presenced", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the token this device is advertising right now.
    Token,

    /// Run the presence engine until interrupted. Answer suggestions on stdin.
    Run {
        /// Simulated peers sharing the local radio medium.
        #[arg(long, default_value_t = 0)]
        loopback: usize,

        /// Start as if the app were in the background.
        #[arg(long)]
        background: bool,

        /// Show a synthetic party suggestion once presence is up.
        #[arg(long)]
        debug_suggestion: bool,
    },

    /// Inspect or change presence toggles.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Inspect the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    Show,
    /// Set one toggle, e.g. `is_discoverable true`.
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print where the config file is read from.
    Path,
    /// Print the effective config as JSON, secrets redacted.
    Show,
}

pub fn parse() -> Args {
    Args::parse()
}
