//! wtm-presenced: runs the proximity presence engine and manages its state.
//!
//! `run` starts the coordinator and follows the settings file; the other
//! subcommands inspect or edit state and exit.

mod cli;
mod commands;
mod daemon;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use wtm_common::WtmError;
use wtm_config::{config_to_json, toml_loader, WtmConfig};

use crate::cli::{Args, Command, ConfigAction, SettingsAction};

fn main() -> ExitCode {
    let args = cli::parse();

    let loaded = match &args.config {
        Some(path) => wtm_config::load_config_from(path),
        None => wtm_config::load_config(),
    };
    let config = loaded.as_ref().cloned().unwrap_or_default();

    init_logging(args.log_level.as_deref(), &config);
    if let Err(e) = &loaded {
        tracing::warn!("config load failed, using defaults: {e}");
    }

    match dispatch(args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("wtm-presenced: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins, then `--log-level`, then the config file.
fn init_logging(cli_level: Option<&str>, config: &WtmConfig) {
    let fallback = cli_level
        .map(|level| format!("wtm={level}"))
        .unwrap_or_else(|| config.logging.level.directive().to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&fallback)
            .unwrap_or_else(|_| EnvFilter::new(config.logging.level.directive()))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn dispatch(args: Args, config: WtmConfig) -> Result<(), WtmError> {
    match args.command {
        Command::Token => println!("{}", commands::token(&config)?),
        Command::Run {
            loopback,
            background,
            debug_suggestion,
        } => {
            tracing::info!("wtm-presenced v{} starting", env!("CARGO_PKG_VERSION"));
            let runtime = tokio::runtime::Runtime::new()?;
            let result = runtime.block_on(daemon::run(
                config,
                daemon::RunOptions {
                    loopback,
                    background,
                    debug_suggestion,
                },
            ));
            // The stdin reader sits on a blocking thread that never returns.
            runtime.shutdown_background();
            result?;
            tracing::info!("shutdown complete");
        }
        Command::Settings { action } => {
            let path = wtm_config::paths::settings_file()?;
            match action {
                SettingsAction::Show => print!("{}", commands::settings_show(&path)?),
                SettingsAction::Set { key, value } => {
                    let updated = commands::settings_set(&path, &key, &value)?;
                    print!("{}", commands::render_settings(&updated));
                }
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Path => {
                let path = match args.config {
                    Some(path) => path,
                    None => toml_loader::default_config_path().map_err(WtmError::from)?,
                };
                println!("{}", path.display());
            }
            ConfigAction::Show => println!("{}", config_to_json(&config)),
        },
    }
    Ok(())
}
