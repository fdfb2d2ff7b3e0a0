//! Command-line front end for eventdesk: one-shot subcommands plus an interactive menu.

pub mod app;
pub mod cli_args;
mod shell;

use std::io;

use anyhow::{Result, anyhow, bail};
use eventdesk_core::logging::{LoggingDestination, init_logging};
use eventdesk_core::{
    ConfigSource, FileConfig, Settings, apply_runtime_overrides, config_path, load_config,
    save_config,
};
use tracing::debug;

use app::App;
use cli_args::{Cli, Command, ConfigCommand, StorageArgs};

/// Runs one parsed invocation to completion.
pub fn run(cli: Cli) -> Result<()> {
    let interactive = matches!(cli.command, None | Some(Command::Shell));
    let destination = if cli.verbose && !interactive {
        LoggingDestination::FileAndStderr
    } else {
        LoggingDestination::FileOnly
    };
    if let Err(err) = init_logging(destination) {
        eprintln!("Warning: structured logging disabled: {err}");
    }

    match cli.command {
        Some(Command::Config(cmd)) => {
            if !cli.storage.is_empty() {
                bail!("Storage flags cannot be combined with config commands.");
            }
            handle_config_command(cmd)
        }
        Some(Command::Action(action)) => {
            let mut app = open_app(&cli.storage)?;
            let mut stdout = io::stdout();
            let result = app.dispatch(action, &mut stdout);
            app.save_if_dirty()?;
            result
        }
        Some(Command::Shell) | None => {
            let mut app = open_app(&cli.storage)?;
            app.record("System started");
            shell::run_shell(&mut app)
        }
    }
}

/// Resolves config plus CLI flags into the settings a run uses.
pub fn resolve_settings(args: &StorageArgs) -> Result<Settings> {
    let load = load_config();
    let mut warnings = load.warnings;
    let overrides = args.to_runtime_overrides().map_err(|msg| anyhow!(msg))?;
    let settings = apply_runtime_overrides(&load.config, &overrides, &mut warnings);
    for warning in &warnings {
        eprintln!("Warning: {warning}");
    }
    debug!(?settings, source = ?load.source, "settings resolved");
    Ok(settings)
}

fn open_app(args: &StorageArgs) -> Result<App> {
    let settings = resolve_settings(args)?;
    let (app, warnings) = App::open(settings)?;
    for warning in &warnings {
        eprintln!("Warning: {warning}");
    }
    Ok(app)
}

fn handle_config_command(cmd: ConfigCommand) -> Result<()> {
    let path = config_path();
    match cmd {
        ConfigCommand::Show => {
            let load = load_config();
            for warning in &load.warnings {
                eprintln!("Warning: {warning}");
            }
            let origin = match load.source {
                ConfigSource::File => "file",
                ConfigSource::Default => "defaults",
            };
            println!("Config file: {} ({origin})", path.display());
            let mut warnings = Vec::new();
            let settings =
                apply_runtime_overrides(&load.config, &Default::default(), &mut warnings);
            println!("Snapshot: {}", settings.snapshot_path.display());
            match &settings.journal_path {
                Some(journal) => println!("Journal: {}", journal.display()),
                None => println!("Journal: disabled"),
            }
            println!("Buckets: {}", settings.buckets);
            Ok(())
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite it.",
                    path.display()
                );
            }
            save_config(&FileConfig::default())?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
    }
}
