use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use labuse_cli::commands::{cache, peaks, report, timeline};
use labuse_cli::dataset::load_prepared;
use labuse_cli::{CacheAction, Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Report {
            dataset,
            json,
            no_cache,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let prepared = load_prepared(dataset)?;
            report::run(&mut out, &prepared, &config, *json, !*no_cache)?;
        }
        Some(Commands::Timeline {
            dataset,
            area,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let prepared = load_prepared(dataset)?;
            timeline::run(&mut out, &prepared, &config, area, *json)?;
        }
        Some(Commands::Peaks { dataset, by, json }) => {
            let config = load_config(cli.config.as_deref())?;
            let prepared = load_prepared(dataset)?;
            peaks::run(&mut out, &prepared, &config, *by, *json)?;
        }
        Some(Commands::Cache(action)) => {
            let config = load_config(cli.config.as_deref())?;
            match action {
                CacheAction::Stats => cache::stats(&mut out, &config)?,
                CacheAction::Clear => cache::clear(&mut out, &config)?,
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    out.flush()?;
    Ok(())
}
