use std::io;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tk_cli::commands::{devices, edit, init, log, start, status, summary, tags, week};
use tk_cli::{Cli, Commands, Config};

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
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = &mut io::stdout();
    let now = Utc::now();
    let tz = &Local;

    match command {
        Commands::Init { label } => init::run(stdout, &config, label.as_deref())?,
        Commands::Start { tags, at } => {
            start::start(stdout, &config, tags, at.as_deref(), now, tz)?;
        }
        Commands::Stop { at } => start::stop(stdout, &config, at.as_deref(), now, tz)?,
        Commands::Status => status::run(stdout, &config, now, tz)?,
        Commands::Log(query) => log::run(stdout, &config, query, now, tz)?,
        Commands::Summary { query, json } => {
            summary::run(stdout, &config, query, *json, now, tz)?;
        }
        Commands::Week(query) => week::run(stdout, &config, query, now, tz)?,
        Commands::Tags(range) => tags::run(stdout, &config, range, now, tz)?,
        Commands::Retag { event, tags } => edit::retag(stdout, &config, event, tags)?,
        Commands::Reschedule { event, time } => {
            edit::reschedule(stdout, &config, event, time, now, tz)?;
        }
        Commands::Devices => devices::run(stdout, &config)?,
    }

    Ok(())
}
