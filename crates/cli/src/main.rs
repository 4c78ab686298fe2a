//! postsaga CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;

use args::{Cli, Commands};
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; the config file level applies when no flag is given
    let log_level = match &cli.log_level {
        Some(level) => level.clone(),
        None => AppConfig::load(cli.config.as_deref())
            .map(|c| c.general.log_level)
            .unwrap_or_else(|_| "info".to_string()),
    };
    init_logging(&log_level)?;

    // Execute command
    match cli.command {
        Commands::Create(args) => commands::post::create(args, cli.config).await,
        Commands::Edit(args) => commands::post::edit(args, cli.config).await,
        Commands::Delete(args) => commands::post::delete(args, cli.config).await,
        Commands::Upvote(args) => commands::post::upvote(args, cli.config).await,
        Commands::List(args) => commands::browse::list(args, cli.config).await,
        Commands::Show(args) => commands::browse::show(args, cli.config).await,
        Commands::Top(args) => commands::browse::top(args, cli.config).await,
        Commands::Config(args) => commands::config::execute(args).await,
        Commands::Doctor(args) => commands::doctor::execute(args, cli.config).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
