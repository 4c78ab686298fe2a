//! Config command - write the example configuration

use anyhow::{Context, Result, bail};
use std::path::Path;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => init_config(&path, force).await,
    }
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    tokio::fs::write(path, AppConfig::example_toml())
        .await
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    // Read it back through the normal loader so a broken template fails here
    let written = AppConfig::load(Some(path))?;
    tracing::debug!(path = %path.display(), "Config file written");

    println!("Created config file: {}", path.display());
    println!(
        "  relational: {} ({})",
        written.relational.backend,
        written.relational.db_path.display()
    );
    println!("  blob:       {}", written.blob.backend);
    println!("  metrics:    {}", written.metrics.backend);
    println!();
    println!("Next steps:");
    println!("  1. Pick the blob and metrics backends and set their endpoints");
    println!(
        "  2. Export {} and {} when using azure and influx",
        written.blob.azure.sas_token_env, written.metrics.influx.token_env
    );
    println!("  3. Run 'postsaga doctor' to validate your setup");

    Ok(())
}
