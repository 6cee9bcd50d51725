//! Config command - configuration management

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => init_config(&path, force),
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, AppConfig::example_toml())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    tracing::debug!(path = %path.display(), "Wrote example configuration");

    println!("Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit [schedule] with the hashtags to follow each weekday");
    println!("  2. Run 'hashtag-tracker today' to check the schedule");
    println!("  3. Run 'hashtag-tracker collect' to store today's usage");

    Ok(())
}
