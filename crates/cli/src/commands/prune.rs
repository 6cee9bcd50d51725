//! Prune command - retention for stored history

use anyhow::Result;
use std::path::PathBuf;

use crate::args::PruneArgs;
use crate::commands::{build_analyzer, user_error};
use crate::config::AppConfig;

pub async fn execute(args: PruneArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let analyzer = build_analyzer(&config).await?;
    let deleted = analyzer.delete_old(args.days).await;
    analyzer.close().await;
    let deleted = deleted.map_err(user_error)?;

    println!("Deleted {} rows older than {} days", deleted, args.days);
    Ok(())
}
