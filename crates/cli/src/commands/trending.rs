//! Trending command - list trending hashtags

use anyhow::Result;
use std::path::PathBuf;

use crate::args::TrendingArgs;
use crate::commands::{build_analyzer, print_json, user_error};
use crate::config::AppConfig;

pub async fn execute(args: TrendingArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let analyzer = build_analyzer(&config).await?;
    let page = analyzer.get_trending_tags(args.limit, args.offset).await;
    analyzer.close().await;
    let page = page.map_err(user_error)?;

    if args.json {
        return print_json(&page);
    }

    println!(
        "Trending hashtags {}-{} of {}",
        args.offset + 1,
        args.offset + page.tags.len(),
        page.total_count
    );
    for (i, tag) in page.tags.iter().enumerate() {
        println!(
            "{:>3}. #{:<30} {} uses",
            args.offset + i + 1,
            tag.name,
            tag.total_uses()
        );
    }

    Ok(())
}
