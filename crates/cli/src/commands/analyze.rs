//! Analyze command - rank recent posts for a hashtag

use anyhow::Result;
use hashtag_tracker_domain::{
    calendar::{parse_date, parse_offset},
    model::AnalysisResult,
    usecases::AnalyzeOptions,
};
use std::path::PathBuf;

use crate::args::AnalyzeArgs;
use crate::commands::{build_analyzer, print_json, user_error};
use crate::config::AppConfig;

pub async fn execute(args: AnalyzeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let options = AnalyzeOptions {
        max_pages: args.max_pages,
        timeframe: args.timeframe.clone(),
        limit: args.limit,
        time_zone: args
            .timezone
            .as_deref()
            .map(parse_offset)
            .transpose()
            .map_err(user_error)?,
        filter_by_date: args.date.as_deref().map(parse_date).transpose().map_err(user_error)?,
    };

    let analyzer = build_analyzer(&config).await?;
    let result = analyzer.analyze_hashtag(&args.tag, options).await;
    analyzer.close().await;
    let result = result.map_err(user_error)?;

    if args.json {
        print_json(&result)?;
    } else {
        print_analysis(&result);
    }

    Ok(())
}

fn print_analysis(result: &AnalysisResult) {
    println!(
        "#{} ({}): {} fetched, {} shown",
        result.hashtag,
        result.timeframe,
        result.total_fetched,
        result.posts.len()
    );
    println!(
        "  dropped: {} invalid, {} ignored, {} scoring errors, {} outside window",
        result.stats.invalid,
        result.stats.ignored,
        result.stats.scoring_errors,
        result.stats.outside_window
    );
    println!();

    for (rank, post) in result.posts.iter().enumerate() {
        let author = post
            .author
            .as_ref()
            .map(|a| a.username.as_str())
            .unwrap_or("?");
        println!(
            "{:>3}. [{:.1}] @{}  fav {} / boost {} / reply {}",
            rank + 1,
            post.relevance_score.unwrap_or(0.0),
            author,
            post.favourites_count,
            post.reblogs_count,
            post.replies_count
        );
        if let Some(url) = &post.url {
            println!("     {}", url);
        }
    }
}
