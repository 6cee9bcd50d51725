//! History command - stored usage for a hashtag

use anyhow::{Context, Result};
use hashtag_tracker_domain::{
    Clock, SystemClock,
    calendar::{format_date, iso_week, today_in},
    model::YearlySummary,
};
use std::path::PathBuf;
use time::{Date, Month};

use crate::args::HistoryArgs;
use crate::commands::{Analyzer, build_analyzer, print_json, user_error};
use crate::config::AppConfig;

pub async fn execute(args: HistoryArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let today = today_in(SystemClock.now(), config.time_zone()?);
    let year = args.year.unwrap_or_else(|| iso_week(today).year);

    let analyzer = build_analyzer(&config).await?;
    let result = match &args.tag {
        None => list_tracked(&analyzer, args.json).await,
        Some(tag) if args.daily => show_daily(&analyzer, tag, year, args.json).await,
        Some(tag) => show_weekly(&analyzer, tag, year, args.json).await,
    };
    analyzer.close().await;
    result
}

async fn list_tracked(analyzer: &Analyzer, json: bool) -> Result<()> {
    let tags = analyzer.tracked_hashtags().await.map_err(user_error)?;
    if json {
        return print_json(&tags);
    }
    if tags.is_empty() {
        println!("No hashtags stored yet");
    }
    for tag in tags {
        println!("#{}", tag);
    }
    Ok(())
}

async fn show_daily(analyzer: &Analyzer, tag: &str, year: i32, json: bool) -> Result<()> {
    let start = Date::from_calendar_date(year, Month::January, 1)
        .with_context(|| format!("Invalid year {}", year))?;
    let end = Date::from_calendar_date(year, Month::December, 31)
        .with_context(|| format!("Invalid year {}", year))?;

    let rows = analyzer
        .daily_history(tag, start, end)
        .await
        .map_err(user_error)?;
    if json {
        return print_json(&rows);
    }

    println!("#{} daily usage in {} ({} days stored)", tag, year, rows.len());
    for row in rows {
        println!(
            "{}  W{:02}  {:>8} uses  {:>6} accounts",
            format_date(row.date),
            row.iso_week,
            row.uses,
            row.accounts
        );
    }
    Ok(())
}

async fn show_weekly(analyzer: &Analyzer, tag: &str, year: i32, json: bool) -> Result<()> {
    let summary = analyzer
        .aggregate_weekly_data(tag, year)
        .await
        .map_err(user_error)?;
    if json {
        return print_json(&summary);
    }
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &YearlySummary) {
    println!(
        "#{} in ISO year {}: {} uses, {} accounts, {} per week on average",
        summary.hashtag,
        summary.year,
        summary.total_uses,
        summary.total_accounts,
        summary.average_weekly
    );
    if let Some(peak) = &summary.peak_week {
        println!(
            "Peak: week {} ({} to {}) with {} uses",
            peak.week_number,
            format_date(peak.week_start),
            format_date(peak.week_end),
            peak.total_uses
        );
    }
    println!();
    for week in &summary.weeks {
        println!(
            "W{:02}  {}  {:>8} uses  {:>6} accounts  {:>7.1}/day over {} days",
            week.week_number,
            format_date(week.week_start),
            week.total_uses,
            week.total_accounts,
            week.daily_average,
            week.days_counted
        );
    }
}
