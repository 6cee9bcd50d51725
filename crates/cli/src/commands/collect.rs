//! Collect command - store daily usage for scheduled hashtags

use anyhow::Result;
use hashtag_tracker_domain::{
    calendar::{format_date, parse_date},
    model::{CollectOutcome, CollectionSummary},
};
use serde_json::json;
use std::path::PathBuf;

use crate::args::CollectArgs;
use crate::commands::{build_analyzer, print_json, user_error};
use crate::config::AppConfig;

pub async fn execute(args: CollectArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let date = args.date.as_deref().map(parse_date).transpose().map_err(user_error)?;
    let range = match (args.from.as_deref(), args.to.as_deref()) {
        (Some(from), Some(to)) => Some((
            parse_date(from).map_err(user_error)?,
            parse_date(to).map_err(user_error)?,
        )),
        _ => None,
    };

    let analyzer = build_analyzer(&config).await?;

    let result = if let Some(tag) = &args.tag {
        let outcome = analyzer.collect_one(tag, date).await.map_err(user_error)?;
        if args.json {
            print_json(&outcome_json(tag, &outcome))?;
        } else {
            println!("{}", describe_outcome(tag, &outcome));
        }
        Ok(())
    } else if let Some((start, end)) = range {
        let summary = analyzer
            .collect_date_range(start, end)
            .await
            .map_err(user_error)?;
        if args.json {
            print_json(&summary)?;
        } else {
            for day in &summary.daily_summaries {
                print_summary(day);
            }
            println!(
                "{} to {}: {} days, {} collected, {} skipped, {} errors",
                format_date(summary.start),
                format_date(summary.end),
                summary.total_days,
                summary.total_collected,
                summary.total_skipped,
                summary.total_errors
            );
        }
        Ok(())
    } else {
        let summary = analyzer
            .collect_all_hashtags(date)
            .await
            .map_err(user_error)?;
        if args.json {
            print_json(&summary)?;
        } else {
            print_summary(&summary);
        }
        Ok(())
    };

    analyzer.close().await;
    result
}

fn print_summary(summary: &CollectionSummary) {
    println!(
        "{}: {} hashtags, {} collected, {} skipped, {} errors",
        format_date(summary.date),
        summary.total_hashtags,
        summary.collected,
        summary.skipped,
        summary.errors
    );
}

fn describe_outcome(tag: &str, outcome: &CollectOutcome) -> String {
    match outcome {
        CollectOutcome::Collected(usage) => format!(
            "#{}: collected {} uses by {} accounts",
            tag, usage.uses, usage.accounts
        ),
        CollectOutcome::Skipped { reason } => format!("#{}: skipped ({})", tag, reason),
        CollectOutcome::Failed { error } => format!("#{}: failed ({})", tag, error),
    }
}

fn outcome_json(tag: &str, outcome: &CollectOutcome) -> serde_json::Value {
    match outcome {
        CollectOutcome::Collected(usage) => json!({
            "hashtag": tag,
            "status": "collected",
            "uses": usage.uses,
            "accounts": usage.accounts,
        }),
        CollectOutcome::Skipped { reason } => json!({
            "hashtag": tag,
            "status": "skipped",
            "reason": reason,
        }),
        CollectOutcome::Failed { error } => json!({
            "hashtag": tag,
            "status": "failed",
            "error": error,
        }),
    }
}
