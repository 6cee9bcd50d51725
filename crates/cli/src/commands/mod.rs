//! Subcommand implementations

pub mod analyze;
pub mod collect;
pub mod config;
pub mod history;
pub mod prune;
pub mod today;
pub mod trending;

use anyhow::{Context, Result};
use hashtag_tracker_adapters::{history::SqliteHistoryStore, mastodon::MastodonClient};
use hashtag_tracker_domain::{
    Clock, SystemClock, TrackerError,
    cache::AnalysisCache,
    pipeline::DataProcessingPipeline,
    usecases::{AnalyzerConfig, HashtagAnalyzer, HistoryCollector},
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;

pub type Analyzer = HashtagAnalyzer<MastodonClient, SqliteHistoryStore>;

/// Construct the client, store, cache, collector and analyzer once
pub async fn build_analyzer(config: &AppConfig) -> Result<Analyzer> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let source = Arc::new(
        MastodonClient::new(config.mastodon_config())
            .context("Failed to initialize Mastodon client")?,
    );
    let store = Arc::new(
        SqliteHistoryStore::new(&config.general.db_path)
            .await
            .context("Failed to open history database")?,
    );

    let pipeline = DataProcessingPipeline::new(
        config.scorer()?,
        config.pipeline_config()?,
        Arc::clone(&clock),
    );
    let collector = HistoryCollector::new(
        Arc::clone(&source),
        Arc::clone(&store),
        Arc::clone(&clock),
        config.schedule.clone(),
        config.collector_config()?,
    );

    tracing::debug!(
        instance = %config.mastodon.instance_url,
        db = %config.general.db_path.display(),
        "Analyzer ready"
    );

    Ok(HashtagAnalyzer::new(
        source,
        store,
        pipeline,
        AnalysisCache::new(config.cache_config()),
        collector,
        clock,
        AnalyzerConfig {
            default_max_pages: config.mastodon.max_pages,
        },
    ))
}

/// Turn a domain error into a user-facing message prefixed by its kind
pub fn user_error(error: TrackerError) -> anyhow::Error {
    let message = match &error {
        TrackerError::RateLimit {
            retry_after: Some(wait),
        } => format!("try again later (retry after {}s)", wait.as_secs()),
        TrackerError::RateLimit { retry_after: None } => "try again later".to_string(),
        TrackerError::NotFound(resource) => format!("no data for {}", resource),
        other => other.to_string(),
    };
    anyhow::anyhow!("{}: {}", error.kind(), message)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_user_error_messages() {
        let err = user_error(TrackerError::RateLimit {
            retry_after: Some(Duration::from_secs(30)),
        });
        assert_eq!(
            err.to_string(),
            "rate_limit_error: try again later (retry after 30s)"
        );

        let err = user_error(TrackerError::NotFound("tag #nope".to_string()));
        assert_eq!(err.to_string(), "not_found_error: no data for tag #nope");

        let err = user_error(TrackerError::Validation("bad date".to_string()));
        assert!(err.to_string().starts_with("validation_error:"));
    }
}
