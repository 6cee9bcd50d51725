//! hashtag-tracker adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `history`: SQLite and in-memory history stores
//! - `mastodon`: Mastodon REST API tag source

mod history_memory;
mod history_sqlite;

pub mod mastodon;

/// Re-exports for history adapters
pub mod history {
    pub use crate::history_memory::InMemoryHistoryStore;
    pub use crate::history_sqlite::SqliteHistoryStore;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hashtag_tracker_domain::{
        Author, Clock, FixedClock, Post, TagUsageSample, TrendingTag,
        cache::AnalysisCache,
        model::CollectOutcome,
        pipeline::{DataProcessingPipeline, PipelineConfig},
        schedule::TagSchedule,
        scoring::RelevanceScorer,
        usecases::{AnalyzeOptions, AnalyzerConfig, CollectorConfig, HashtagAnalyzer, HistoryCollector},
    };
    use time::macros::{date, datetime};

    use crate::history::SqliteHistoryStore;
    use crate::mastodon::StubTagSource;

    fn post(id: u64, favourites: i64) -> Post {
        Post {
            id: id.to_string(),
            created_at: Some(datetime!(2024-01-15 10:00 UTC)),
            content: Some("hello".to_string()),
            url: None,
            author: Some(Author {
                id: "1".to_string(),
                username: "alice".to_string(),
                followers_count: 50,
                created_at: None,
            }),
            favourites_count: favourites,
            reblogs_count: 0,
            replies_count: 0,
            relevance_score: None,
        }
    }

    #[tokio::test]
    async fn test_stub_source_and_sqlite_store_behind_analyzer() {
        let source = Arc::new(
            StubTagSource::empty()
                .with_posts((1..=50).rev().map(|i| post(i, i as i64)).collect())
                .with_history(vec![TagUsageSample {
                    day: datetime!(2024-01-15 00:00 UTC),
                    uses: 42,
                    accounts: 17,
                }])
                .with_trending(vec![TrendingTag {
                    name: "rust".to_string(),
                    url: None,
                    history: vec![],
                }]),
        );
        let store = Arc::new(SqliteHistoryStore::in_memory().await.unwrap());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(datetime!(2024-01-15 18:00 UTC)));

        let collector = HistoryCollector::new(
            Arc::clone(&source),
            Arc::clone(&store),
            Arc::clone(&clock),
            TagSchedule {
                monday: vec!["rust".to_string()],
                ..Default::default()
            },
            CollectorConfig {
                batch_delay: Duration::ZERO,
                day_delay: Duration::ZERO,
                ..Default::default()
            },
        );
        let analyzer = HashtagAnalyzer::new(
            source,
            Arc::clone(&store),
            DataProcessingPipeline::new(
                RelevanceScorer::default(),
                PipelineConfig::default(),
                Arc::clone(&clock),
            ),
            AnalysisCache::default(),
            collector,
            clock,
            AnalyzerConfig::default(),
        );

        let result = analyzer
            .analyze_hashtag(
                "rust",
                AnalyzeOptions {
                    limit: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.total_fetched, 50);
        assert_eq!(result.posts.len(), 5);
        assert_eq!(result.posts[0].id, "50");

        let summary = analyzer.collect_all_hashtags(None).await.unwrap();
        assert_eq!(summary.collected, 1);
        assert!(matches!(
            analyzer.collect_one("rust", None).await.unwrap(),
            CollectOutcome::Skipped { .. }
        ));

        let stored = analyzer
            .daily_history("rust", date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].uses, 42);

        let page = analyzer.get_trending_tags(10, 0).await.unwrap();
        assert_eq!(page.total_count, 1);

        analyzer.close().await;
    }
}
