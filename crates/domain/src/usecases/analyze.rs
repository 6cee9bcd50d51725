//! Hashtag analysis use case - the entry point consumed by the CLI

use std::sync::Arc;

use time::{Date, UtcOffset};

use crate::{
    cache::{AnalysisCache, AnalysisKey, PostsKey},
    calendar::{format_date, retention_cutoff, today_in},
    error::TrackerError,
    model::{
        AnalysisResult, CollectOutcome, CollectionSummary, DateRangeSummary, HistoryRecord,
        TagUsageSample, Timeframe, TrendingPage, WeeklyAggregate, YearlySummary,
    },
    pipeline::{DataProcessingPipeline, ProcessOptions, truncate},
    ports::{Clock, HistoryStore, TRENDING_MAX_LIMIT, TagSource},
    schedule::normalize_tag,
    usecases::collect::HistoryCollector,
};

/// Configuration for the analyzer
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Pages fetched when the caller does not say
    pub default_max_pages: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            default_max_pages: 5,
        }
    }
}

/// Per-call analysis options
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub max_pages: Option<usize>,
    /// Raw timeframe, normalized before use
    pub timeframe: Option<String>,
    pub limit: Option<usize>,
    pub time_zone: Option<UtcOffset>,
    pub filter_by_date: Option<Date>,
}

/// Composes fetching, processing, caching and history storage
pub struct HashtagAnalyzer<S, H>
where
    S: TagSource + ?Sized,
    H: HistoryStore + ?Sized,
{
    source: Arc<S>,
    store: Arc<H>,
    pipeline: DataProcessingPipeline,
    cache: AnalysisCache,
    collector: HistoryCollector<S, H>,
    clock: Arc<dyn Clock>,
    config: AnalyzerConfig,
}

impl<S, H> HashtagAnalyzer<S, H>
where
    S: TagSource + ?Sized,
    H: HistoryStore + ?Sized,
{
    pub fn new(
        source: Arc<S>,
        store: Arc<H>,
        pipeline: DataProcessingPipeline,
        cache: AnalysisCache,
        collector: HistoryCollector<S, H>,
        clock: Arc<dyn Clock>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            source,
            store,
            pipeline,
            cache,
            collector,
            clock,
            config,
        }
    }

    pub fn collector(&self) -> &HistoryCollector<S, H> {
        &self.collector
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    fn today(&self, time_zone: UtcOffset) -> Date {
        today_in(self.clock.now(), time_zone)
    }

    /// Fetch, score and rank posts for a tag.
    ///
    /// Results are cached per `(tag, max_pages, timeframe)`; requests with a
    /// date filter or a non-default zone skip that cache but still reuse the
    /// day's raw posts.
    pub async fn analyze_hashtag(
        &self,
        tag: &str,
        options: AnalyzeOptions,
    ) -> Result<AnalysisResult, TrackerError> {
        let tag = normalize_tag(tag)?;
        let max_pages = options.max_pages.unwrap_or(self.config.default_max_pages);
        if max_pages == 0 {
            return Err(TrackerError::Validation(
                "max_pages must be at least 1".to_string(),
            ));
        }

        let timeframe = options
            .timeframe
            .as_deref()
            .map(Timeframe::normalize)
            .unwrap_or_default();
        let time_zone = options.time_zone.unwrap_or(self.pipeline.time_zone());
        let cacheable =
            options.filter_by_date.is_none() && time_zone == self.pipeline.time_zone();

        let key = AnalysisKey {
            tag: tag.clone(),
            max_pages,
            timeframe,
        };

        if cacheable {
            if let Some(cached) = self.cache.analysis(&key) {
                tracing::debug!(tag = %tag, timeframe = %timeframe, "Analysis cache hit");
                return Ok(limit_result(cached, options.limit));
            }
        }

        let posts_key = PostsKey {
            tag: tag.clone(),
            date: self.today(time_zone),
        };
        let posts = match self.cache.posts(&posts_key) {
            Some(posts) => posts,
            None => {
                let fetched = self
                    .source
                    .fetch_all_posts(&tag, max_pages)
                    .await
                    .map_err(|partial| {
                        tracing::warn!(
                            tag = %tag,
                            gathered = partial.posts.len(),
                            error = %partial.error,
                            "Fetching posts failed"
                        );
                        TrackerError::from(partial.error)
                    })?;
                let posts = Arc::new(fetched.posts);
                self.cache.put_posts(posts_key, Arc::clone(&posts));
                posts
            }
        };

        let output = self.pipeline.process(
            &posts,
            &ProcessOptions {
                filter_by_date: options.filter_by_date,
                timeframe: Some(timeframe),
                limit: None,
                time_zone: Some(time_zone),
            },
        );

        let result = AnalysisResult {
            hashtag: tag.clone(),
            timeframe,
            total_fetched: posts.len(),
            posts: output.posts,
            stats: output.stats,
            generated_at: self.clock.now(),
        };

        tracing::info!(
            tag = %tag,
            timeframe = %timeframe,
            fetched = result.total_fetched,
            kept = result.posts.len(),
            "Analysis complete"
        );

        if cacheable {
            self.cache.put_analysis(key, result.clone());
        }

        Ok(limit_result(result, options.limit))
    }

    /// A page of trending tags.
    ///
    /// The full upstream list is fetched once per trending TTL and sliced
    /// locally, so `total_count` can lag the live total by up to that TTL.
    pub async fn get_trending_tags(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<TrendingPage, TrackerError> {
        if limit == 0 {
            return Err(TrackerError::Validation(
                "limit must be at least 1".to_string(),
            ));
        }

        let all = match self.cache.trending() {
            Some(all) => all,
            None => {
                let fetched = Arc::new(self.source.fetch_trending(TRENDING_MAX_LIMIT, 0).await?);
                self.cache.put_trending(Arc::clone(&fetched));
                fetched
            }
        };

        let tags = all.iter().skip(offset).take(limit).cloned().collect();
        Ok(TrendingPage {
            tags,
            total_count: all.len(),
        })
    }

    /// Live usage series for a tag, straight from upstream
    pub async fn get_hashtag_history(&self, tag: &str) -> Result<Vec<TagUsageSample>, TrackerError> {
        let tag = normalize_tag(tag)?;
        Ok(self.source.fetch_usage_history(&tag).await?)
    }

    pub async fn collect_all_hashtags(
        &self,
        date: Option<Date>,
    ) -> Result<CollectionSummary, TrackerError> {
        self.collector.collect_all_hashtags(date).await
    }

    pub async fn collect_date_range(
        &self,
        start: Date,
        end: Date,
    ) -> Result<DateRangeSummary, TrackerError> {
        self.collector.collect_date_range(start, end).await
    }

    pub async fn collect_one(
        &self,
        tag: &str,
        date: Option<Date>,
    ) -> Result<CollectOutcome, TrackerError> {
        self.collector.collect_one(tag, date).await
    }

    /// Stored weekly aggregates for an ISO week-year
    pub async fn weekly_history(
        &self,
        tag: &str,
        year: i32,
    ) -> Result<Vec<WeeklyAggregate>, TrackerError> {
        let tag = normalize_tag(tag)?;
        Ok(self.store.weekly_history(&tag, year).await?)
    }

    /// Stored year roll-up with peak week
    pub async fn aggregate_weekly_data(
        &self,
        tag: &str,
        year: i32,
    ) -> Result<YearlySummary, TrackerError> {
        let tag = normalize_tag(tag)?;
        Ok(self.store.aggregate_weekly_data(&tag, year).await?)
    }

    /// Stored daily rows between two dates, inclusive
    pub async fn daily_history(
        &self,
        tag: &str,
        start: Date,
        end: Date,
    ) -> Result<Vec<HistoryRecord>, TrackerError> {
        let tag = normalize_tag(tag)?;
        if start > end {
            return Err(TrackerError::Validation(format!(
                "start date {} is after end date {}",
                format_date(start),
                format_date(end)
            )));
        }
        Ok(self.store.daily_range(&tag, start, end).await?)
    }

    /// Tags with stored history
    pub async fn tracked_hashtags(&self) -> Result<Vec<String>, TrackerError> {
        Ok(self.store.tracked_hashtags().await?)
    }

    /// Tags scheduled for today
    pub fn todays_hashtags(&self) -> Result<Vec<String>, TrackerError> {
        let today = self.collector.today();
        self.collector.schedule().tags_on(today.weekday())
    }

    /// Delete stored rows older than `days_to_keep` days
    pub async fn delete_old(&self, days_to_keep: u32) -> Result<u64, TrackerError> {
        let cutoff = retention_cutoff(self.today(self.pipeline.time_zone()), days_to_keep);
        let deleted = self.store.delete_before(cutoff).await?;
        tracing::info!(cutoff = %format_date(cutoff), deleted, "Pruned history");
        Ok(deleted)
    }

    /// Close the history store
    pub async fn close(&self) {
        self.store.close().await;
    }
}

fn limit_result(mut result: AnalysisResult, limit: Option<usize>) -> AnalysisResult {
    let (posts, removed) = truncate(result.posts, limit);
    result.posts = posts;
    result.stats.truncated = removed;
    result.stats.output = result.posts.len();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::model::{Author, Post, TrendingTag};
    use crate::pipeline::PipelineConfig;
    use crate::ports::{FetchError, FixedClock};
    use crate::scoring::RelevanceScorer;
    use crate::schedule::TagSchedule;
    use crate::usecases::collect::CollectorConfig;
    use crate::usecases::collect::tests::FakeStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use time::OffsetDateTime;
    use crate::model::DailyUsage;
    use time::macros::{date, datetime, offset};

    const NOW: OffsetDateTime = datetime!(2024-03-10 15:00 UTC);

    struct CountingSource {
        page_calls: Mutex<usize>,
        trending_calls: Mutex<usize>,
        history_tags: Mutex<Vec<String>>,
        rate_limited: bool,
        unknown_tag: bool,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                page_calls: Mutex::new(0),
                trending_calls: Mutex::new(0),
                history_tags: Mutex::new(vec![]),
                rate_limited: false,
                unknown_tag: false,
            }
        }

        fn page_calls(&self) -> usize {
            *self.page_calls.lock().unwrap()
        }
    }

    fn post(id: u64, favorites: i64, created_at: OffsetDateTime) -> Post {
        Post {
            id: id.to_string(),
            created_at: Some(created_at),
            content: Some("toot".to_string()),
            url: None,
            author: Some(Author {
                id: format!("a{}", id),
                username: format!("user{}", id),
                followers_count: 10,
                created_at: None,
            }),
            favourites_count: favorites,
            reblogs_count: 0,
            replies_count: 0,
            relevance_score: None,
        }
    }

    #[async_trait]
    impl TagSource for CountingSource {
        async fn fetch_page(
            &self,
            _tag: &str,
            _max_id: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<Post>, FetchError> {
            *self.page_calls.lock().unwrap() += 1;
            if self.rate_limited {
                return Err(FetchError::RateLimited {
                    retry_after: Some(Duration::from_secs(60)),
                });
            }
            Ok(vec![
                post(3, 100, NOW),
                post(2, 5, datetime!(2024-03-01 12:00 UTC)),
                post(1, 1000, datetime!(2024-01-01 12:00 UTC)),
            ])
        }

        async fn fetch_usage_history(
            &self,
            tag: &str,
        ) -> Result<Vec<TagUsageSample>, FetchError> {
            self.history_tags.lock().unwrap().push(tag.to_string());
            if self.unknown_tag {
                return Err(FetchError::NotFound {
                    resource: format!("tag #{}", tag),
                });
            }
            Ok(vec![TagUsageSample {
                day: datetime!(2024-03-10 00:00 UTC),
                uses: 12,
                accounts: 7,
            }])
        }

        async fn fetch_trending(
            &self,
            limit: usize,
            _offset: usize,
        ) -> Result<Vec<TrendingTag>, FetchError> {
            *self.trending_calls.lock().unwrap() += 1;
            Ok((0..limit.min(12))
                .map(|i| TrendingTag {
                    name: format!("tag{}", i),
                    url: None,
                    history: vec![],
                })
                .collect())
        }
    }

    fn analyzer(source: CountingSource) -> HashtagAnalyzer<CountingSource, FakeStore> {
        analyzer_at(source, NOW, UtcOffset::UTC)
    }

    fn analyzer_at(
        source: CountingSource,
        now: OffsetDateTime,
        time_zone: UtcOffset,
    ) -> HashtagAnalyzer<CountingSource, FakeStore> {
        let source = Arc::new(source);
        let store = Arc::new(FakeStore::default());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
        let pipeline = DataProcessingPipeline::new(
            RelevanceScorer::default(),
            PipelineConfig {
                time_zone,
                ..Default::default()
            },
            Arc::clone(&clock),
        );
        let collector = HistoryCollector::new(
            Arc::clone(&source),
            Arc::clone(&store),
            Arc::clone(&clock),
            TagSchedule {
                sunday: vec!["caturday".to_string()],
                ..Default::default()
            },
            CollectorConfig {
                batch_delay: Duration::ZERO,
                day_delay: Duration::ZERO,
                ..Default::default()
            },
        );
        HashtagAnalyzer::new(
            source,
            store,
            pipeline,
            AnalysisCache::new(CacheConfig::default()),
            collector,
            clock,
            AnalyzerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_equivalent_timeframes_share_one_fetch() {
        let analyzer = analyzer(CountingSource::new());

        let upper = analyzer
            .analyze_hashtag(
                "rust",
                AnalyzeOptions {
                    timeframe: Some("TODAY".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let lower = analyzer
            .analyze_hashtag(
                "#Rust",
                AnalyzeOptions {
                    timeframe: Some("today".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(analyzer.source.page_calls(), 1);
        assert_eq!(upper.timeframe, Timeframe::Today);
        assert_eq!(upper.posts.len(), 1);
        assert_eq!(lower.posts[0].id, upper.posts[0].id);
    }

    #[tokio::test]
    async fn test_other_timeframes_reuse_raw_posts() {
        let analyzer = analyzer(CountingSource::new());

        let all = analyzer
            .analyze_hashtag("rust", AnalyzeOptions::default())
            .await
            .unwrap();
        let month = analyzer
            .analyze_hashtag(
                "rust",
                AnalyzeOptions {
                    timeframe: Some("month".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(analyzer.source.page_calls(), 1);
        assert_eq!(all.posts.len(), 3);
        assert_eq!(all.posts[0].id, "1");
        assert_eq!(month.posts.len(), 2);
    }

    #[tokio::test]
    async fn test_limit_applies_to_cached_result() {
        let analyzer = analyzer(CountingSource::new());

        let full = analyzer
            .analyze_hashtag("rust", AnalyzeOptions::default())
            .await
            .unwrap();
        let limited = analyzer
            .analyze_hashtag(
                "rust",
                AnalyzeOptions {
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(full.posts.len(), 3);
        assert_eq!(limited.posts.len(), 1);
        assert_eq!(limited.stats.truncated, 2);
        assert_eq!(analyzer.source.page_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_analysis_refetches() {
        let analyzer = analyzer(CountingSource::new());

        analyzer
            .analyze_hashtag("rust", AnalyzeOptions::default())
            .await
            .unwrap();
        tokio::time::advance(CacheConfig::default().analysis_ttl).await;
        analyzer
            .analyze_hashtag("rust", AnalyzeOptions::default())
            .await
            .unwrap();

        assert_eq!(analyzer.source.page_calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_as_typed_error() {
        let mut source = CountingSource::new();
        source.rate_limited = true;
        let analyzer = analyzer(source);

        let err = analyzer
            .analyze_hashtag("rust", AnalyzeOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TrackerError::RateLimit { .. }));
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let analyzer = analyzer(CountingSource::new());

        let bad_tag = analyzer
            .analyze_hashtag("no spaces", AnalyzeOptions::default())
            .await;
        assert!(matches!(bad_tag, Err(TrackerError::Validation(_))));

        let zero_pages = analyzer
            .analyze_hashtag(
                "rust",
                AnalyzeOptions {
                    max_pages: Some(0),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(zero_pages, Err(TrackerError::Validation(_))));
        assert_eq!(analyzer.source.page_calls(), 0);
    }

    #[tokio::test]
    async fn test_trending_is_fetched_once_and_sliced() {
        let analyzer = analyzer(CountingSource::new());

        let first = analyzer.get_trending_tags(5, 0).await.unwrap();
        let second = analyzer.get_trending_tags(5, 10).await.unwrap();

        assert_eq!(first.tags.len(), 5);
        assert_eq!(first.total_count, 12);
        assert_eq!(second.tags.len(), 2);
        assert_eq!(second.tags[0].name, "tag10");
        assert_eq!(*analyzer.source.trending_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_todays_hashtags_follow_schedule() {
        let analyzer = analyzer(CountingSource::new());
        // 2024-03-10 is a Sunday
        assert_eq!(analyzer.todays_hashtags().unwrap(), vec!["caturday"]);
    }

    #[tokio::test]
    async fn test_collect_one_through_facade() {
        let analyzer = analyzer(CountingSource::new());

        let first = analyzer.collect_one("caturday", None).await.unwrap();
        let second = analyzer.collect_one("caturday", None).await.unwrap();

        assert!(matches!(first, CollectOutcome::Collected(_)));
        assert!(matches!(second, CollectOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_usage_history_normalizes_tag() {
        let analyzer = analyzer(CountingSource::new());

        let samples = analyzer.get_hashtag_history("#Rust").await.unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].uses, 12);
        assert_eq!(*analyzer.source.history_tags.lock().unwrap(), vec!["rust"]);
    }

    #[tokio::test]
    async fn test_usage_history_maps_upstream_errors() {
        let mut source = CountingSource::new();
        source.unknown_tag = true;
        let analyzer = analyzer(source);

        let missing = analyzer.get_hashtag_history("nosuchtag").await;
        assert!(matches!(missing, Err(TrackerError::NotFound(ref r)) if r == "tag #nosuchtag"));

        let invalid = analyzer.get_hashtag_history("not valid").await;
        assert!(matches!(invalid, Err(TrackerError::Validation(_))));
        assert_eq!(analyzer.source.history_tags.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_old_counts_days_in_configured_zone() {
        // Already 2024-03-11 at +02:00, so the cutoff is 2024-03-04
        let analyzer = analyzer_at(
            CountingSource::new(),
            datetime!(2024-03-10 23:30 UTC),
            offset!(+2),
        );
        let usage = DailyUsage {
            uses: 1,
            accounts: 1,
        };
        {
            let mut rows = analyzer.store.rows.lock().unwrap();
            for day in [
                date!(2024 - 03 - 02),
                date!(2024 - 03 - 03),
                date!(2024 - 03 - 04),
                date!(2024 - 03 - 10),
            ] {
                rows.insert(("rust".to_string(), day), usage);
            }
        }

        let deleted = analyzer.delete_old(7).await.unwrap();

        assert_eq!(deleted, 2);
        let rows = analyzer.store.rows.lock().unwrap();
        let mut kept: Vec<Date> = rows.keys().map(|(_, day)| *day).collect();
        kept.sort();
        assert_eq!(kept, vec![date!(2024 - 03 - 04), date!(2024 - 03 - 10)]);
    }
}
