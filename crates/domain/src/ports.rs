//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime};

use crate::model::{
    DailyUsage, HistoryRecord, Post, TagUsageSample, TrendingTag, WeeklyAggregate, YearlySummary,
};

/// Posts requested per timeline page
pub const PAGE_SIZE: usize = 40;

/// Largest trending page the upstream serves
pub const TRENDING_MAX_LIMIT: usize = 20;

/// Error type for remote fetch operations
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API error: {message}")]
    Api {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    #[error("Rate limited, retry after: {retry_after:?}")]
    RateLimited {
        retry_after: Option<std::time::Duration>,
    },
    #[error("Not found: {resource}")]
    NotFound { resource: String },
    #[error("Malformed response: {message}")]
    Malformed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FetchError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Errors that end a paginated walk even after earlier pages succeeded
    pub fn aborts_pagination(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Malformed { .. })
    }
}

/// Pagination aborted; carries the posts gathered before the error
#[derive(Debug, Error)]
#[error("{error} (after {} posts)", .posts.len())]
pub struct PartialFetch {
    pub posts: Vec<Post>,
    #[source]
    pub error: FetchError,
}

/// Why a paginated walk stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEnd {
    /// Upstream returned an empty page
    Exhausted,
    /// Upstream returned fewer items than requested
    ShortPage,
    /// `max_pages` reached, more data may exist
    MaxPages,
    /// A later page failed; earlier pages were kept
    Failed(String),
}

/// Posts gathered by a paginated walk
#[derive(Debug, Clone)]
pub struct Paginated {
    pub posts: Vec<Post>,
    pub pages: usize,
    pub end: PageEnd,
}

/// Port for reading tag timelines and usage counters from the remote API
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Fetch one page of a tag timeline, older than `max_id` when given
    async fn fetch_page(
        &self,
        tag: &str,
        max_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Post>, FetchError>;

    /// Fetch the per-day usage series for a tag
    async fn fetch_usage_history(&self, tag: &str) -> Result<Vec<TagUsageSample>, FetchError>;

    /// Fetch currently trending tags
    async fn fetch_trending(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TrendingTag>, FetchError>;

    /// Walk the tag timeline newest to oldest, up to `max_pages` pages.
    ///
    /// A rate limit or a malformed payload aborts the walk and is returned with
    /// the posts gathered so far. Any other failure after the first page is
    /// logged and the earlier pages are returned; a failure on the first page
    /// is returned as is.
    async fn fetch_all_posts(
        &self,
        tag: &str,
        max_pages: usize,
    ) -> Result<Paginated, PartialFetch> {
        let mut posts: Vec<Post> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        let end = loop {
            if pages >= max_pages {
                break PageEnd::MaxPages;
            }

            let page = match self.fetch_page(tag, cursor.as_deref(), PAGE_SIZE).await {
                Ok(page) => page,
                Err(error) if error.aborts_pagination() || pages == 0 => {
                    return Err(PartialFetch { posts, error });
                }
                Err(error) => {
                    tracing::warn!(
                        tag = %tag,
                        page = pages + 1,
                        kept = posts.len(),
                        error = %error,
                        "Page fetch failed, returning partial results"
                    );
                    break PageEnd::Failed(error.to_string());
                }
            };
            pages += 1;

            if page.is_empty() {
                break PageEnd::Exhausted;
            }

            let short = page.len() < PAGE_SIZE;
            cursor = page.last().map(|p| p.id.clone());
            posts.extend(page);

            if short {
                break PageEnd::ShortPage;
            }
        };

        tracing::debug!(tag = %tag, pages, count = posts.len(), end = ?end, "Pagination finished");

        Ok(Paginated { posts, pages, end })
    }
}

/// Error type for history store operations
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the durable per-day usage store
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert a day's counters unless the `(hashtag, date)` pair exists.
    /// Returns `true` when a row was written.
    async fn save_daily(
        &self,
        hashtag: &str,
        date: Date,
        usage: DailyUsage,
        collected_at: OffsetDateTime,
    ) -> Result<bool, HistoryError>;

    /// Get the stored row for a day
    async fn get_daily(
        &self,
        hashtag: &str,
        date: Date,
    ) -> Result<Option<HistoryRecord>, HistoryError>;

    /// Rows for a tag between two dates, inclusive, oldest first
    async fn daily_range(
        &self,
        hashtag: &str,
        start: Date,
        end: Date,
    ) -> Result<Vec<HistoryRecord>, HistoryError>;

    /// Weekly aggregates for an ISO week-year, ordered by week
    async fn weekly_history(
        &self,
        hashtag: &str,
        year: i32,
    ) -> Result<Vec<WeeklyAggregate>, HistoryError>;

    /// Year roll-up built from [`HistoryStore::weekly_history`]
    async fn aggregate_weekly_data(
        &self,
        hashtag: &str,
        year: i32,
    ) -> Result<YearlySummary, HistoryError> {
        let weeks = self.weekly_history(hashtag, year).await?;
        Ok(crate::calendar::summarize_year(hashtag, year, weeks))
    }

    /// Delete every row dated before `cutoff`, returning the count removed
    async fn delete_before(&self, cutoff: Date) -> Result<u64, HistoryError>;

    /// Distinct tags present in the store
    async fn tracked_hashtags(&self) -> Result<Vec<String>, HistoryError>;

    /// Release underlying resources
    async fn close(&self);
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves canned page results in order and records cursors
    struct ScriptedSource {
        pages: Mutex<Vec<Result<Vec<Post>, FetchError>>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(mut pages: Vec<Result<Vec<Post>, FetchError>>) -> Self {
            pages.reverse();
            Self {
                pages: Mutex::new(pages),
                cursors: Mutex::new(vec![]),
            }
        }

        fn requests(&self) -> usize {
            self.cursors.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TagSource for ScriptedSource {
        async fn fetch_page(
            &self,
            _tag: &str,
            max_id: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<Post>, FetchError> {
            self.cursors.lock().unwrap().push(max_id.map(String::from));
            self.pages.lock().unwrap().pop().unwrap_or(Ok(vec![]))
        }

        async fn fetch_usage_history(
            &self,
            _tag: &str,
        ) -> Result<Vec<TagUsageSample>, FetchError> {
            Ok(vec![])
        }

        async fn fetch_trending(
            &self,
            _limit: usize,
            _offset: usize,
        ) -> Result<Vec<TrendingTag>, FetchError> {
            Ok(vec![])
        }
    }

    fn page(start_id: u64, len: usize) -> Vec<Post> {
        (0..len as u64)
            .map(|i| Post {
                id: (start_id - i).to_string(),
                created_at: None,
                content: Some(String::new()),
                url: None,
                author: None,
                favourites_count: 0,
                reblogs_count: 0,
                replies_count: 0,
                relevance_score: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_stops_on_short_page() {
        let source = ScriptedSource::new(vec![
            Ok(page(1000, 40)),
            Ok(page(960, 40)),
            Ok(page(920, 12)),
        ]);

        let result = source.fetch_all_posts("rust", 10).await.unwrap();

        assert_eq!(result.posts.len(), 92);
        assert_eq!(result.pages, 3);
        assert_eq!(result.end, PageEnd::ShortPage);
        assert_eq!(source.requests(), 3);

        let cursors = source.cursors.lock().unwrap().clone();
        assert_eq!(
            cursors,
            vec![None, Some("961".to_string()), Some("921".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let source = ScriptedSource::new(vec![Ok(page(1000, 40)), Ok(vec![])]);

        let result = source.fetch_all_posts("rust", 10).await.unwrap();

        assert_eq!(result.posts.len(), 40);
        assert_eq!(result.end, PageEnd::Exhausted);
    }

    #[tokio::test]
    async fn test_stops_at_max_pages() {
        let source = ScriptedSource::new(vec![
            Ok(page(1000, 40)),
            Ok(page(960, 40)),
            Ok(page(920, 40)),
        ]);

        let result = source.fetch_all_posts("rust", 2).await.unwrap();

        assert_eq!(result.posts.len(), 80);
        assert_eq!(result.end, PageEnd::MaxPages);
        assert_eq!(source.requests(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_gathered_posts_with_error() {
        let source = ScriptedSource::new(vec![
            Ok(page(1000, 40)),
            Err(FetchError::RateLimited { retry_after: None }),
        ]);

        let partial = source.fetch_all_posts("rust", 5).await.unwrap_err();

        assert_eq!(partial.posts.len(), 40);
        assert!(partial.error.is_rate_limited());
        assert_eq!(source.requests(), 2);
    }

    #[tokio::test]
    async fn test_later_failure_keeps_earlier_pages() {
        let source = ScriptedSource::new(vec![
            Ok(page(1000, 40)),
            Err(FetchError::api("upstream 502")),
        ]);

        let result = source.fetch_all_posts("rust", 5).await.unwrap();

        assert_eq!(result.posts.len(), 40);
        assert!(matches!(result.end, PageEnd::Failed(_)));
    }

    #[tokio::test]
    async fn test_malformed_page_aborts_walk() {
        let source = ScriptedSource::new(vec![
            Ok(page(1000, 40)),
            Err(FetchError::Malformed {
                message: "tag timeline #rust".to_string(),
                source: None,
            }),
            Ok(page(960, 40)),
        ]);

        let partial = source.fetch_all_posts("rust", 5).await.unwrap_err();

        assert_eq!(partial.posts.len(), 40);
        assert!(matches!(partial.error, FetchError::Malformed { .. }));
        assert_eq!(source.requests(), 2);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_returned() {
        let source = ScriptedSource::new(vec![Err(FetchError::NotFound {
            resource: "timelines/tag/missing".to_string(),
        })]);

        let partial = source.fetch_all_posts("missing", 5).await.unwrap_err();

        assert!(partial.posts.is_empty());
        assert!(matches!(partial.error, FetchError::NotFound { .. }));
    }
}
