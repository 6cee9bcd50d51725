//! Domain models and value objects

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::pipeline::PipelineStats;

/// Author of a post as reported by the remote instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Instance-specific account ID
    pub id: String,
    /// Local username (without instance domain)
    pub username: String,
    /// Follower count at fetch time
    pub followers_count: i64,
    /// Raw account creation timestamp, kept unparsed
    pub created_at: Option<String>,
}

/// A post fetched from a hashtag timeline.
///
/// Fields the remote may omit are optional here; the pipeline's structural
/// validation decides what is usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Status ID, used as the pagination cursor
    pub id: String,
    /// When the post was created
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    /// HTML content
    pub content: Option<String>,
    /// Public URL of the post
    pub url: Option<String>,
    /// Author, absent when the payload was malformed
    pub author: Option<Author>,
    pub favourites_count: i64,
    pub reblogs_count: i64,
    pub replies_count: i64,
    /// Assigned by the pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// One day of usage for a tag, as reported upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsageSample {
    /// Start of the sampled day, in UTC
    #[serde(with = "time::serde::rfc3339")]
    pub day: OffsetDateTime,
    pub uses: u64,
    pub accounts: u64,
}

impl TagUsageSample {
    /// The calendar day this sample aggregates.
    ///
    /// The remote aggregates by UTC day, so this never uses the configured
    /// time zone.
    pub fn utc_date(&self) -> Date {
        self.day.to_offset(time::UtcOffset::UTC).date()
    }
}

/// A trending tag with its recent usage series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTag {
    pub name: String,
    pub url: Option<String>,
    pub history: Vec<TagUsageSample>,
}

impl TrendingTag {
    /// Total uses across the reported history
    pub fn total_uses(&self) -> u64 {
        self.history.iter().map(|s| s.uses).sum()
    }
}

/// A page of trending tags sliced from the cached full list
#[derive(Debug, Clone, Serialize)]
pub struct TrendingPage {
    pub tags: Vec<TrendingTag>,
    /// Size of the cached upstream list, may lag the live total by up to the
    /// trending cache TTL
    pub total_count: usize,
}

/// Daily counters to persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailyUsage {
    pub uses: u64,
    pub accounts: u64,
}

impl From<&TagUsageSample> for DailyUsage {
    fn from(sample: &TagUsageSample) -> Self {
        Self {
            uses: sample.uses,
            accounts: sample.accounts,
        }
    }
}

/// Durable per-tag, per-day usage row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub hashtag: String,
    pub date: Date,
    /// ISO week-year, may differ from `date.year()` around New Year
    pub year: i32,
    pub iso_week: u8,
    pub uses: u64,
    pub accounts: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub collected_at: OffsetDateTime,
}

/// Usage summed over one ISO week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    pub hashtag: String,
    pub year: i32,
    pub week_number: u8,
    /// Monday of the week
    pub week_start: Date,
    /// Sunday of the week
    pub week_end: Date,
    pub total_uses: u64,
    pub total_accounts: u64,
    pub daily_average: f64,
    pub days_counted: u32,
}

/// Year-level roll-up of weekly aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlySummary {
    pub hashtag: String,
    pub year: i32,
    pub weeks: Vec<WeeklyAggregate>,
    pub total_uses: u64,
    pub total_accounts: u64,
    pub average_weekly: f64,
    pub peak_week: Option<WeeklyAggregate>,
}

/// Named time windows for analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Today,
    Week,
    Month,
    #[default]
    All,
}

impl Timeframe {
    /// Normalize user input to a timeframe.
    ///
    /// Matching is case-insensitive and accepts a few aliases. Unknown values
    /// fall back to `All` with a warning.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "today" | "day" | "24h" => Self::Today,
            "week" | "weekly" | "7d" => Self::Week,
            "month" | "monthly" | "30d" => Self::Month,
            "all" | "" => Self::All,
            other => {
                tracing::warn!(timeframe = %other, "Unknown timeframe, using 'all'");
                Self::All
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a hashtag analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub hashtag: String,
    pub timeframe: Timeframe,
    /// Posts retrieved from upstream before processing
    pub total_fetched: usize,
    /// Scored posts, most relevant first
    pub posts: Vec<Post>,
    pub stats: PipelineStats,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

/// Outcome of collecting one tag for one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// A new row was written
    Collected(DailyUsage),
    /// Nothing written (already stored, or no sample for the day)
    Skipped { reason: String },
    /// Fetch or store failure
    Failed { error: String },
}

/// Result of collecting every configured tag for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub date: Date,
    pub total_hashtags: usize,
    pub collected: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Result of collecting an inclusive range of days
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRangeSummary {
    pub start: Date,
    pub end: Date,
    pub total_days: usize,
    pub total_collected: usize,
    pub total_skipped: usize,
    pub total_errors: usize,
    pub daily_summaries: Vec<CollectionSummary>,
}
