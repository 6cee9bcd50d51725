//! History collection use case - batched per-day usage collection

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use time::{Date, OffsetDateTime, UtcOffset};
use tokio::time::sleep;

use crate::{
    calendar::{days_inclusive, format_date, today_in},
    error::TrackerError,
    model::{CollectOutcome, CollectionSummary, DailyUsage, DateRangeSummary},
    ports::{Clock, HistoryStore, TagSource},
    schedule::{TagSchedule, normalize_tag},
};

/// Configuration for the collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Tags collected concurrently per batch
    pub batch_size: usize,
    /// Pause between batches
    pub batch_delay: Duration,
    /// Pause between days of a range
    pub day_delay: Duration,
    /// Zone that decides what "today" is
    pub time_zone: UtcOffset,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay: Duration::from_secs(2),
            day_delay: Duration::from_secs(5),
            time_zone: UtcOffset::UTC,
        }
    }
}

/// Which entry point a set of counters belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsScope {
    SingleDay,
    DateRange,
    SingleTag,
}

/// Running counters for one scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionCounters {
    pub runs: u64,
    pub collected: u64,
    pub skipped: u64,
    pub errors: u64,
    pub last_run: Option<OffsetDateTime>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    collected: usize,
    skipped: usize,
    errors: usize,
}

impl Tally {
    fn add(&mut self, outcome: &CollectOutcome) {
        match outcome {
            CollectOutcome::Collected(_) => self.collected += 1,
            CollectOutcome::Skipped { .. } => self.skipped += 1,
            CollectOutcome::Failed { .. } => self.errors += 1,
        }
    }
}

/// Collects daily usage for the scheduled tags into the history store
pub struct HistoryCollector<S, H>
where
    S: TagSource + ?Sized,
    H: HistoryStore + ?Sized,
{
    source: Arc<S>,
    store: Arc<H>,
    clock: Arc<dyn Clock>,
    schedule: TagSchedule,
    config: CollectorConfig,
    stats: Mutex<HashMap<StatsScope, CollectionCounters>>,
}

impl<S, H> HistoryCollector<S, H>
where
    S: TagSource + ?Sized,
    H: HistoryStore + ?Sized,
{
    pub fn new(
        source: Arc<S>,
        store: Arc<H>,
        clock: Arc<dyn Clock>,
        schedule: TagSchedule,
        config: CollectorConfig,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            schedule,
            config,
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn schedule(&self) -> &TagSchedule {
        &self.schedule
    }

    /// Today in the configured zone
    pub fn today(&self) -> Date {
        today_in(self.clock.now(), self.config.time_zone)
    }

    /// Counters accumulated for one scope
    pub fn stats(&self, scope: StatsScope) -> CollectionCounters {
        self.stats
            .lock()
            .ok()
            .and_then(|stats| stats.get(&scope).copied())
            .unwrap_or_default()
    }

    /// Collect every scheduled tag for `date` (default: today)
    pub async fn collect_all_hashtags(
        &self,
        date: Option<Date>,
    ) -> Result<CollectionSummary, TrackerError> {
        let date = date.unwrap_or_else(|| self.today());
        let summary = self.collect_day(date).await;

        self.record(
            StatsScope::SingleDay,
            Tally {
                collected: summary.collected,
                skipped: summary.skipped,
                errors: summary.errors,
            },
        );

        Ok(summary)
    }

    /// Collect every day from `start` to `end`, inclusive
    pub async fn collect_date_range(
        &self,
        start: Date,
        end: Date,
    ) -> Result<DateRangeSummary, TrackerError> {
        if start > end {
            return Err(TrackerError::Validation(format!(
                "start date {} is after end date {}",
                format_date(start),
                format_date(end)
            )));
        }

        let days = days_inclusive(start, end);
        tracing::info!(
            start = %format_date(start),
            end = %format_date(end),
            days = days.len(),
            "Collecting date range"
        );

        let mut daily_summaries = Vec::with_capacity(days.len());
        for (i, day) in days.iter().enumerate() {
            if i > 0 && !self.config.day_delay.is_zero() {
                sleep(self.config.day_delay).await;
            }
            daily_summaries.push(self.collect_day(*day).await);
        }

        let mut range = DateRangeSummary {
            start,
            end,
            total_days: days.len(),
            total_collected: 0,
            total_skipped: 0,
            total_errors: 0,
            daily_summaries,
        };
        for day in &range.daily_summaries {
            range.total_collected += day.collected;
            range.total_skipped += day.skipped;
            range.total_errors += day.errors;
        }

        self.record(
            StatsScope::DateRange,
            Tally {
                collected: range.total_collected,
                skipped: range.total_skipped,
                errors: range.total_errors,
            },
        );

        tracing::info!(
            collected = range.total_collected,
            skipped = range.total_skipped,
            errors = range.total_errors,
            "Date range collection complete"
        );

        Ok(range)
    }

    /// Collect a single tag for `date` (default: today)
    pub async fn collect_one(
        &self,
        tag: &str,
        date: Option<Date>,
    ) -> Result<CollectOutcome, TrackerError> {
        let tag = normalize_tag(tag)?;
        let date = date.unwrap_or_else(|| self.today());

        let outcome = self.collect_tag(&tag, date).await;

        let mut tally = Tally::default();
        tally.add(&outcome);
        self.record(StatsScope::SingleTag, tally);

        Ok(outcome)
    }

    async fn collect_day(&self, date: Date) -> CollectionSummary {
        let (tags, invalid) = self.schedule.all_tags();
        let batch_size = self.config.batch_size.max(1);

        tracing::info!(
            date = %format_date(date),
            hashtags = tags.len() + invalid.len(),
            batch_size,
            "Collecting hashtag history"
        );

        let mut tally = Tally::default();
        for error in &invalid {
            tracing::warn!(error = %error, "Skipping misconfigured hashtag");
            tally.errors += 1;
        }

        for (i, batch) in tags.chunks(batch_size).enumerate() {
            if i > 0 && !self.config.batch_delay.is_zero() {
                sleep(self.config.batch_delay).await;
            }

            let outcomes = join_all(batch.iter().map(|tag| self.collect_tag(tag, date))).await;
            for outcome in &outcomes {
                tally.add(outcome);
            }
        }

        let summary = CollectionSummary {
            date,
            total_hashtags: tags.len() + invalid.len(),
            collected: tally.collected,
            skipped: tally.skipped,
            errors: tally.errors,
        };

        tracing::info!(
            date = %format_date(date),
            collected = summary.collected,
            skipped = summary.skipped,
            errors = summary.errors,
            "Collection complete"
        );

        summary
    }

    /// Fetch, locate and persist one tag's sample. Never fails; failures are
    /// reported as [`CollectOutcome::Failed`].
    async fn collect_tag(&self, tag: &str, date: Date) -> CollectOutcome {
        let samples = match self.source.fetch_usage_history(tag).await {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "Failed to fetch usage history");
                return CollectOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        // Upstream buckets by UTC day regardless of our configured zone
        let Some(sample) = samples.iter().find(|s| s.utc_date() == date) else {
            tracing::warn!(tag = %tag, date = %format_date(date), "No usage sample for date");
            return CollectOutcome::Failed {
                error: format!("no usage sample for {}", format_date(date)),
            };
        };

        let usage = DailyUsage::from(sample);
        match self
            .store
            .save_daily(tag, date, usage, self.clock.now())
            .await
        {
            Ok(true) => {
                tracing::debug!(tag = %tag, date = %format_date(date), uses = usage.uses, "Saved");
                CollectOutcome::Collected(usage)
            }
            Ok(false) => CollectOutcome::Skipped {
                reason: "already stored".to_string(),
            },
            Err(e) => {
                tracing::error!(tag = %tag, error = %e, "Failed to save usage");
                CollectOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn record(&self, scope: StatsScope, tally: Tally) {
        let Ok(mut stats) = self.stats.lock() else {
            return;
        };
        let counters = stats.entry(scope).or_default();
        counters.runs += 1;
        counters.collected += tally.collected as u64;
        counters.skipped += tally.skipped as u64;
        counters.errors += tally.errors as u64;
        counters.last_run = Some(self.clock.now());
    }
}
