//! In-memory history store for testing and offline mode

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use hashtag_tracker_domain::{
    DailyUsage, HistoryError, HistoryRecord, HistoryStore, WeeklyAggregate,
    calendar::{aggregate_weeks, iso_week},
};
use time::{Date, OffsetDateTime};

/// In-memory history store implementation
pub struct InMemoryHistoryStore {
    rows: RwLock<BTreeMap<(String, Date), HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_err(e: impl std::fmt::Display) -> HistoryError {
    HistoryError::Database(e.to_string())
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save_daily(
        &self,
        hashtag: &str,
        date: Date,
        usage: DailyUsage,
        collected_at: OffsetDateTime,
    ) -> Result<bool, HistoryError> {
        let mut rows = self.rows.write().map_err(lock_err)?;
        let key = (hashtag.to_string(), date);
        if rows.contains_key(&key) {
            return Ok(false);
        }

        let week = iso_week(date);
        rows.insert(
            key,
            HistoryRecord {
                hashtag: hashtag.to_string(),
                date,
                year: week.year,
                iso_week: week.week,
                uses: usage.uses,
                accounts: usage.accounts,
                collected_at,
            },
        );
        Ok(true)
    }

    async fn get_daily(
        &self,
        hashtag: &str,
        date: Date,
    ) -> Result<Option<HistoryRecord>, HistoryError> {
        let rows = self.rows.read().map_err(lock_err)?;
        Ok(rows.get(&(hashtag.to_string(), date)).cloned())
    }

    async fn daily_range(
        &self,
        hashtag: &str,
        start: Date,
        end: Date,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let rows = self.rows.read().map_err(lock_err)?;
        Ok(rows
            .range((hashtag.to_string(), start)..=(hashtag.to_string(), end))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn weekly_history(
        &self,
        hashtag: &str,
        year: i32,
    ) -> Result<Vec<WeeklyAggregate>, HistoryError> {
        let rows = self.rows.read().map_err(lock_err)?;
        let records: Vec<HistoryRecord> = rows
            .values()
            .filter(|r| r.hashtag == hashtag && r.year == year)
            .cloned()
            .collect();
        Ok(aggregate_weeks(hashtag, year, &records))
    }

    async fn delete_before(&self, cutoff: Date) -> Result<u64, HistoryError> {
        let mut rows = self.rows.write().map_err(lock_err)?;
        let before = rows.len();
        rows.retain(|(_, date), _| *date >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn tracked_hashtags(&self) -> Result<Vec<String>, HistoryError> {
        let rows = self.rows.read().map_err(lock_err)?;
        let mut tags: Vec<String> = rows.keys().map(|(tag, _)| tag.clone()).collect();
        tags.dedup();
        Ok(tags)
    }

    async fn close(&self) {}
}
