//! SQLite history store implementation

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use hashtag_tracker_domain::{
    DailyUsage, HistoryError, HistoryRecord, HistoryStore, WeeklyAggregate,
    calendar::{format_date, iso_week, parse_date, weekly_aggregate},
};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};

/// SQLite-backed history store
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

type HistoryRow = (String, String, i64, i64, i64, i64, String);

fn db_err(e: sqlx::Error) -> HistoryError {
    HistoryError::Database(e.to_string())
}

fn to_i64(value: u64) -> Result<i64, HistoryError> {
    i64::try_from(value)
        .map_err(|_| HistoryError::Serialization(format!("counter {} out of range", value)))
}

fn to_u64(value: i64) -> Result<u64, HistoryError> {
    u64::try_from(value)
        .map_err(|_| HistoryError::Serialization(format!("negative counter {}", value)))
}

impl SqliteHistoryStore {
    /// Open (creating if needed) a database file in write-ahead-log mode
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                HistoryError::Database(format!("Failed to create directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;

        tracing::debug!(path = %db_path.display(), "Opened history database");

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_err)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hashtag_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hashtag TEXT NOT NULL,
                date TEXT NOT NULL,
                year INTEGER NOT NULL,
                week_number INTEGER NOT NULL,
                uses INTEGER NOT NULL,
                accounts INTEGER NOT NULL,
                collected_at TEXT NOT NULL,
                UNIQUE(hashtag, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_history_hashtag_date ON hashtag_history(hashtag, date)",
            "CREATE INDEX IF NOT EXISTS idx_history_hashtag_week ON hashtag_history(hashtag, year, week_number)",
            "CREATE INDEX IF NOT EXISTS idx_history_date ON hashtag_history(date)",
            "CREATE INDEX IF NOT EXISTS idx_history_year ON hashtag_history(year)",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }

        Ok(())
    }

    fn record_from_row(row: HistoryRow) -> Result<HistoryRecord, HistoryError> {
        let (hashtag, date, year, week, uses, accounts, collected_at) = row;
        let date = parse_date(&date).map_err(|e| HistoryError::Serialization(e.to_string()))?;
        let collected_at = OffsetDateTime::parse(&collected_at, &Rfc3339)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;
        let year = i32::try_from(year)
            .map_err(|_| HistoryError::Serialization(format!("year {} out of range", year)))?;
        let iso_week = u8::try_from(week)
            .map_err(|_| HistoryError::Serialization(format!("week {} out of range", week)))?;

        Ok(HistoryRecord {
            hashtag,
            date,
            year,
            iso_week,
            uses: to_u64(uses)?,
            accounts: to_u64(accounts)?,
            collected_at,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn save_daily(
        &self,
        hashtag: &str,
        date: Date,
        usage: DailyUsage,
        collected_at: OffsetDateTime,
    ) -> Result<bool, HistoryError> {
        let week = iso_week(date);
        let collected_at = collected_at
            .format(&Rfc3339)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO hashtag_history
            (hashtag, date, year, week_number, uses, accounts, collected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(hashtag, date) DO NOTHING
            "#,
        )
        .bind(hashtag)
        .bind(format_date(date))
        .bind(week.year)
        .bind(i64::from(week.week))
        .bind(to_i64(usage.uses)?)
        .bind(to_i64(usage.accounts)?)
        .bind(&collected_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let inserted = result.rows_affected() == 1;
        tracing::debug!(hashtag = %hashtag, date = %format_date(date), inserted, "save_daily");
        Ok(inserted)
    }

    async fn get_daily(
        &self,
        hashtag: &str,
        date: Date,
    ) -> Result<Option<HistoryRecord>, HistoryError> {
        let row: Option<HistoryRow> = sqlx::query_as(
            r#"
            SELECT hashtag, date, year, week_number, uses, accounts, collected_at
            FROM hashtag_history
            WHERE hashtag = ? AND date = ?
            "#,
        )
        .bind(hashtag)
        .bind(format_date(date))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Self::record_from_row).transpose()
    }

    async fn daily_range(
        &self,
        hashtag: &str,
        start: Date,
        end: Date,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT hashtag, date, year, week_number, uses, accounts, collected_at
            FROM hashtag_history
            WHERE hashtag = ? AND date >= ? AND date <= ?
            ORDER BY date
            "#,
        )
        .bind(hashtag)
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Self::record_from_row).collect()
    }

    async fn weekly_history(
        &self,
        hashtag: &str,
        year: i32,
    ) -> Result<Vec<WeeklyAggregate>, HistoryError> {
        let rows: Vec<(i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT week_number, SUM(uses), SUM(accounts), COUNT(*)
            FROM hashtag_history
            WHERE hashtag = ? AND year = ?
            GROUP BY week_number
            ORDER BY week_number
            "#,
        )
        .bind(hashtag)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut weeks = Vec::with_capacity(rows.len());
        for (week, uses, accounts, days) in rows {
            let week = u8::try_from(week)
                .map_err(|_| HistoryError::Serialization(format!("week {} out of range", week)))?;
            let days = u32::try_from(days)
                .map_err(|_| HistoryError::Serialization(format!("day count {}", days)))?;
            match weekly_aggregate(hashtag, year, week, to_u64(uses)?, to_u64(accounts)?, days) {
                Some(aggregate) => weeks.push(aggregate),
                None => tracing::warn!(hashtag = %hashtag, year, week, "Skipping invalid ISO week"),
            }
        }

        Ok(weeks)
    }

    async fn delete_before(&self, cutoff: Date) -> Result<u64, HistoryError> {
        let result = sqlx::query("DELETE FROM hashtag_history WHERE date < ?")
            .bind(format_date(cutoff))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    async fn tracked_hashtags(&self) -> Result<Vec<String>, HistoryError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT hashtag FROM hashtag_history ORDER BY hashtag")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(rows.into_iter().map(|(tag,)| tag).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
