//! Calendar helpers: ISO weeks, date parsing, time zones and weekly roll-ups

use std::collections::BTreeMap;

use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, UtcOffset, Weekday};

use crate::error::TrackerError;
use crate::model::{HistoryRecord, WeeklyAggregate, YearlySummary};

/// ISO-8601 week-year and week number of a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u8,
}

/// Compute the ISO week of `date`.
///
/// Weeks start on Monday and week 1 holds the year's first Thursday, so the
/// week-year can differ from `date.year()` in late December and early January.
pub fn iso_week(date: Date) -> IsoWeek {
    let (year, week, _) = date.to_iso_week_date();
    IsoWeek { year, week }
}

/// Monday and Sunday of an ISO week
pub fn week_bounds(year: i32, week: u8) -> Option<(Date, Date)> {
    let start = Date::from_iso_week_date(year, week, Weekday::Monday).ok()?;
    let end = Date::from_iso_week_date(year, week, Weekday::Sunday).ok()?;
    Some((start, end))
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(raw: &str) -> Result<Date, TrackerError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| TrackerError::Validation(format!("invalid date '{}': {}", raw, e)))
}

/// Format a date as `YYYY-MM-DD`
pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

/// Parse a fixed UTC offset such as `+02:00`, `-05:30`, `UTC` or `Z`
pub fn parse_offset(raw: &str) -> Result<UtcOffset, TrackerError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return Ok(UtcOffset::UTC);
    }

    UtcOffset::parse(
        trimmed,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|e| TrackerError::Validation(format!("invalid time zone '{}': {}", raw, e)))
}

/// Calendar day of `now` in the given offset
pub fn today_in(now: OffsetDateTime, offset: UtcOffset) -> Date {
    now.to_offset(offset).date()
}

/// Start of `date` in the given offset
pub fn start_of_day(date: Date, offset: UtcOffset) -> OffsetDateTime {
    date.midnight().assume_offset(offset)
}

/// First date kept when retaining `days_to_keep` days up to `today`
pub fn retention_cutoff(today: Date, days_to_keep: u32) -> Date {
    today
        .checked_sub(Duration::days(i64::from(days_to_keep)))
        .unwrap_or(Date::MIN)
}

/// Every date from `start` to `end`, inclusive
pub fn days_inclusive(start: Date, end: Date) -> Vec<Date> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        match current.next_day() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Build one weekly aggregate from summed counters
pub fn weekly_aggregate(
    hashtag: &str,
    year: i32,
    week: u8,
    total_uses: u64,
    total_accounts: u64,
    days_counted: u32,
) -> Option<WeeklyAggregate> {
    let (week_start, week_end) = week_bounds(year, week)?;
    let daily_average = if days_counted == 0 {
        0.0
    } else {
        round1(total_uses as f64 / f64::from(days_counted))
    };

    Some(WeeklyAggregate {
        hashtag: hashtag.to_string(),
        year,
        week_number: week,
        week_start,
        week_end,
        total_uses,
        total_accounts,
        daily_average,
        days_counted,
    })
}

/// Group daily rows of one ISO week-year into weekly aggregates, by week
pub fn aggregate_weeks(hashtag: &str, year: i32, records: &[HistoryRecord]) -> Vec<WeeklyAggregate> {
    let mut weeks: BTreeMap<u8, (u64, u64, u32)> = BTreeMap::new();

    for record in records
        .iter()
        .filter(|r| r.hashtag == hashtag && r.year == year)
    {
        let entry = weeks.entry(record.iso_week).or_default();
        entry.0 += record.uses;
        entry.1 += record.accounts;
        entry.2 += 1;
    }

    weeks
        .into_iter()
        .filter_map(|(week, (uses, accounts, days))| {
            weekly_aggregate(hashtag, year, week, uses, accounts, days)
        })
        .collect()
}

/// Roll weekly aggregates up to a year summary.
///
/// The peak week is the first week whose total is strictly greater than every
/// earlier one, so ties go to the lowest week number.
pub fn summarize_year(hashtag: &str, year: i32, weeks: Vec<WeeklyAggregate>) -> YearlySummary {
    let total_uses: u64 = weeks.iter().map(|w| w.total_uses).sum();
    let total_accounts: u64 = weeks.iter().map(|w| w.total_accounts).sum();
    let average_weekly = if weeks.is_empty() {
        0.0
    } else {
        round1(total_uses as f64 / weeks.len() as f64)
    };

    let peak_week = weeks
        .iter()
        .fold(None::<&WeeklyAggregate>, |peak, week| match peak {
            Some(current) if week.total_uses <= current.total_uses => Some(current),
            _ => Some(week),
        })
        .cloned();

    YearlySummary {
        hashtag: hashtag.to_string(),
        year,
        total_uses,
        total_accounts,
        average_weekly,
        peak_week,
        weeks,
    }
}
