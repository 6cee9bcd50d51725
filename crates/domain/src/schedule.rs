//! Tag names and the weekday -> tags schedule

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Weekday;

use crate::error::TrackerError;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}_]+$").expect("valid tag regex"));

/// Strip a leading `#`, lowercase and validate a tag name
pub fn normalize_tag(raw: &str) -> Result<String, TrackerError> {
    let tag = raw.trim().trim_start_matches('#').to_lowercase();
    if tag.is_empty() || !TAG_PATTERN.is_match(&tag) {
        return Err(TrackerError::Validation(format!(
            "invalid hashtag '{}': use letters, digits and underscores",
            raw
        )));
    }
    Ok(tag)
}

/// Tags to follow on each day of the week
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSchedule {
    #[serde(default)]
    pub monday: Vec<String>,
    #[serde(default)]
    pub tuesday: Vec<String>,
    #[serde(default)]
    pub wednesday: Vec<String>,
    #[serde(default)]
    pub thursday: Vec<String>,
    #[serde(default)]
    pub friday: Vec<String>,
    #[serde(default)]
    pub saturday: Vec<String>,
    #[serde(default)]
    pub sunday: Vec<String>,
}

impl TagSchedule {
    /// Raw configured tags for a weekday
    pub fn tags_for(&self, weekday: Weekday) -> &[String] {
        match weekday {
            Weekday::Monday => &self.monday,
            Weekday::Tuesday => &self.tuesday,
            Weekday::Wednesday => &self.wednesday,
            Weekday::Thursday => &self.thursday,
            Weekday::Friday => &self.friday,
            Weekday::Saturday => &self.saturday,
            Weekday::Sunday => &self.sunday,
        }
    }

    /// Normalized tags for a weekday; a day without tags is a business error
    pub fn tags_on(&self, weekday: Weekday) -> Result<Vec<String>, TrackerError> {
        let tags = self
            .tags_for(weekday)
            .iter()
            .map(|t| normalize_tag(t))
            .collect::<Result<Vec<_>, _>>()?;
        if tags.is_empty() {
            return Err(TrackerError::Business(format!(
                "no hashtag configured for {}",
                weekday
            )));
        }
        Ok(tags)
    }

    /// Every distinct tag across the week, in first-seen order Monday to Sunday.
    /// Entries that fail normalisation come back separately, one error each.
    pub fn all_tags(&self) -> (Vec<String>, Vec<TrackerError>) {
        let mut seen = Vec::new();
        let mut invalid = Vec::new();
        let mut weekday = Weekday::Monday;
        for _ in 0..7 {
            for raw in self.tags_for(weekday) {
                match normalize_tag(raw) {
                    Ok(tag) if !seen.contains(&tag) => seen.push(tag),
                    Ok(_) => {}
                    Err(e) => invalid.push(e),
                }
            }
            weekday = weekday.next();
        }
        (seen, invalid)
    }
}
