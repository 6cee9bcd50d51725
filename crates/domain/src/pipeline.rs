//! Post processing pipeline: validate, filter, score, sort, window, truncate

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::calendar::start_of_day;
use crate::model::{Post, Timeframe};
use crate::ports::Clock;
use crate::scoring::RelevanceScorer;

/// Options for a single pipeline run
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Keep only posts created on this calendar date (takes precedence over
    /// `timeframe`)
    pub filter_by_date: Option<Date>,
    pub timeframe: Option<Timeframe>,
    pub limit: Option<usize>,
    /// Overrides the pipeline's configured time zone
    pub time_zone: Option<UtcOffset>,
}

/// Counts of posts removed by each step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub input: usize,
    pub invalid: usize,
    pub ignored: usize,
    pub scoring_errors: usize,
    pub outside_window: usize,
    pub truncated: usize,
    pub output: usize,
}

/// Pipeline result
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub posts: Vec<Post>,
    pub stats: PipelineStats,
}

/// Configuration for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Usernames whose posts are dropped (exact match)
    pub ignored_accounts: Vec<String>,
    /// Zone used for calendar-day filtering
    pub time_zone: UtcOffset,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ignored_accounts: vec![],
            time_zone: UtcOffset::UTC,
        }
    }
}

/// Validates, scores and orders a batch of posts
pub struct DataProcessingPipeline {
    scorer: RelevanceScorer,
    ignored_accounts: HashSet<String>,
    time_zone: UtcOffset,
    clock: Arc<dyn Clock>,
}

impl DataProcessingPipeline {
    pub fn new(scorer: RelevanceScorer, config: PipelineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            scorer,
            ignored_accounts: config.ignored_accounts.into_iter().collect(),
            time_zone: config.time_zone,
            clock,
        }
    }

    pub fn scorer(&self) -> &RelevanceScorer {
        &self.scorer
    }

    pub fn time_zone(&self) -> UtcOffset {
        self.time_zone
    }

    /// Run every step over a copy of `posts`
    pub fn process(&self, posts: &[Post], options: &ProcessOptions) -> ProcessOutput {
        let mut stats = PipelineStats {
            input: posts.len(),
            ..Default::default()
        };

        let (posts, removed) = self.validate(posts.to_vec());
        stats.invalid = removed;

        let (posts, removed) = self.filter_ignored(posts);
        stats.ignored = removed;

        let (mut posts, removed) = self.score(posts);
        stats.scoring_errors = removed;

        sort_by_relevance(&mut posts);

        let time_zone = options.time_zone.unwrap_or(self.time_zone);
        let (posts, removed) = match (options.filter_by_date, options.timeframe) {
            (Some(date), _) => filter_by_date(posts, date, time_zone),
            (None, Some(timeframe)) => {
                filter_by_timeframe(posts, timeframe, self.clock.now(), time_zone)
            }
            (None, None) => (posts, 0),
        };
        stats.outside_window = removed;

        let (posts, removed) = truncate(posts, options.limit);
        stats.truncated = removed;
        stats.output = posts.len();

        tracing::debug!(stats = ?stats, "Pipeline finished");

        ProcessOutput { posts, stats }
    }

    /// Drop posts with missing identity, content or author, or bad counters
    pub fn validate(&self, posts: Vec<Post>) -> (Vec<Post>, usize) {
        retain_counting(posts, |post| match validate_post(post) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(post_id = %post.id, reason = %reason, "Dropping invalid post");
                false
            }
        })
    }

    /// Drop posts by ignored accounts
    pub fn filter_ignored(&self, posts: Vec<Post>) -> (Vec<Post>, usize) {
        retain_counting(posts, |post| {
            post.author
                .as_ref()
                .is_none_or(|a| !self.ignored_accounts.contains(&a.username))
        })
    }

    /// Attach relevance scores, dropping posts the scorer rejects
    pub fn score(&self, posts: Vec<Post>) -> (Vec<Post>, usize) {
        let mut errors = 0;
        let scored = posts
            .into_iter()
            .filter_map(|mut post| match self.scorer.score(&post) {
                Ok(score) => {
                    post.relevance_score = Some(score);
                    Some(post)
                }
                Err(e) => {
                    tracing::warn!(post_id = %post.id, error = %e, "Failed to score post");
                    errors += 1;
                    None
                }
            })
            .collect();
        (scored, errors)
    }
}

/// Structural checks for a single post
pub fn validate_post(post: &Post) -> Result<(), String> {
    if post.id.trim().is_empty() {
        return Err("missing id".to_string());
    }
    if post.created_at.is_none() {
        return Err("missing or unparsable created_at".to_string());
    }
    if post.content.is_none() {
        return Err("missing content".to_string());
    }
    let Some(author) = &post.author else {
        return Err("missing author".to_string());
    };
    if author.id.trim().is_empty() || author.username.trim().is_empty() {
        return Err("malformed author".to_string());
    }
    if author.followers_count < 0 {
        return Err("negative follower count".to_string());
    }
    if post.favourites_count < 0 || post.reblogs_count < 0 || post.replies_count < 0 {
        return Err("negative engagement count".to_string());
    }
    Ok(())
}

/// Stable sort, highest score first; unscored posts count as 0
pub fn sort_by_relevance(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        let a = a.relevance_score.unwrap_or(0.0);
        let b = b.relevance_score.unwrap_or(0.0);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Keep posts created on `date` in the given zone
pub fn filter_by_date(posts: Vec<Post>, date: Date, time_zone: UtcOffset) -> (Vec<Post>, usize) {
    retain_counting(posts, |post| {
        post.created_at
            .is_some_and(|created| created.to_offset(time_zone).date() == date)
    })
}

/// Earliest creation time a timeframe keeps, `None` for no bound
pub fn timeframe_cutoff(
    timeframe: Timeframe,
    now: OffsetDateTime,
    time_zone: UtcOffset,
) -> Option<OffsetDateTime> {
    match timeframe {
        Timeframe::Today => Some(start_of_day(now.to_offset(time_zone).date(), time_zone)),
        Timeframe::Week => Some(now - Duration::days(7)),
        Timeframe::Month => Some(now - Duration::days(30)),
        Timeframe::All => None,
    }
}

/// Keep posts created on or after the timeframe's cutoff
pub fn filter_by_timeframe(
    posts: Vec<Post>,
    timeframe: Timeframe,
    now: OffsetDateTime,
    time_zone: UtcOffset,
) -> (Vec<Post>, usize) {
    let Some(cutoff) = timeframe_cutoff(timeframe, now, time_zone) else {
        return (posts, 0);
    };
    retain_counting(posts, |post| post.created_at.is_some_and(|c| c >= cutoff))
}

/// Keep the first `limit` posts
pub fn truncate(mut posts: Vec<Post>, limit: Option<usize>) -> (Vec<Post>, usize) {
    let Some(limit) = limit else {
        return (posts, 0);
    };
    let removed = posts.len().saturating_sub(limit);
    posts.truncate(limit);
    (posts, removed)
}

fn retain_counting(posts: Vec<Post>, mut keep: impl FnMut(&Post) -> bool) -> (Vec<Post>, usize) {
    let before = posts.len();
    let kept: Vec<Post> = posts.into_iter().filter(|p| keep(p)).collect();
    let removed = before - kept.len();
    (kept, removed)
}
