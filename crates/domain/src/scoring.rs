//! Engagement-weighted relevance scoring

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::calendar::round1;
use crate::error::{DataProcessingError, ProcessingStep};
use crate::model::{Author, Post};

/// Allowed distance of the weight sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Weights as supplied by configuration; missing dimensions become 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialWeights {
    pub favorites: Option<f64>,
    pub boosts: Option<f64>,
    pub followers: Option<f64>,
}

/// Validated weights, each in `[0, 1]` and summing to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RelevanceWeights {
    favorites: f64,
    boosts: f64,
    followers: f64,
}

impl RelevanceWeights {
    pub fn favorites(&self) -> f64 {
        self.favorites
    }

    pub fn boosts(&self) -> f64 {
        self.boosts
    }

    pub fn followers(&self) -> f64 {
        self.followers
    }

    pub fn sum(&self) -> f64 {
        self.favorites + self.boosts + self.followers
    }
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            favorites: 0.4,
            boosts: 0.3,
            followers: 0.3,
        }
    }
}

impl TryFrom<PartialWeights> for RelevanceWeights {
    type Error = DataProcessingError;

    fn try_from(candidate: PartialWeights) -> Result<Self, Self::Error> {
        let favorites = weight_or_default("favorites", candidate.favorites)?;
        let boosts = weight_or_default("boosts", candidate.boosts)?;
        let followers = weight_or_default("followers", candidate.followers)?;

        let weights = Self {
            favorites,
            boosts,
            followers,
        };

        let sum = weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(DataProcessingError::new(
                ProcessingStep::Weights,
                format!("weights must sum to 1.0, got {:.3}", sum),
            ));
        }

        Ok(weights)
    }
}

fn weight_or_default(name: &str, value: Option<f64>) -> Result<f64, DataProcessingError> {
    match value {
        None => {
            tracing::warn!(dimension = name, "Missing relevance weight, defaulting to 0");
            Ok(0.0)
        }
        Some(v) if v.is_finite() && (0.0..=1.0).contains(&v) => Ok(v),
        Some(v) => Err(DataProcessingError::new(
            ProcessingStep::Weights,
            format!("weight '{}' must be a number in [0, 1], got {}", name, v),
        )),
    }
}

/// Engagement counters a score is computed from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementMetrics {
    pub favorites: i64,
    pub boosts: i64,
    pub followers: i64,
}

impl EngagementMetrics {
    pub fn from_post(post: &Post) -> Self {
        Self {
            favorites: post.favourites_count,
            boosts: post.reblogs_count,
            followers: post.author.as_ref().map_or(0, |a| a.followers_count),
        }
    }
}

/// Running statistics for the current weight regime
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoringStats {
    pub scored: u64,
    pub anomalies: u64,
    pub total_score: f64,
    pub max_score: f64,
}

impl ScoringStats {
    pub fn average(&self) -> f64 {
        if self.scored == 0 {
            0.0
        } else {
            round1(self.total_score / self.scored as f64)
        }
    }
}

/// Scores posts by log-dampened, weighted engagement
#[derive(Debug)]
pub struct RelevanceScorer {
    weights: RelevanceWeights,
    stats: Mutex<ScoringStats>,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::with_weights(RelevanceWeights::default())
    }
}

impl RelevanceScorer {
    /// Build a scorer from configuration, validating the weights
    pub fn new(weights: PartialWeights) -> Result<Self, DataProcessingError> {
        Ok(Self::with_weights(RelevanceWeights::try_from(weights)?))
    }

    pub fn with_weights(weights: RelevanceWeights) -> Self {
        Self {
            weights,
            stats: Mutex::new(ScoringStats::default()),
        }
    }

    pub fn weights(&self) -> RelevanceWeights {
        self.weights
    }

    /// Replace the weights.
    ///
    /// The candidate is validated in full first; on failure the active weights
    /// stay as they were. On success the running statistics are reset.
    pub fn update_weights(&mut self, candidate: PartialWeights) -> Result<(), DataProcessingError> {
        let weights = RelevanceWeights::try_from(candidate)?;
        self.weights = weights;
        if let Ok(mut stats) = self.stats.lock() {
            *stats = ScoringStats::default();
        }
        tracing::info!(weights = ?self.weights, "Relevance weights updated");
        Ok(())
    }

    pub fn stats(&self) -> ScoringStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    /// Score a post, rounded to one decimal place
    pub fn score(&self, post: &Post) -> Result<f64, DataProcessingError> {
        let metrics = EngagementMetrics::from_post(post);
        if metrics.favorites < 0 || metrics.boosts < 0 || metrics.followers < 0 {
            return Err(DataProcessingError::new(
                ProcessingStep::Scoring,
                format!("post {} has negative engagement counts", post.id),
            ));
        }

        let score = self.score_metrics(metrics);
        if !score.is_finite() {
            tracing::warn!(post_id = %post.id, metrics = ?metrics, "Non-finite relevance score");
            self.record(None);
            return Ok(0.0);
        }

        self.record(Some(score));
        Ok(score)
    }

    /// Weighted sum of `log10(max(1, metric))`, rounded to one decimal
    pub fn score_metrics(&self, metrics: EngagementMetrics) -> f64 {
        let raw = self.weights.favorites * dampen(metrics.favorites)
            + self.weights.boosts * dampen(metrics.boosts)
            + self.weights.followers * dampen(metrics.followers);
        round1(raw)
    }

    fn record(&self, score: Option<f64>) {
        let Ok(mut stats) = self.stats.lock() else {
            return;
        };
        match score {
            Some(score) => {
                stats.scored += 1;
                stats.total_score += score;
                stats.max_score = stats.max_score.max(score);
            }
            None => stats.anomalies += 1,
        }
    }
}

fn dampen(metric: i64) -> f64 {
    (metric.max(1) as f64).log10()
}

/// Whole days since the author's account was created.
///
/// Not weighted yet. Unparsable or missing timestamps yield 0.
pub fn account_age_days(author: &Author, now: OffsetDateTime) -> i64 {
    author
        .created_at
        .as_deref()
        .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
        .map(|created| (now - created).whole_days().max(0))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn post(favorites: i64, boosts: i64, followers: i64) -> Post {
        Post {
            id: "1".to_string(),
            created_at: Some(datetime!(2024-01-15 12:00 UTC)),
            content: Some("hello".to_string()),
            url: None,
            author: Some(Author {
                id: "a1".to_string(),
                username: "alice".to_string(),
                followers_count: followers,
                created_at: None,
            }),
            favourites_count: favorites,
            reblogs_count: boosts,
            replies_count: 0,
            relevance_score: None,
        }
    }

    #[test]
    fn test_default_weights_score() {
        let scorer = RelevanceScorer::default();
        assert_eq!(scorer.score(&post(10, 5, 100)).unwrap(), 1.2);
    }

    #[test]
    fn test_zero_engagement_scores_zero() {
        let scorer = RelevanceScorer::default();
        assert_eq!(scorer.score(&post(0, 0, 0)).unwrap(), 0.0);
        assert_eq!(scorer.score(&post(1, 1, 1)).unwrap(), 0.0);
    }

    #[test]
    fn test_score_is_monotonic_per_metric() {
        let scorer = RelevanceScorer::default();
        let mut last = 0.0;
        for favorites in [0, 1, 9, 10, 99, 1_000, 1_000_000] {
            let score = scorer.score(&post(favorites, 5, 100)).unwrap();
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn test_missing_author_counts_as_zero_followers() {
        let scorer = RelevanceScorer::default();
        let mut p = post(10, 10, 0);
        p.author = None;
        assert_eq!(scorer.score(&p).unwrap(), 0.7);
    }

    #[test]
    fn test_negative_counts_fail_scoring() {
        let scorer = RelevanceScorer::default();
        let err = scorer.score(&post(-1, 0, 0)).unwrap_err();
        assert_eq!(err.step, ProcessingStep::Scoring);
    }

    #[test]
    fn test_missing_dimension_defaults_to_zero() {
        let scorer = RelevanceScorer::new(PartialWeights {
            favorites: Some(0.5),
            boosts: Some(0.5),
            followers: None,
        })
        .unwrap();

        let weights = scorer.weights();
        assert_eq!(weights.followers(), 0.0);
        assert!((weights.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_missing_dimension_that_breaks_sum_is_rejected() {
        let err = RelevanceScorer::new(PartialWeights {
            favorites: Some(0.4),
            boosts: Some(0.3),
            followers: None,
        })
        .unwrap_err();
        assert_eq!(err.step, ProcessingStep::Weights);
    }

    #[test]
    fn test_out_of_range_weight_is_rejected() {
        for bad in [1.5, -0.1, f64::NAN, f64::INFINITY] {
            let result = RelevanceScorer::new(PartialWeights {
                favorites: Some(bad),
                boosts: Some(0.5),
                followers: Some(0.5),
            });
            assert!(result.is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_sum_within_tolerance_is_accepted() {
        assert!(
            RelevanceScorer::new(PartialWeights {
                favorites: Some(0.335),
                boosts: Some(0.335),
                followers: Some(0.335),
            })
            .is_ok()
        );
    }

    #[test]
    fn test_failed_update_keeps_previous_weights() {
        let mut scorer = RelevanceScorer::default();
        let before = scorer.weights();

        let result = scorer.update_weights(PartialWeights {
            favorites: Some(0.9),
            boosts: Some(0.9),
            followers: Some(0.9),
        });

        assert!(result.is_err());
        assert_eq!(scorer.weights(), before);
    }

    #[test]
    fn test_update_resets_stats() {
        let mut scorer = RelevanceScorer::default();
        scorer.score(&post(10, 5, 100)).unwrap();
        assert_eq!(scorer.stats().scored, 1);

        scorer
            .update_weights(PartialWeights {
                favorites: Some(1.0),
                boosts: Some(0.0),
                followers: Some(0.0),
            })
            .unwrap();

        assert_eq!(scorer.stats(), ScoringStats::default());
        assert_eq!(scorer.score(&post(100, 5, 100)).unwrap(), 2.0);
    }

    #[test]
    fn test_account_age_days() {
        let now = datetime!(2024-01-11 00:00 UTC);
        let mut author = post(0, 0, 0).author.unwrap();
        assert_eq!(account_age_days(&author, now), 0);

        author.created_at = Some("2024-01-01T00:00:00.000Z".to_string());
        assert_eq!(account_age_days(&author, now), 10);

        author.created_at = Some("not a date".to_string());
        assert_eq!(account_age_days(&author, now), 0);
    }
}
