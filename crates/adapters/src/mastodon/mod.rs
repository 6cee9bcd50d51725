//! Mastodon API adapters

mod read;

pub use read::{MastodonClient, MastodonConfig, RequestSpacer};

use async_trait::async_trait;
use hashtag_tracker_domain::{FetchError, Post, TagSource, TagUsageSample, TrendingTag};

/// Stub tag source serving canned data
#[derive(Debug, Clone, Default)]
pub struct StubTagSource {
    posts: Vec<Post>,
    history: Vec<TagUsageSample>,
    trending: Vec<TrendingTag>,
}

impl StubTagSource {
    /// Create an empty stub
    pub fn empty() -> Self {
        Self::default()
    }

    /// Timeline served newest first, paged by `max_id`
    pub fn with_posts(mut self, posts: Vec<Post>) -> Self {
        self.posts = posts;
        self
    }

    pub fn with_history(mut self, history: Vec<TagUsageSample>) -> Self {
        self.history = history;
        self
    }

    pub fn with_trending(mut self, trending: Vec<TrendingTag>) -> Self {
        self.trending = trending;
        self
    }
}

#[async_trait]
impl TagSource for StubTagSource {
    async fn fetch_page(
        &self,
        _tag: &str,
        max_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Post>, FetchError> {
        let start = match max_id {
            Some(id) => self
                .posts
                .iter()
                .position(|p| p.id == id)
                .map_or(self.posts.len(), |i| i + 1),
            None => 0,
        };
        Ok(self.posts.iter().skip(start).take(limit).cloned().collect())
    }

    async fn fetch_usage_history(&self, _tag: &str) -> Result<Vec<TagUsageSample>, FetchError> {
        Ok(self.history.clone())
    }

    async fn fetch_trending(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TrendingTag>, FetchError> {
        Ok(self
            .trending
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
