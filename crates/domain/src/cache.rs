//! Time-boxed memoization in front of the remote API
//!
//! Entries expire lazily: a read past the TTL removes the entry and reports a
//! miss. Nothing sweeps in the background and there is no size cap.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::Date;
use tokio::time::Instant;

use crate::model::{AnalysisResult, Post, Timeframe, TrendingTag};

/// TTLs for each keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub posts_ttl: Duration,
    pub analysis_ttl: Duration,
    pub trending_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            posts_ttl: Duration::from_secs(300),
            analysis_ttl: Duration::from_secs(600),
            trending_ttl: Duration::from_secs(900),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Single-TTL map with lazy expiry
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Fresh value for `key`, evicting it if expired
    pub fn get(&mut self, key: &K) -> Option<V> {
        let fresh = self
            .entries
            .get(key)
            .map(|entry| entry.inserted_at.elapsed() < self.ttl)?;
        if !fresh {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Entries held, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Key for raw fetched posts: one entry per tag per calendar day
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostsKey {
    pub tag: String,
    pub date: Date,
}

/// Key for full analysis results
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalysisKey {
    pub tag: String,
    pub max_pages: usize,
    pub timeframe: Timeframe,
}

/// The three caches used by the analysis entry points
#[derive(Debug)]
pub struct AnalysisCache {
    posts: Mutex<TtlCache<PostsKey, Arc<Vec<Post>>>>,
    analyses: Mutex<TtlCache<AnalysisKey, AnalysisResult>>,
    trending: Mutex<TtlCache<(), Arc<Vec<TrendingTag>>>>,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl AnalysisCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            posts: Mutex::new(TtlCache::new(config.posts_ttl)),
            analyses: Mutex::new(TtlCache::new(config.analysis_ttl)),
            trending: Mutex::new(TtlCache::new(config.trending_ttl)),
        }
    }

    pub fn posts(&self, key: &PostsKey) -> Option<Arc<Vec<Post>>> {
        self.posts.lock().ok()?.get(key)
    }

    pub fn put_posts(&self, key: PostsKey, posts: Arc<Vec<Post>>) {
        if let Ok(mut cache) = self.posts.lock() {
            cache.insert(key, posts);
        }
    }

    pub fn analysis(&self, key: &AnalysisKey) -> Option<AnalysisResult> {
        self.analyses.lock().ok()?.get(key)
    }

    pub fn put_analysis(&self, key: AnalysisKey, result: AnalysisResult) {
        if let Ok(mut cache) = self.analyses.lock() {
            cache.insert(key, result);
        }
    }

    /// The full trending list as last fetched
    pub fn trending(&self) -> Option<Arc<Vec<TrendingTag>>> {
        self.trending.lock().ok()?.get(&())
    }

    pub fn put_trending(&self, tags: Arc<Vec<TrendingTag>>) {
        if let Ok(mut cache) = self.trending.lock() {
            cache.insert((), tags);
        }
    }

    /// Drop every entry in every keyspace
    pub fn clear(&self) {
        if let Ok(mut cache) = self.posts.lock() {
            cache.clear();
        }
        if let Ok(mut cache) = self.analyses.lock() {
            cache.clear();
        }
        if let Ok(mut cache) = self.trending.lock() {
            cache.clear();
        }
    }
}
