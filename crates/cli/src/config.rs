//! Configuration loading and management

use anyhow::{Context, Result};
use hashtag_tracker_domain::{
    cache::CacheConfig,
    calendar::parse_offset,
    pipeline::PipelineConfig,
    schedule::TagSchedule,
    scoring::{PartialWeights, RelevanceScorer},
    usecases::CollectorConfig,
};
use hashtag_tracker_adapters::mastodon::MastodonConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::UtcOffset;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub mastodon: MastodonSection,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub collector: CollectorSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub schedule: TagSchedule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Fixed UTC offset, e.g. "+02:00" or "UTC"
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonSection {
    #[serde(default = "default_instance_url")]
    pub instance_url: String,

    /// Environment variable holding an optional access token
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

/// Relevance weights; leaving all three out keeps the defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub favorites: Option<f64>,

    #[serde(default)]
    pub boosts: Option<f64>,

    #[serde(default)]
    pub followers: Option<f64>,

    #[serde(default)]
    pub ignored_accounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_day_delay_ms")]
    pub day_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_posts_ttl")]
    pub posts_ttl_secs: u64,

    #[serde(default = "default_analysis_ttl")]
    pub analysis_ttl_secs: u64,

    #[serde(default = "default_trending_ttl")]
    pub trending_ttl_secs: u64,
}

// Default value functions
fn default_db_path() -> PathBuf {
    PathBuf::from("./hashtag_history.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_instance_url() -> String {
    "https://mastodon.social".to_string()
}

fn default_access_token_env() -> String {
    "MASTODON_ACCESS_TOKEN".to_string()
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30
}

fn default_max_pages() -> usize {
    5
}

fn default_batch_size() -> usize {
    3
}

fn default_batch_delay_ms() -> u64 {
    2000
}

fn default_day_delay_ms() -> u64 {
    5000
}

fn default_posts_ttl() -> u64 {
    300
}

fn default_analysis_ttl() -> u64 {
    600
}

fn default_trending_ttl() -> u64 {
    900
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            timezone: default_timezone(),
        }
    }
}

impl Default for MastodonSection {
    fn default() -> Self {
        Self {
            instance_url: default_instance_url(),
            access_token_env: default_access_token_env(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            day_delay_ms: default_day_delay_ms(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            posts_ttl_secs: default_posts_ttl(),
            analysis_ttl_secs: default_analysis_ttl(),
            trending_ttl_secs: default_trending_ttl(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HASHTAG_TRACKER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn time_zone(&self) -> Result<UtcOffset> {
        Ok(parse_offset(&self.general.timezone)?)
    }

    pub fn scorer(&self) -> Result<RelevanceScorer> {
        let scoring = &self.scoring;
        if scoring.favorites.is_none() && scoring.boosts.is_none() && scoring.followers.is_none()
        {
            return Ok(RelevanceScorer::default());
        }
        RelevanceScorer::new(PartialWeights {
            favorites: scoring.favorites,
            boosts: scoring.boosts,
            followers: scoring.followers,
        })
        .context("Invalid [scoring] weights")
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            ignored_accounts: self.scoring.ignored_accounts.clone(),
            time_zone: self.time_zone()?,
        })
    }

    pub fn collector_config(&self) -> Result<CollectorConfig> {
        if self.collector.batch_size == 0 {
            anyhow::bail!("[collector] batch_size must be at least 1");
        }
        Ok(CollectorConfig {
            batch_size: self.collector.batch_size,
            batch_delay: Duration::from_millis(self.collector.batch_delay_ms),
            day_delay: Duration::from_millis(self.collector.day_delay_ms),
            time_zone: self.time_zone()?,
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            posts_ttl: Duration::from_secs(self.cache.posts_ttl_secs),
            analysis_ttl: Duration::from_secs(self.cache.analysis_ttl_secs),
            trending_ttl: Duration::from_secs(self.cache.trending_ttl_secs),
        }
    }

    /// Client settings; the token is read from the configured variable if set
    pub fn mastodon_config(&self) -> MastodonConfig {
        let access_token = std::env::var(&self.mastodon.access_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from);

        MastodonConfig {
            instance_url: self.mastodon.instance_url.clone(),
            access_token,
            request_delay: Duration::from_millis(self.mastodon.request_delay_ms),
            timeout: Duration::from_secs(self.mastodon.timeout_secs),
        }
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# hashtag-tracker configuration

[general]
db_path = "./hashtag_history.sqlite"
log_level = "info"
# Fixed UTC offset used for "today" and calendar-day filters: "UTC", "+02:00", "-05:00"
timezone = "UTC"

[mastodon]
instance_url = "https://mastodon.social"
# Optional bearer token, read from this environment variable
access_token_env = "MASTODON_ACCESS_TOKEN"
# Minimum gap between API requests
request_delay_ms = 1000
timeout_secs = 30
max_pages = 5

[scoring]
# Must sum to 1.0; a missing weight counts as 0
favorites = 0.4
boosts = 0.3
followers = 0.3
ignored_accounts = []

[collector]
batch_size = 3
batch_delay_ms = 2000
day_delay_ms = 5000

[cache]
posts_ttl_secs = 300
analysis_ttl_secs = 600
trending_ttl_secs = 900

[schedule]
monday = ["MonsterMonday"]
tuesday = ["TootTuesday"]
wednesday = ["WildlifeWednesday"]
thursday = ["ThrowbackThursday"]
friday = ["FollowFriday"]
saturday = ["Caturday"]
sunday = ["SilentSunday"]
"#
        .to_string()
    }
}
