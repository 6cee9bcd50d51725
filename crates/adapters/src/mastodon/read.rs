//! Mastodon REST read adapter for tag timelines, tag history and trends

use std::time::Duration;

use async_trait::async_trait;
use hashtag_tracker_domain::{
    Author, FetchError, Post, TRENDING_MAX_LIMIT, TagSource, TagUsageSample, TrendingTag,
    calendar::{parse_date, start_of_day},
};
use reqwest::{Client, StatusCode, Url, header::HeaderMap};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::well_known::Rfc3339,
    macros::format_description,
};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Connection settings for a Mastodon instance
#[derive(Debug, Clone)]
pub struct MastodonConfig {
    pub instance_url: String,
    /// Sent as a bearer token when present
    pub access_token: Option<SecretString>,
    /// Minimum gap between consecutive requests
    pub request_delay: Duration,
    pub timeout: Duration,
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            instance_url: "https://mastodon.social".to_string(),
            access_token: None,
            request_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Keeps consecutive requests at least `delay` apart.
///
/// The lock is held through the sleep, so concurrent callers queue up and
/// leave one at a time.
#[derive(Debug)]
pub struct RequestSpacer {
    delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestSpacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
        }
    }

    /// Wait until the next request may go out
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Mastodon tag source
pub struct MastodonClient {
    client: Client,
    base_url: Url,
    access_token: Option<SecretString>,
    spacer: RequestSpacer,
}

impl MastodonClient {
    pub fn new(config: MastodonConfig) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.instance_url).map_err(|e| FetchError::Api {
            message: format!("invalid instance URL '{}'", config.instance_url),
            source: Some(Box::new(e)),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::api(format!(
                "instance URL '{}' cannot carry a path",
                config.instance_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Api {
                message: "failed to build HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url,
            access_token: config.access_token,
            spacer: RequestSpacer::new(config.request_delay),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
        resource: &str,
    ) -> Result<T, FetchError> {
        self.spacer.wait().await;
        tracing::debug!(url = %url, query = ?query, "GET");

        let mut request = self.client.get(url).query(query);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| FetchError::Api {
            message: format!("request for {} failed", resource),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_delay(response.headers(), OffsetDateTime::now_utc());
            tracing::warn!(resource = %resource, retry_after = ?retry_after, "Rate limited");
            return Err(FetchError::RateLimited { retry_after });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                resource: resource.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::api(format!(
                "{} returned {}: {}",
                resource,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response.json::<T>().await.map_err(|e| FetchError::Malformed {
            message: resource.to_string(),
            source: Some(Box::new(e)),
        })
    }
}

/// Wait requested by a `Retry-After` header, in delta-seconds or IMF-fixdate
/// form. A date in the past means no wait.
pub(crate) fn retry_after_delay(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
    let value = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    let at = PrimitiveDateTime::parse(value, format).ok()?.assume_utc();
    Some(Duration::try_from(at - now).unwrap_or(Duration::ZERO))
}

#[async_trait]
impl TagSource for MastodonClient {
    async fn fetch_page(
        &self,
        tag: &str,
        max_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Post>, FetchError> {
        let url = self.endpoint(&["api", "v1", "timelines", "tag", tag]);
        let mut query = vec![("limit", limit.to_string())];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id.to_string()));
        }

        let statuses: Vec<StatusDto> = self
            .get_json(url, &query, &format!("tag timeline #{}", tag))
            .await?;

        tracing::debug!(tag = %tag, max_id = ?max_id, count = statuses.len(), "Fetched page");

        Ok(statuses.into_iter().map(Post::from).collect())
    }

    async fn fetch_usage_history(&self, tag: &str) -> Result<Vec<TagUsageSample>, FetchError> {
        let url = self.endpoint(&["api", "v1", "tags", tag]);
        let dto: TagDto = self.get_json(url, &[], &format!("tag #{}", tag)).await?;
        Ok(dto.samples())
    }

    async fn fetch_trending(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TrendingTag>, FetchError> {
        let url = self.endpoint(&["api", "v1", "trends", "tags"]);
        let query = [
            ("limit", limit.clamp(1, TRENDING_MAX_LIMIT).to_string()),
            ("offset", offset.to_string()),
        ];
        let tags: Vec<TagDto> = self.get_json(url, &query, "trending tags").await?;

        tracing::info!(count = tags.len(), "Fetched trending tags");

        Ok(tags.into_iter().map(TrendingTag::from).collect())
    }
}

#[derive(Deserialize)]
struct AccountDto {
    id: String,
    username: String,
    #[serde(default)]
    followers_count: i64,
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct StatusDto {
    id: String,
    created_at: Option<String>,
    content: Option<String>,
    url: Option<String>,
    account: Option<AccountDto>,
    #[serde(default)]
    favourites_count: i64,
    #[serde(default)]
    reblogs_count: i64,
    #[serde(default)]
    replies_count: i64,
}

impl From<StatusDto> for Post {
    fn from(dto: StatusDto) -> Self {
        Post {
            id: dto.id,
            created_at: dto
                .created_at
                .as_deref()
                .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok()),
            content: dto.content,
            url: dto.url,
            author: dto.account.map(|a| Author {
                id: a.id,
                username: a.username,
                followers_count: a.followers_count,
                created_at: a.created_at,
            }),
            favourites_count: dto.favourites_count,
            reblogs_count: dto.reblogs_count,
            replies_count: dto.replies_count,
            relevance_score: None,
        }
    }
}

/// Upstream sends counters as strings; some servers send numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum Flexible {
    Number(u64),
    Text(String),
}

impl Flexible {
    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Epoch seconds, or a `YYYY-MM-DD` date taken as UTC midnight
    fn as_day(&self) -> Option<OffsetDateTime> {
        if let Some(secs) = self.as_u64() {
            return i64::try_from(secs)
                .ok()
                .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok());
        }
        match self {
            Self::Text(s) => parse_date(s.trim())
                .ok()
                .map(|date| start_of_day(date, UtcOffset::UTC)),
            Self::Number(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct HistoryDto {
    day: Flexible,
    uses: Flexible,
    accounts: Flexible,
}

#[derive(Deserialize)]
struct TagDto {
    name: String,
    url: Option<String>,
    #[serde(default)]
    history: Vec<HistoryDto>,
}

impl TagDto {
    fn samples(&self) -> Vec<TagUsageSample> {
        self.history
            .iter()
            .filter_map(|h| {
                let sample = h.day.as_day().zip(h.uses.as_u64()).zip(h.accounts.as_u64());
                if sample.is_none() {
                    tracing::warn!(tag = %self.name, "Skipping unparsable history entry");
                }
                sample.map(|((day, uses), accounts)| TagUsageSample {
                    day,
                    uses,
                    accounts,
                })
            })
            .collect()
    }
}

impl From<TagDto> for TrendingTag {
    fn from(dto: TagDto) -> Self {
        let history = dto.samples();
        TrendingTag {
            name: dto.name,
            url: dto.url,
            history,
        }
    }
}
