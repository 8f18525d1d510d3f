//! Metered backend: the video data API

use super::channel::ChannelRef;
use super::quota::{
    CHANNEL_LOOKUP_COST, QuotaTracker, QuotaUsage, SEARCH_COST, VIDEO_LOOKUP_COST,
};
use super::timefmt::{parse_iso_duration, parse_published};
use super::ChannelSource;
use crate::error::{Error, Result, SourceError};
use crate::types::CandidateItem;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Production endpoint of the video data API
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// The API caps page size at 50
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: SearchId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

impl VideoItem {
    fn into_candidate(self) -> CandidateItem {
        CandidateItem {
            id: self.id,
            title: self.snippet.title,
            published: parse_published(&self.snippet.published_at),
            duration_seconds: self
                .content_details
                .duration
                .as_deref()
                .and_then(parse_iso_duration),
            description: self.snippet.description,
            channel_label: self.snippet.channel_title,
        }
    }
}

/// Client for the metered video API
///
/// Every call is checked against a [`QuotaTracker`] owned by this instance before it is
/// made, and charged once it succeeds. A call that would overrun the daily limit fails
/// with [`SourceError::QuotaExhausted`] without touching the network.
pub struct ApiSource {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    quota: Mutex<QuotaTracker>,
    resolved: Mutex<HashMap<ChannelRef, String>>,
}

impl ApiSource {
    /// Create a client for the production API
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(api_key: impl Into<String>, quota_limit: u32) -> Result<Self> {
        Self::with_base_url(api_key, quota_limit, DEFAULT_API_BASE)
    }

    /// Create a client for an API at `base_url` (used by tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        quota_limit: u32,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("tubeshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quota: Mutex::new(QuotaTracker::new(quota_limit, today())),
            resolved: Mutex::new(HashMap::new()),
        })
    }

    /// Turn a channel reference into a channel id
    ///
    /// `/channel/` ids are used as-is. Handles and custom names cost a channel search
    /// ([`SEARCH_COST`]); legacy usernames cost a lookup ([`CHANNEL_LOOKUP_COST`]).
    /// Results are cached for the lifetime of this instance.
    pub async fn resolve_channel_id(&self, channel: &ChannelRef) -> Result<String> {
        if let ChannelRef::ChannelId(id) = channel {
            return Ok(id.clone());
        }
        if let Some(id) = self.resolved.lock().await.get(channel) {
            return Ok(id.clone());
        }

        let id = match channel {
            ChannelRef::User(name) => {
                let response: ChannelsResponse = self
                    .get(
                        "channels",
                        &[("part", "id".into()), ("forUsername", name.clone())],
                        CHANNEL_LOOKUP_COST,
                    )
                    .await?;
                response.items.into_iter().next().map(|c| c.id)
            }
            _ => {
                let response: SearchResponse = self
                    .get(
                        "search",
                        &[
                            ("part", "snippet".into()),
                            ("q", channel.name().to_string()),
                            ("type", "channel".into()),
                            ("maxResults", "1".into()),
                        ],
                        SEARCH_COST,
                    )
                    .await?;
                response
                    .items
                    .into_iter()
                    .next()
                    .and_then(|item| item.snippet.channel_id.or(item.id.channel_id))
            }
        };

        let id = id.ok_or_else(|| SourceError::ChannelNotResolved(channel.to_string()))?;
        debug!(channel = %channel, channel_id = %id, "resolved channel id");
        self.resolved.lock().await.insert(channel.clone(), id.clone());
        Ok(id)
    }

    async fn video_details(&self, ids: &[String]) -> Result<Vec<CandidateItem>> {
        let cost = u32::try_from(ids.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(VIDEO_LOOKUP_COST);
        let response: VideosResponse = self
            .get(
                "videos",
                &[
                    ("part", "snippet,contentDetails".into()),
                    ("id", ids.join(",")),
                ],
                cost,
            )
            .await?;
        Ok(response
            .items
            .into_iter()
            .map(VideoItem::into_candidate)
            .collect())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        cost: u32,
    ) -> Result<T> {
        self.quota.lock().await.check(cost, today())?;

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http_client
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        self.quota.lock().await.record(cost);
        debug!(endpoint, cost, "API call succeeded");
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChannelSource for ApiSource {
    async fn list_recent(
        &self,
        channel: &ChannelRef,
        max_results: usize,
    ) -> Result<Vec<CandidateItem>> {
        let channel_id = self.resolve_channel_id(channel).await?;

        let search: SearchResponse = self
            .get(
                "search",
                &[
                    ("part", "snippet".into()),
                    ("channelId", channel_id.clone()),
                    ("type", "video".into()),
                    ("order", "date".into()),
                    ("maxResults", max_results.min(MAX_PAGE_SIZE).to_string()),
                ],
                SEARCH_COST,
            )
            .await?;

        let hits: Vec<(String, Snippet)> = search
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id.map(|id| (id, item.snippet)))
            .collect();
        if hits.is_empty() {
            info!(%channel_id, "API returned no uploads");
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        let items = match self.video_details(&ids).await {
            Ok(items) => items,
            Err(e) if e.is_quota_exhausted() => {
                warn!(count = ids.len(), "no quota left for video details, using search snippets");
                hits.into_iter()
                    .map(|(id, snippet)| CandidateItem {
                        id,
                        title: snippet.title,
                        published: parse_published(&snippet.published_at),
                        duration_seconds: None,
                        description: snippet.description,
                        channel_label: snippet.channel_title,
                    })
                    .collect()
            }
            Err(e) => return Err(e),
        };

        info!(%channel_id, count = items.len(), "retrieved uploads from API");
        Ok(items)
    }

    async fn fetch_video(&self, video_id: &str) -> Result<CandidateItem> {
        self.video_details(&[video_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::VideoNotFound(video_id.to_string()).into())
    }

    async fn quota_usage(&self) -> Option<QuotaUsage> {
        Some(self.quota.lock().await.usage(today()))
    }

    fn name(&self) -> &'static str {
        "api"
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
