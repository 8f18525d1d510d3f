//! Unmetered backend: the channel's public upload feed

use super::ChannelSource;
use super::channel::ChannelRef;
use super::timefmt::parse_published;
use crate::error::{Error, Result, SourceError};
use crate::types::CandidateItem;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

/// Production host of the upload feed
pub const DEFAULT_FEED_BASE: &str = "https://www.youtube.com";

/// Reads a channel's public upload feed (no quota, no durations)
///
/// The feed is tried as RSS 2.0 first and as Atom second.
pub struct FeedSource {
    http_client: reqwest::Client,
    base_url: String,
}

impl FeedSource {
    /// Create a reader for the production feed host
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_FEED_BASE)
    }

    /// Create a reader for a feed host at `base_url` (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("tubeshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Feed URL for a channel, if one can be built without an id lookup
    pub fn feed_url(&self, channel: &ChannelRef) -> Option<String> {
        channel
            .feed_query()
            .map(|q| format!("{}/feeds/videos.xml?{}", self.base_url, q))
    }
}

#[async_trait]
impl ChannelSource for FeedSource {
    async fn list_recent(
        &self,
        channel: &ChannelRef,
        max_results: usize,
    ) -> Result<Vec<CandidateItem>> {
        let url = self.feed_url(channel).ok_or_else(|| {
            SourceError::ChannelNotResolved(format!("no upload feed for {channel}"))
        })?;
        debug!(%url, "fetching upload feed");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Feed(format!("Failed to fetch feed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Feed(format!(
                "feed returned HTTP {}: {}",
                status.as_u16(),
                url
            ))
            .into());
        }

        let content = response
            .text()
            .await
            .map_err(|e| SourceError::Feed(format!("Failed to read feed content: {}", e)))?;

        let mut items = parse_feed(&content)?;
        items.truncate(max_results);
        info!(count = items.len(), "retrieved uploads from feed");
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "feed"
    }
}

/// Parse feed content, trying RSS first and Atom second
pub fn parse_feed(content: &str) -> Result<Vec<CandidateItem>> {
    match parse_as_rss(content) {
        Ok(items) => {
            debug!("Successfully parsed as RSS, found {} items", items.len());
            Ok(items)
        }
        Err(rss_err) => {
            debug!("Failed to parse as RSS: {}, trying Atom", rss_err);
            match parse_as_atom(content) {
                Ok(items) => {
                    debug!("Successfully parsed as Atom, found {} items", items.len());
                    Ok(items)
                }
                Err(atom_err) => Err(SourceError::Feed(format!(
                    "Failed to parse feed as RSS or Atom. RSS error: {}. Atom error: {}",
                    rss_err, atom_err
                ))
                .into()),
            }
        }
    }
}

fn parse_as_rss(content: &str) -> std::result::Result<Vec<CandidateItem>, String> {
    let channel = content
        .parse::<rss::Channel>()
        .map_err(|e| format!("RSS parse error: {}", e))?;
    let channel_label = channel.title().to_string();

    let items = channel
        .items()
        .iter()
        .filter_map(|item| {
            let id = rss_extension(item.extensions(), "yt", "videoId")
                .and_then(|ext| ext.value())
                .map(str::to_string)
                .or_else(|| item.link().and_then(video_id_from_link))?;

            let description = rss_extension(item.extensions(), "media", "group")
                .and_then(|group| rss_child_value(group, "description"))
                .or_else(|| item.description().map(str::to_string))
                .unwrap_or_default();

            Some(CandidateItem {
                id,
                title: item.title().unwrap_or_default().to_string(),
                published: item
                    .pub_date()
                    .map(parse_published)
                    .unwrap_or_else(|| Utc::now().naive_utc()),
                duration_seconds: None,
                description,
                channel_label: channel_label.clone(),
            })
        })
        .collect();

    Ok(items)
}

fn parse_as_atom(content: &str) -> std::result::Result<Vec<CandidateItem>, String> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())
        .map_err(|e| format!("Atom parse error: {}", e))?;
    let channel_label = feed.title().as_str().to_string();

    let items = feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let id = atom_extension(entry.extensions(), "yt", "videoId")
                .and_then(|ext| ext.value())
                .map(str::to_string)
                .or_else(|| {
                    entry
                        .links()
                        .iter()
                        .find_map(|link| video_id_from_link(link.href()))
                })?;

            // Published, falling back to updated
            let published = entry
                .published()
                .unwrap_or_else(|| entry.updated())
                .naive_utc();

            let description = atom_extension(entry.extensions(), "media", "group")
                .and_then(|group| atom_child_value(group, "description"))
                .or_else(|| entry.summary().map(|s| s.as_str().to_string()))
                .unwrap_or_default();

            Some(CandidateItem {
                id,
                title: entry.title().as_str().to_string(),
                published,
                duration_seconds: None,
                description,
                channel_label: channel_label.clone(),
            })
        })
        .collect();

    Ok(items)
}

/// Video id from the `v=` parameter of a watch link
fn video_id_from_link(link: &str) -> Option<String> {
    let (_, query) = link.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Extension maps are keyed by prefix, then by element name; parsers differ on whether the
/// inner key keeps the prefix, so accept both
fn key_matches(key: &str, prefix: &str, local: &str) -> bool {
    key == local
        || key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            == Some(local)
}

fn rss_extension<'a>(
    map: &'a rss::extension::ExtensionMap,
    prefix: &str,
    local: &str,
) -> Option<&'a rss::extension::Extension> {
    map.get(prefix)?
        .iter()
        .find(|(key, _)| key_matches(key, prefix, local))
        .and_then(|(_, values)| values.first())
}

fn rss_child_value(ext: &rss::extension::Extension, local: &str) -> Option<String> {
    ext.children()
        .iter()
        .find(|(key, _)| key_matches(key, "media", local))
        .and_then(|(_, values)| values.first())
        .and_then(|child| child.value())
        .map(str::to_string)
}

fn atom_extension<'a>(
    map: &'a atom_syndication::extension::ExtensionMap,
    prefix: &str,
    local: &str,
) -> Option<&'a atom_syndication::extension::Extension> {
    map.get(prefix)?
        .iter()
        .find(|(key, _)| key_matches(key, prefix, local))
        .and_then(|(_, values)| values.first())
}

fn atom_child_value(ext: &atom_syndication::extension::Extension, local: &str) -> Option<String> {
    ext.children()
        .iter()
        .find(|(key, _)| key_matches(key, "media", local))
        .and_then(|(_, values)| values.first())
        .and_then(|child| child.value())
        .map(str::to_string)
}
