//! Metered-first source with feed fallback

use super::channel::ChannelRef;
use super::quota::QuotaUsage;
use super::ChannelSource;
use crate::config::Config;
use crate::error::Result;
use crate::types::{CandidateItem, Event};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Tries the primary backend, then the fallback
///
/// - primary answers with items: use them
/// - primary fails (quota, HTTP, resolution) or answers empty: ask the fallback
/// - fallback fails too: log a warning and return an empty list
///
/// With no primary configured (no API key) the fallback is used directly.
pub struct FallbackSource {
    primary: Option<Box<dyn ChannelSource>>,
    fallback: Box<dyn ChannelSource>,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl FallbackSource {
    /// Create a source that prefers `primary` and falls back to `fallback`
    pub fn new(primary: Option<Box<dyn ChannelSource>>, fallback: Box<dyn ChannelSource>) -> Self {
        Self {
            primary,
            fallback,
            event_tx: None,
        }
    }

    /// Report fallbacks on an event channel
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn emit_fallback(&self, reason: String) {
        if let Some(tx) = &self.event_tx {
            tx.send(Event::SourceFallback { reason }).ok();
        }
    }
}

#[async_trait]
impl ChannelSource for FallbackSource {
    async fn list_recent(
        &self,
        channel: &ChannelRef,
        max_results: usize,
    ) -> Result<Vec<CandidateItem>> {
        if let Some(primary) = &self.primary {
            match primary.list_recent(channel, max_results).await {
                Ok(items) if !items.is_empty() => return Ok(items),
                Ok(_) => {
                    info!(backend = primary.name(), "no uploads from primary backend, trying feed");
                    self.emit_fallback(format!("{} returned no uploads", primary.name()));
                }
                Err(e) if e.is_quota_exhausted() => {
                    warn!(error = %e, "quota limit reached, falling back to feed");
                    self.emit_fallback(e.to_string());
                }
                Err(e) => {
                    warn!(backend = primary.name(), error = %e, "primary backend failed, falling back to feed");
                    self.emit_fallback(e.to_string());
                }
            }
        }

        match self.fallback.list_recent(channel, max_results).await {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!(backend = self.fallback.name(), error = %e, "no uploads retrieved from any backend");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_video(&self, video_id: &str) -> Result<CandidateItem> {
        match &self.primary {
            Some(primary) => primary.fetch_video(video_id).await,
            None => self.fallback.fetch_video(video_id).await,
        }
    }

    async fn quota_usage(&self) -> Option<QuotaUsage> {
        match &self.primary {
            Some(primary) => primary.quota_usage().await,
            None => None,
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

impl std::fmt::Debug for FallbackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackSource")
            .field("primary", &self.primary.as_ref().map(|p| p.name()))
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

/// Build the standard source stack: API (when a key is configured) over the feed
pub fn standard_source(
    config: &Config,
    event_tx: broadcast::Sender<Event>,
) -> Result<FallbackSource> {
    let primary: Option<Box<dyn ChannelSource>> = if config.has_api_key() {
        Some(Box::new(super::ApiSource::new(
            config.channel.api_key.trim(),
            config.channel.quota_limit,
        )?))
    } else {
        info!("no API key configured, using upload feed only");
        None
    };
    let fallback: Box<dyn ChannelSource> = Box::new(super::FeedSource::new()?);
    Ok(FallbackSource::new(primary, fallback).with_events(event_tx))
}
