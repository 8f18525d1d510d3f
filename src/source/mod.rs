//! Channel sources: where candidate uploads come from
//!
//! Two backends implement [`ChannelSource`]:
//! - [`ApiSource`] - the metered video API (accurate durations, costs quota)
//! - [`FeedSource`] - the public upload feed (free, no durations)
//!
//! [`FallbackSource`] tries the first and falls back to the second, so the filter chain
//! never needs to know which one answered.

use crate::error::{Error, Result};
use crate::types::CandidateItem;
use async_trait::async_trait;

mod api;
mod channel;
mod fallback;
mod feed;
mod quota;
mod timefmt;

pub use api::{ApiSource, DEFAULT_API_BASE};
pub use channel::{ChannelRef, video_id_from_url};
pub use fallback::{FallbackSource, standard_source};
pub use feed::{DEFAULT_FEED_BASE, FeedSource};
pub use quota::{
    CHANNEL_LOOKUP_COST, QuotaTracker, QuotaUsage, SEARCH_COST, VIDEO_LOOKUP_COST,
};
pub use timefmt::{parse_iso_duration, parse_published};

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Supplier of candidate uploads for a channel
///
/// Implementations must be swappable without the rest of the pipeline noticing; order of
/// the returned items is not significant.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Most recent uploads of `channel`, at most `max_results` of them
    async fn list_recent(
        &self,
        channel: &ChannelRef,
        max_results: usize,
    ) -> Result<Vec<CandidateItem>>;

    /// Details of a single upload
    ///
    /// Backends that cannot look up individual videos return [`Error::NotSupported`].
    async fn fetch_video(&self, video_id: &str) -> Result<CandidateItem> {
        Err(Error::NotSupported(format!(
            "{} cannot look up single videos (requested {video_id})",
            self.name()
        )))
    }

    /// Quota usage, for metered backends
    async fn quota_usage(&self) -> Option<QuotaUsage> {
        None
    }

    /// Short backend name for logs ("api", "feed", ...)
    fn name(&self) -> &'static str;
}
