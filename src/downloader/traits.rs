//! Traits and types for media download executors

use crate::config::DownloadConfig;
use crate::error::Result;
use crate::naming::TargetLocation;
use crate::types::Event;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Format selector used for audio-only downloads
pub const AUDIO_ONLY_FORMAT: &str = "bestaudio/best";

/// Per-download knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Format selector / quality ceiling, e.g. `best[height<=1080]`
    pub quality: String,
    /// Fetch the best audio stream only, ignoring `quality`
    pub audio_only: bool,
    /// Subtitle languages to fetch; empty disables subtitles
    pub subtitle_languages: Vec<String>,
}

impl FetchOptions {
    /// Options from the `[download]` configuration section
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            quality: config.quality.clone(),
            audio_only: config.audio_only,
            subtitle_languages: config.subtitle_languages.clone(),
        }
    }

    /// The effective format selector
    pub fn format_selector(&self) -> &str {
        if self.audio_only {
            AUDIO_ONLY_FORMAT
        } else {
            &self.quality
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&DownloadConfig::default())
    }
}

/// Terminal status of one fetch
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// The tool finished successfully
    Completed,
    /// The tool ran but reported failure
    Failed(String),
}

/// Something that can retrieve the media for one upload
///
/// Implementations write into `target.directory` using `target.stem` as the file name
/// (the extension is the implementation's choice) and report progress as
/// [`Event::Downloading`] on `event_tx`. Progress reporting is best effort: a send with no
/// subscribers is not an error.
///
/// `Err` is reserved for failures to run the executor at all (e.g. missing binary);
/// a download that ran and failed is `Ok(FetchStatus::Failed(..))`.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `source_url` (the upload identified by `video_id`) to `target`
    async fn fetch(
        &self,
        video_id: &str,
        source_url: &str,
        target: &TargetLocation,
        options: &FetchOptions,
        event_tx: &broadcast::Sender<Event>,
    ) -> Result<FetchStatus>;

    /// Short executor name for logs
    fn name(&self) -> &'static str;
}
