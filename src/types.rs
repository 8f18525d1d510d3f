//! Core types for tubeshelf

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One polled upload, before filtering
///
/// Built by a [`ChannelSource`](crate::source::ChannelSource) for each poll cycle and never
/// persisted. The publish time is normalised to UTC with the zone dropped so that
/// comparisons never mix naive and aware timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Opaque video identifier
    pub id: String,
    /// Upload title as published
    pub title: String,
    /// Publish time (UTC, zone dropped)
    pub published: NaiveDateTime,
    /// Duration in seconds, when the backend reports one
    pub duration_seconds: Option<u64>,
    /// Upload description
    pub description: String,
    /// Display name of the channel that published the upload
    pub channel_label: String,
}

impl CandidateItem {
    /// Duration in whole minutes, rounding any leftover seconds up
    pub fn duration_minutes(&self) -> Option<u64> {
        self.duration_seconds.map(|secs| secs.div_ceil(60))
    }

    /// Public watch URL for this upload
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// Structured episode identity inferred from a title
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeMatch {
    /// Series name, trimmed of surrounding whitespace only
    pub series: String,
    /// Season number (1 when the title only carries an episode number)
    pub season: u32,
    /// Episode number
    pub episode: u32,
}

/// Orchestrator stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Waiting for a run
    Idle,
    /// Asking the channel source for recent uploads
    Fetching,
    /// Running the filter chain
    Filtering,
    /// Looking for media already on disk
    CheckingExisting,
    /// Downloading selected uploads one at a time
    Downloading,
    /// Building the run summary
    Summarizing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Filtering => "filtering",
            Stage::CheckingExisting => "checking-existing",
            Stage::Downloading => "downloading",
            Stage::Summarizing => "summarizing",
        };
        f.write_str(name)
    }
}

/// Event emitted during a run
///
/// Consumers subscribe through [`Orchestrator::subscribe`](crate::orchestrator::Orchestrator::subscribe).
/// Download executors publish progress on the same channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The orchestrator moved to a new stage
    StageChanged {
        /// Stage being entered
        stage: Stage,
    },

    /// The channel source answered
    Fetched {
        /// Backend that produced the items ("api" or "feed")
        backend: String,
        /// Number of candidate items
        count: usize,
    },

    /// The metered backend could not serve the request and the feed was used instead
    SourceFallback {
        /// Why the metered backend was skipped
        reason: String,
    },

    /// A filter stage finished
    Filtered {
        /// Filter stage name
        stage: String,
        /// Items that passed
        kept: usize,
        /// Items that entered the stage
        total: usize,
    },

    /// Media for this upload already exists on disk
    AlreadyDownloaded {
        /// Video ID
        video_id: String,
        /// Existing media file
        path: PathBuf,
    },

    /// Download started
    DownloadStarted {
        /// Video ID
        video_id: String,
        /// Upload title
        title: String,
    },

    /// Download progress update
    Downloading {
        /// Video ID
        video_id: String,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Transfer rate as reported by the downloader (e.g. "2.50MiB/s")
        #[serde(skip_serializing_if = "Option::is_none")]
        rate: Option<String>,
        /// Remaining time as reported by the downloader (e.g. "00:42")
        #[serde(skip_serializing_if = "Option::is_none")]
        eta: Option<String>,
    },

    /// Download finished and the media file was located
    DownloadComplete {
        /// Video ID
        video_id: String,
        /// Final media file
        path: PathBuf,
    },

    /// Download failed
    DownloadFailed {
        /// Video ID
        video_id: String,
        /// Error message
        error: String,
    },

    /// Partial download artifacts were removed
    Cleaned {
        /// Number of files deleted
        removed: usize,
    },
}
