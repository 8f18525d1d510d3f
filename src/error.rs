//! Error types for tubeshelf
//!
//! This module provides the error taxonomy for the library:
//! - Configuration errors (fatal at startup)
//! - Channel source errors, including quota exhaustion of the metered backend
//! - Per-item download errors
//! - Wrapped I/O, HTTP, and serialization failures

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tubeshelf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tubeshelf
///
/// Each variant carries enough context to produce a useful log line on its own.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "filters.max_duration_minutes")
        key: Option<String>,
    },

    /// Configuration file could not be parsed
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Channel source error (API or feed)
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, backend without the capability, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error means the metered backend ran out of quota
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Error::Source(SourceError::QuotaExhausted { .. }))
    }
}

/// Channel source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// The operation would exceed the daily quota of the metered backend
    #[error("quota limit would be exceeded: used {used}, cost {cost}, limit {limit}")]
    QuotaExhausted {
        /// Units already spent today
        used: u32,
        /// Units the operation would cost
        cost: u32,
        /// Configured daily limit
        limit: u32,
    },

    /// The channel reference could not be turned into a channel id or feed
    #[error("could not resolve channel: {0}")]
    ChannelNotResolved(String),

    /// The video API answered with a non-success status
    #[error("API returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The upload feed could not be fetched or parsed
    #[error("feed error: {0}")]
    Feed(String),

    /// The requested video does not exist or is not visible
    #[error("video {0} not found")]
    VideoNotFound(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The downloader reported a failure for this video
    #[error("download of {video_id} failed: {reason}")]
    Failed {
        /// The video whose download failed
        video_id: String,
        /// The reason reported by the downloader
        reason: String,
    },

    /// The downloader finished but no media file could be found
    #[error("downloaded file for {video_id} not found in {dir}")]
    OutputNotFound {
        /// The video that was downloaded
        video_id: String,
        /// The directory that was searched
        dir: PathBuf,
    },
}
