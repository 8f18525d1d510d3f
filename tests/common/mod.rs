//! Common test utilities for tubeshelf pipeline tests
//!
//! In-memory stand-ins for the channel source and the download executor, so the
//! orchestrator can be driven end to end without network access or yt-dlp.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tubeshelf::config::{Config, StorageConfig};
use tubeshelf::downloader::{FetchOptions, FetchStatus, MediaDownloader};
use tubeshelf::error::{Error, Result, SourceError};
use tubeshelf::naming::TargetLocation;
use tubeshelf::source::{ChannelRef, ChannelSource};
use tubeshelf::types::{CandidateItem, Event};

/// Channel used by every test configuration
pub const TEST_CHANNEL_URL: &str = "https://www.youtube.com/@testchannel";

/// Configuration pointing the library at `base`
pub fn test_config(base: &Path) -> Config {
    let mut config = Config::default();
    config.channel.channel_url = TEST_CHANNEL_URL.to_string();
    config.channel.quota_limit = 10_000;
    config.filters.upload_window_days = 7;
    config.storage = StorageConfig {
        base_directory: base.to_path_buf(),
        ..Default::default()
    };
    config
}

/// An upload published `days_old` days ago
pub fn upload(id: &str, title: &str, days_old: i64) -> CandidateItem {
    CandidateItem {
        id: id.to_string(),
        title: title.to_string(),
        published: days_ago(days_old),
        duration_seconds: Some(25 * 60),
        description: format!("Description of {title}"),
        channel_label: "Test Channel".to_string(),
    }
}

/// Now minus whole days (UTC, naive)
pub fn days_ago(days: i64) -> NaiveDateTime {
    Utc::now().naive_utc() - TimeDelta::days(days) + TimeDelta::minutes(1)
}

/// Drain everything currently queued on an event receiver
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// How the fake source answers `list_recent`
#[derive(Clone, Debug)]
pub enum SourceBehaviour {
    /// Return these items
    Items(Vec<CandidateItem>),
    /// Fail with an API error
    Fail,
}

/// Channel source serving fixed items
pub struct FakeSource {
    behaviour: SourceBehaviour,
    by_id: HashMap<String, CandidateItem>,
    pub requests: Arc<Mutex<Vec<(ChannelRef, usize)>>>,
}

impl FakeSource {
    pub fn new(items: Vec<CandidateItem>) -> Self {
        let by_id = items.iter().map(|i| (i.id.clone(), i.clone())).collect();
        Self {
            behaviour: SourceBehaviour::Items(items),
            by_id,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: SourceBehaviour::Fail,
            by_id: HashMap::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ChannelSource for FakeSource {
    async fn list_recent(
        &self,
        channel: &ChannelRef,
        max_results: usize,
    ) -> Result<Vec<CandidateItem>> {
        self.requests
            .lock()
            .unwrap()
            .push((channel.clone(), max_results));
        match &self.behaviour {
            SourceBehaviour::Items(items) => Ok(items.iter().take(max_results).cloned().collect()),
            SourceBehaviour::Fail => Err(SourceError::Api {
                status: 500,
                message: "backend unavailable".to_string(),
            }
            .into()),
        }
    }

    async fn fetch_video(&self, video_id: &str) -> Result<CandidateItem> {
        self.by_id
            .get(video_id)
            .cloned()
            .ok_or_else(|| Error::from(SourceError::VideoNotFound(video_id.to_string())))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// What the fake downloader does for a given video
#[derive(Clone, Debug)]
pub enum Outcome {
    /// Write `<stem>.<ext>` and complete
    Write(&'static str),
    /// Write a `.part` leftover next to the media file, then complete
    WriteWithLeftover(&'static str),
    /// Complete without writing anything
    Nothing,
    /// Report failure with this reason
    Fail(&'static str),
}

/// One recorded fetch call
#[derive(Clone, Debug)]
pub struct FetchCall {
    pub video_id: String,
    pub source_url: String,
    pub target: TargetLocation,
    pub options: FetchOptions,
}

/// Download executor writing small files instead of downloading
pub struct FakeDownloader {
    outcomes: HashMap<String, Outcome>,
    pub calls: Arc<Mutex<Vec<FetchCall>>>,
}

impl FakeDownloader {
    /// Every video succeeds as `.mp4` unless overridden
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_outcome(mut self, video_id: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(video_id.to_string(), outcome);
        self
    }
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn fetch(
        &self,
        video_id: &str,
        source_url: &str,
        target: &TargetLocation,
        options: &FetchOptions,
        event_tx: &broadcast::Sender<Event>,
    ) -> Result<FetchStatus> {
        self.calls.lock().unwrap().push(FetchCall {
            video_id: video_id.to_string(),
            source_url: source_url.to_string(),
            target: target.clone(),
            options: options.clone(),
        });

        tokio::fs::create_dir_all(&target.directory).await?;
        event_tx
            .send(Event::Downloading {
                video_id: video_id.to_string(),
                percent: 50.0,
                rate: Some("1.00MiB/s".to_string()),
                eta: Some("00:01".to_string()),
            })
            .ok();

        match self.outcomes.get(video_id).cloned().unwrap_or(Outcome::Write("mp4")) {
            Outcome::Write(ext) => {
                tokio::fs::write(target.file_with_extension(ext), b"media").await?;
                Ok(FetchStatus::Completed)
            }
            Outcome::WriteWithLeftover(ext) => {
                tokio::fs::write(target.file_with_extension(ext), b"media").await?;
                let leftover = target.file_with_extension(&format!("{ext}.part"));
                tokio::fs::write(leftover, b"partial").await?;
                Ok(FetchStatus::Completed)
            }
            Outcome::Nothing => Ok(FetchStatus::Completed),
            Outcome::Fail(reason) => Ok(FetchStatus::Failed(reason.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
