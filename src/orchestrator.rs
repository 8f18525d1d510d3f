//! Orchestrator: fetch, filter, check, download, summarize
//!
//! One [`Orchestrator::run`] walks the stages
//! `idle -> fetching -> filtering -> checking-existing -> downloading -> summarizing -> idle`.
//! Stage failures are recorded in the [`RunSummary`] instead of aborting the run, and a
//! failing upload never stops the ones after it. Downloads run one at a time in list order.

use crate::config::Config;
use crate::downloader::{
    FetchOptions, FetchStatus, MediaDownloader, YtDlpDownloader, cleanup_partial_downloads,
    sidecar,
};
use crate::error::{DownloadError, Error, Result};
use crate::filter::FilterChain;
use crate::naming::{
    TargetLocation, build_target, find_existing_media, is_media_file, locate_downloaded_media,
};
use crate::source::{ChannelRef, ChannelSource, QuotaUsage, standard_source, video_id_from_url};
use crate::types::{CandidateItem, Event, Stage};
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Outcome of one upload within a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Selected but not downloaded (dry run, or not reached)
    Pending,
    /// Downloaded and located on disk
    Success,
    /// Download or post-download step failed
    Failed,
    /// Media was already present; nothing was downloaded
    Existing,
}

/// One selected upload in the run summary
#[derive(Clone, Debug, Serialize)]
pub struct VideoReport {
    /// Video ID
    pub video_id: String,
    /// Upload title
    pub title: String,
    /// Publish time, ISO 8601
    pub published: String,
    /// Duration in whole minutes, when known
    pub duration_minutes: Option<u64>,
    /// Watch URL
    pub url: String,
    /// What happened to it
    pub download_status: DownloadStatus,
    /// Media file, once downloaded or found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoReport {
    fn pending(item: &CandidateItem) -> Self {
        Self {
            video_id: item.id.clone(),
            title: item.title.clone(),
            published: item.published.format("%Y-%m-%dT%H:%M:%S").to_string(),
            duration_minutes: item.duration_minutes(),
            url: item.watch_url(),
            download_status: DownloadStatus::Pending,
            path: None,
            error: None,
        }
    }
}

/// Result of one run
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    /// Uploads that passed every filter
    pub new_videos_found: usize,
    /// Downloads started (already-present uploads are not counted)
    pub downloads_attempted: usize,
    /// Downloads that produced a media file
    pub downloads_successful: usize,
    /// Downloads that failed
    pub downloads_failed: usize,
    /// Uploads skipped because their media was already present
    pub already_downloaded: usize,
    /// Every selected upload, in filter output order
    pub videos_processed: Vec<VideoReport>,
    /// Stage-level failures
    pub errors: Vec<String>,
}

impl RunSummary {
    /// Whether any stage failed
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Media files under the library root
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LibraryStats {
    /// Library root
    pub base_directory: PathBuf,
    /// Number of media files
    pub total_downloads: usize,
    /// Their combined size in MiB, rounded to two decimals
    pub total_size_mb: f64,
}

/// Snapshot for `--status`
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    /// When the report was taken (UTC)
    pub timestamp: NaiveDateTime,
    /// Watched channel
    pub channel_url: String,
    /// Human-readable filter description
    pub filter_summary: String,
    /// Metered API usage, when the API is in use
    pub quota_usage: Option<QuotaUsage>,
    /// What is on disk
    pub library: LibraryStats,
    /// Recency window in days
    pub upload_window_days: i64,
    /// Season directories enabled
    pub organize_by_season: bool,
    /// Sidecar files enabled
    pub generate_metadata: bool,
}

/// Runs the pipeline for one configured channel
///
/// # Examples
///
/// ```no_run
/// use tubeshelf::{Config, Orchestrator};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::load(Path::new("config.toml"), Some(Path::new(".env")))?;
/// let orchestrator = Orchestrator::from_config(config)?;
///
/// let mut events = orchestrator.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         println!("{:?}", event);
///     }
/// });
///
/// let summary = orchestrator.run(50, false).await;
/// println!("{} downloaded", summary.downloads_successful);
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    config: Config,
    channel: ChannelRef,
    filters: FilterChain,
    options: FetchOptions,
    source: Box<dyn ChannelSource>,
    downloader: Option<Box<dyn MediaDownloader>>,
    event_tx: broadcast::Sender<Event>,
    stage_tx: watch::Sender<Stage>,
}

impl Orchestrator {
    /// Build an orchestrator from explicit collaborators
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`] if the configured channel reference does not parse.
    pub fn new(
        config: Config,
        source: Box<dyn ChannelSource>,
        downloader: Box<dyn MediaDownloader>,
    ) -> Result<Self> {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self::with_event_channel(config, source, Some(downloader), event_tx)
    }

    /// Build around `source`, using the yt-dlp executor from the configuration
    ///
    /// A missing yt-dlp binary is not an error here: dry runs and status reports work
    /// without it, and each attempted download fails with [`Error::NotSupported`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`] if the configured channel reference does not parse.
    pub fn with_source(config: Config, source: Box<dyn ChannelSource>) -> Result<Self> {
        let (event_tx, _rx) = broadcast::channel(1000);
        let downloader = resolve_downloader(&config);
        Self::with_event_channel(config, source, downloader, event_tx)
    }

    /// Build the standard stack: API-over-feed source and the yt-dlp executor
    ///
    /// Source fallbacks are reported on the orchestrator's event channel. yt-dlp is
    /// resolved the same way as [`Orchestrator::with_source`].
    pub fn from_config(config: Config) -> Result<Self> {
        let (event_tx, _rx) = broadcast::channel(1000);
        let source = standard_source(&config, event_tx.clone())?;
        let downloader = resolve_downloader(&config);
        info!(
            source = ?source,
            downloader = ?downloader.as_ref().map(|d| d.name()),
            "pipeline initialized"
        );
        Self::with_event_channel(config, Box::new(source), downloader, event_tx)
    }

    fn with_event_channel(
        config: Config,
        source: Box<dyn ChannelSource>,
        downloader: Option<Box<dyn MediaDownloader>>,
        event_tx: broadcast::Sender<Event>,
    ) -> Result<Self> {
        let channel = ChannelRef::parse(&config.channel.channel_url)?;
        let filters = FilterChain::new(config.filters.clone());
        let options = FetchOptions::from_config(&config.download);
        let (stage_tx, _) = watch::channel(Stage::Idle);

        Ok(Self {
            config,
            channel,
            filters,
            options,
            source,
            downloader,
            event_tx,
            stage_tx,
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        *self.stage_tx.borrow()
    }

    /// The configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch, filter and download the channel's recent uploads
    ///
    /// At most `max_videos` uploads are requested from the source. With `dry_run` the run
    /// stops after filtering; the summary then lists the selection with every status
    /// `pending`.
    pub async fn run(&self, max_videos: usize, dry_run: bool) -> RunSummary {
        let now = Utc::now().naive_utc();
        let mut summary = RunSummary::default();
        info!(channel = %self.channel, max_videos, dry_run, "starting check and download");

        self.enter(Stage::Fetching);
        let candidates = match self.source.list_recent(&self.channel, max_videos).await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "failed to fetch uploads");
                summary.errors.push(format!("Error fetching uploads: {e}"));
                self.finish(&summary);
                return summary;
            }
        };
        info!(count = candidates.len(), backend = self.source.name(), "retrieved uploads");
        self.event_tx
            .send(Event::Fetched {
                backend: self.source.name().to_string(),
                count: candidates.len(),
            })
            .ok();

        self.enter(Stage::Filtering);
        info!("Applying filters: {}", self.filters.summary());
        let outcome = self.filters.apply(candidates, now);
        for stage in &outcome.stages {
            self.event_tx
                .send(Event::Filtered {
                    stage: stage.stage.name().to_string(),
                    kept: stage.kept,
                    total: stage.total,
                })
                .ok();
        }

        let selected = outcome.kept;
        summary.new_videos_found = selected.len();
        summary.videos_processed = selected.iter().map(VideoReport::pending).collect();

        if selected.is_empty() {
            info!("No new videos found matching criteria");
            self.finish(&summary);
            return summary;
        }

        if dry_run {
            info!("DRY RUN: would download {} videos", selected.len());
            for item in &selected {
                info!(video_id = %item.id, "  - {}", item.title);
            }
            self.finish(&summary);
            return summary;
        }

        self.enter(Stage::CheckingExisting);
        let base = &self.config.storage.base_directory;
        let mut queue = Vec::new();
        for (index, item) in selected.iter().enumerate() {
            let target = build_target(item, base, self.config.storage.organize_by_season);
            match find_existing_media(&target).await {
                Some(path) => {
                    info!(video_id = %item.id, ?path, "'{}' already exists, skipping download", item.title);
                    self.event_tx
                        .send(Event::AlreadyDownloaded {
                            video_id: item.id.clone(),
                            path: path.clone(),
                        })
                        .ok();
                    let report = &mut summary.videos_processed[index];
                    report.download_status = DownloadStatus::Existing;
                    report.path = Some(path);
                    summary.already_downloaded += 1;
                }
                None => queue.push((index, target)),
            }
        }

        self.enter(Stage::Downloading);
        summary.downloads_attempted = queue.len();
        let total = queue.len();
        for (position, (index, target)) in queue.into_iter().enumerate() {
            let item = &selected[index];
            info!("Downloading {}/{}: {}", position + 1, total, item.title);

            let report = &mut summary.videos_processed[index];
            match self.download_one(item, &target).await {
                Ok(path) => {
                    report.download_status = DownloadStatus::Success;
                    report.path = Some(path);
                    summary.downloads_successful += 1;
                }
                Err(e) => {
                    error!(video_id = %item.id, error = %e, "download failed");
                    self.event_tx
                        .send(Event::DownloadFailed {
                            video_id: item.id.clone(),
                            error: e.to_string(),
                        })
                        .ok();
                    report.download_status = DownloadStatus::Failed;
                    report.error = Some(e.to_string());
                    summary.downloads_failed += 1;
                }
            }
        }

        if self.config.storage.cleanup_partial_downloads {
            info!("Cleaning up partial downloads...");
            let removed = cleanup_partial_downloads(base).await;
            self.event_tx.send(Event::Cleaned { removed }).ok();
        }

        self.finish(&summary);
        summary
    }

    /// Download a single upload by watch URL, bypassing the channel listing
    ///
    /// The upload still has to pass the filter chain. Media already on disk counts as
    /// success without downloading again. A download that runs and fails is reported in
    /// the returned [`VideoReport`], not as `Err`.
    ///
    /// # Errors
    ///
    /// Fails when no video id can be extracted, the source cannot look the video up, or
    /// the video does not pass the filters.
    pub async fn force_download(&self, url: &str) -> Result<VideoReport> {
        info!(%url, "force downloading video");
        let video_id = video_id_from_url(url)
            .ok_or_else(|| Error::Other(format!("could not extract a video id from '{url}'")))?;

        let item = self.source.fetch_video(&video_id).await?;
        let item = self
            .filters
            .apply(vec![item], Utc::now().naive_utc())
            .kept
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::Other(format!("video {video_id} does not match the configured filters"))
            })?;

        let mut report = VideoReport::pending(&item);
        let target = build_target(
            &item,
            &self.config.storage.base_directory,
            self.config.storage.organize_by_season,
        );

        if let Some(path) = find_existing_media(&target).await {
            warn!(video_id = %item.id, ?path, "'{}' already downloaded", item.title);
            report.download_status = DownloadStatus::Existing;
            report.path = Some(path);
            return Ok(report);
        }

        match self.download_one(&item, &target).await {
            Ok(path) => {
                info!(video_id = %item.id, "successfully force downloaded '{}'", item.title);
                report.download_status = DownloadStatus::Success;
                report.path = Some(path);
            }
            Err(e) => {
                error!(video_id = %item.id, error = %e, "failed to force download");
                report.download_status = DownloadStatus::Failed;
                report.error = Some(e.to_string());
            }
        }
        Ok(report)
    }

    /// Library statistics, quota usage and configuration highlights
    pub async fn status_report(&self) -> StatusReport {
        StatusReport {
            timestamp: Utc::now().naive_utc(),
            channel_url: self.config.channel.channel_url.clone(),
            filter_summary: self.filters.summary(),
            quota_usage: self.source.quota_usage().await,
            library: library_stats(&self.config.storage.base_directory).await,
            upload_window_days: self.config.filters.upload_window_days,
            organize_by_season: self.config.storage.organize_by_season,
            generate_metadata: self.config.storage.generate_metadata,
        }
    }

    async fn download_one(&self, item: &CandidateItem, target: &TargetLocation) -> Result<PathBuf> {
        let downloader = self.downloader.as_deref().ok_or_else(|| {
            Error::NotSupported(
                "no download executor available (yt-dlp not found; install it or set download.ytdlp_path)"
                    .to_string(),
            )
        })?;

        info!(video_id = %item.id, directory = ?target.directory, "Starting download: {}", item.title);
        self.event_tx
            .send(Event::DownloadStarted {
                video_id: item.id.clone(),
                title: item.title.clone(),
            })
            .ok();

        let status = downloader
            .fetch(
                &item.id,
                &item.watch_url(),
                target,
                &self.options,
                &self.event_tx,
            )
            .await?;

        if let FetchStatus::Failed(reason) = status {
            return Err(DownloadError::Failed {
                video_id: item.id.clone(),
                reason,
            }
            .into());
        }

        let media = locate_downloaded_media(target).await.ok_or_else(|| {
            Error::from(DownloadError::OutputNotFound {
                video_id: item.id.clone(),
                dir: target.directory.clone(),
            })
        })?;

        if self.config.storage.generate_metadata
            && let Err(e) = sidecar::write_nfo(item, &media).await
        {
            warn!(video_id = %item.id, error = %e, "failed to write NFO file");
        }

        let size = tokio::fs::metadata(&media).await.map(|m| m.len()).unwrap_or(0);
        info!(
            video_id = %item.id,
            "Successfully downloaded: {} ({:.1} MB)",
            media.display(),
            size as f64 / (1024.0 * 1024.0)
        );
        self.event_tx
            .send(Event::DownloadComplete {
                video_id: item.id.clone(),
                path: media.clone(),
            })
            .ok();
        Ok(media)
    }

    fn enter(&self, stage: Stage) {
        debug!(%stage, "entering stage");
        self.stage_tx.send_replace(stage);
        self.event_tx.send(Event::StageChanged { stage }).ok();
    }

    fn finish(&self, summary: &RunSummary) {
        self.enter(Stage::Summarizing);
        info!(
            found = summary.new_videos_found,
            attempted = summary.downloads_attempted,
            successful = summary.downloads_successful,
            failed = summary.downloads_failed,
            existing = summary.already_downloaded,
            errors = summary.errors.len(),
            "Download process complete: {}/{} successful",
            summary.downloads_successful,
            summary.downloads_attempted
        );
        self.enter(Stage::Idle);
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("channel", &self.channel)
            .field("source", &self.source.name())
            .field("downloader", &self.downloader.as_ref().map(|d| d.name()))
            .field("stage", &self.stage())
            .finish()
    }
}

fn resolve_downloader(config: &Config) -> Option<Box<dyn MediaDownloader>> {
    match YtDlpDownloader::from_config(&config.download) {
        Ok(downloader) => {
            debug!(binary = ?downloader.binary_path(), "yt-dlp resolved");
            Some(Box::new(downloader))
        }
        Err(e) => {
            warn!(error = %e, "yt-dlp unavailable, downloads will fail until it is installed");
            None
        }
    }
}

/// Count media files (recursively) under `root` and their total size
pub async fn library_stats(root: &Path) -> LibraryStats {
    let mut total_downloads = 0;
    let mut total_bytes = 0;
    collect_media_sizes(root, &mut total_downloads, &mut total_bytes).await;

    let mb = total_bytes as f64 / (1024.0 * 1024.0);
    LibraryStats {
        base_directory: root.to_path_buf(),
        total_downloads,
        total_size_mb: (mb * 100.0).round() / 100.0,
    }
}

fn collect_media_sizes<'a>(
    path: &'a Path,
    count: &'a mut usize,
    bytes: &'a mut u64,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let Ok(mut entries) = tokio::fs::read_dir(path).await else {
            return;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let entry_path = entry.path();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };

            if file_type.is_dir() {
                collect_media_sizes(&entry_path, count, bytes).await;
            } else if file_type.is_file()
                && is_media_file(&entry_path)
                && let Ok(meta) = entry.metadata().await
            {
                *count += 1;
                *bytes += meta.len();
            }
        }
    })
}
