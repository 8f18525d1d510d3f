//! yt-dlp download executor

use super::progress::{PROGRESS_TEMPLATE, parse_destination_line, parse_progress_line};
use super::traits::{FetchOptions, FetchStatus, MediaDownloader};
use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::naming::TargetLocation;
use crate::types::Event;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Number of trailing stderr lines kept as the failure reason
const STDERR_TAIL_LINES: usize = 5;

/// Download executor backed by the external `yt-dlp` binary
///
/// # Examples
///
/// ```no_run
/// use tubeshelf::downloader::YtDlpDownloader;
/// use std::path::PathBuf;
///
/// // Explicit path
/// let downloader = YtDlpDownloader::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let downloader = YtDlpDownloader::from_path()
///     .expect("yt-dlp not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    binary_path: PathBuf,
}

impl YtDlpDownloader {
    /// Create an executor for an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find `yt-dlp` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Use the configured `ytdlp_path`, or discover the binary on PATH
    pub fn from_config(config: &DownloadConfig) -> Result<Self> {
        match &config.ytdlp_path {
            Some(path) => Ok(Self::new(path.clone())),
            None => Self::from_path().ok_or_else(|| {
                Error::NotSupported(
                    "yt-dlp not found in PATH; install it or set download.ytdlp_path".to_string(),
                )
            }),
        }
    }

    /// Path of the binary this executor runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Command-line arguments for one download
    pub fn build_args(
        source_url: &str,
        target: &TargetLocation,
        options: &FetchOptions,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--newline".into(),
            "--no-playlist".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "-f".into(),
            options.format_selector().into(),
        ];

        if !options.subtitle_languages.is_empty() {
            args.push("--write-subs".into());
            args.push("--write-auto-subs".into());
            args.push("--sub-langs".into());
            args.push(options.subtitle_languages.join(",").into());
        }

        args.push("-o".into());
        args.push(target.output_template().into_os_string());
        args.push(source_url.into());
        args
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    async fn fetch(
        &self,
        video_id: &str,
        source_url: &str,
        target: &TargetLocation,
        options: &FetchOptions,
        event_tx: &broadcast::Sender<Event>,
    ) -> Result<FetchStatus> {
        tokio::fs::create_dir_all(&target.directory).await?;

        let args = Self::build_args(source_url, target, options);
        debug!(video_id, binary = ?self.binary_path, ?args, "starting yt-dlp");

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(progress) = parse_progress_line(&line) {
                    event_tx
                        .send(Event::Downloading {
                            video_id: video_id.to_string(),
                            percent: progress.percent,
                            rate: progress.rate,
                            eta: progress.eta,
                        })
                        .ok();
                } else if let Some(path) = parse_destination_line(&line) {
                    debug!(video_id, %path, "yt-dlp destination");
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to wait for yt-dlp: {}", e)))?;

        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => VecDeque::new(),
        };

        if status.success() {
            info!(video_id, "yt-dlp finished");
            return Ok(FetchStatus::Completed);
        }

        let reason = if stderr_tail.is_empty() {
            format!("yt-dlp exited with {}", status)
        } else {
            Vec::from(stderr_tail).join(" | ")
        };
        warn!(video_id, %reason, "yt-dlp failed");
        Ok(FetchStatus::Failed(reason))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
