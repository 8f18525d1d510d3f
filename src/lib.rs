//! # tubeshelf
//!
//! Polls a video channel's uploads, picks the ones worth keeping and files them into a
//! media-server library with season/episode numbering inferred from their titles.
//!
//! ## Pipeline
//!
//! 1. A [`ChannelSource`](source::ChannelSource) lists recent uploads (metered API first,
//!    public upload feed as fallback)
//! 2. The [`FilterChain`] keeps uploads that are recent enough, match a title pattern, fit
//!    the duration bounds and avoid excluded keywords
//! 3. [`build_target`](naming::build_target) turns each title into
//!    `<base>/<series>/Season NN/<series> - SNNEMM - <title>.<ext>`
//! 4. Uploads already on disk are skipped; the rest are fetched one at a time by a
//!    [`MediaDownloader`](downloader::MediaDownloader) with a `.nfo` sidecar written next to
//!    each file
//!
//! ## Quick Start
//!
//! ```no_run
//! use tubeshelf::{Config, Orchestrator};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.toml"), None)?;
//!     let orchestrator = Orchestrator::from_config(config)?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = orchestrator.run(50, false).await;
//!     println!("{}/{} downloaded", summary.downloads_successful, summary.downloads_attempted);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download execution, sidecars and partial-file cleanup
pub mod downloader;
/// Error types
pub mod error;
/// Filter chain
pub mod filter;
/// Logging initialisation
pub mod logging;
/// Title parsing, sanitizing and library layout
pub mod naming;
/// Pipeline orchestration
pub mod orchestrator;
/// Channel sources (metered API and upload feed)
pub mod source;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use downloader::{FetchOptions, FetchStatus, MediaDownloader, YtDlpDownloader};
pub use error::{DownloadError, Error, Result, SourceError};
pub use filter::{FilterChain, FilterStage, Verdict};
pub use naming::{TargetLocation, build_target, parse_episode, sanitize};
pub use orchestrator::{DownloadStatus, Orchestrator, RunSummary, StatusReport, VideoReport};
pub use source::{ChannelRef, ChannelSource};
pub use types::{CandidateItem, EpisodeMatch, Event, Stage};

/// Run a future until it completes or a termination signal arrives
///
/// Returns `None` when interrupted. The future is dropped at that point, so a download
/// in progress leaves its partial files behind for the next cleanup pass.
///
/// # Example
///
/// ```no_run
/// use tubeshelf::{Config, Orchestrator, run_until_signal};
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::load(Path::new("config.toml"), None)?;
///     let orchestrator = Orchestrator::from_config(config)?;
///
///     match run_until_signal(orchestrator.run(50, false)).await {
///         Some(summary) => println!("{} new", summary.new_videos_found),
///         None => std::process::exit(130),
///     }
///     Ok(())
/// }
/// ```
pub async fn run_until_signal<F: std::future::Future>(work: F) -> Option<F::Output> {
    tokio::select! {
        output = work => Some(output),
        _ = wait_for_signal() => None,
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C elsewhere)
///
/// A signal whose listener cannot be installed is skipped. With neither available this
/// waits on [`tokio::signal::ctrl_c`].
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    type Listener = Option<(Signal, &'static str)>;

    fn listen(kind: SignalKind, name: &'static str) -> Listener {
        match signal(kind) {
            Ok(stream) => Some((stream, name)),
            Err(e) => {
                tracing::warn!(signal = name, error = %e, "cannot listen for signal");
                None
            }
        }
    }

    async fn next(listener: &mut Listener) -> &'static str {
        match listener {
            Some((stream, name)) => {
                stream.recv().await;
                name
            }
            None => std::future::pending().await,
        }
    }

    let mut terminate = listen(SignalKind::terminate(), "SIGTERM");
    let mut interrupt = listen(SignalKind::interrupt(), "SIGINT");

    if terminate.is_none() && interrupt.is_none() {
        tracing::warn!("no signal listeners installed, stopping on ctrl_c only");
        tokio::signal::ctrl_c().await.ok();
        tracing::info!(signal = "ctrl_c", "stop requested");
        return;
    }

    let name = tokio::select! {
        name = next(&mut terminate) => name,
        name = next(&mut interrupt) => name,
    };
    tracing::info!(signal = name, "stop requested");
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl_c, running without a stop signal");
        std::future::pending::<()>().await;
    }
    tracing::info!(signal = "ctrl_c", "stop requested");
}
