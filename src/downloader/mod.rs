//! Download execution
//!
//! The [`MediaDownloader`] trait is the seam between the orchestrator and the tool that
//! actually retrieves media. [`YtDlpDownloader`] drives the external `yt-dlp` binary and
//! turns its console output into progress events.
//!
//! The rest of this module covers what happens around a download:
//! - [`sidecar`]: `.nfo` descriptors for the media server
//! - [`cleanup_partial_downloads`]: removal of `.part`/`.tmp`/`.ytdl` leftovers

mod cleanup;
mod progress;
pub mod sidecar;
mod traits;
mod ytdlp;

pub use cleanup::{PARTIAL_SUFFIXES, cleanup_partial_downloads, is_partial_file};
pub use progress::{PROGRESS_TEMPLATE, ProgressLine, parse_destination_line, parse_progress_line};
pub use traits::{AUDIO_ONLY_FORMAT, FetchOptions, FetchStatus, MediaDownloader};
pub use ytdlp::YtDlpDownloader;
