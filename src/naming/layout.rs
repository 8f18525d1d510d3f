//! Library layout: where an upload lives on disk
//!
//! `base / <series> / [Season NN /] <stem>.<ext>`, where the series segment comes from the
//! parsed title or, failing that, the channel name.

use super::{parse_episode, sanitize};
use crate::types::CandidateItem;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Extensions recognised as finished media files
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "m4a", "mp3", "flv"];

/// Series name used when neither the title nor the channel yields one
pub const UNKNOWN_CHANNEL: &str = "Unknown Channel";

/// Number of leading stem characters used for the loose downloaded-file match
const LOOSE_PREFIX_CHARS: usize = 20;

/// Computed location of an upload inside the library
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetLocation {
    /// Directory the media file goes into
    pub directory: PathBuf,
    /// File name without extension
    pub stem: String,
}

impl TargetLocation {
    /// Path of the media file for a given extension
    ///
    /// The stem may itself contain dots, so the extension is appended rather than
    /// substituted.
    pub fn file_with_extension(&self, ext: &str) -> PathBuf {
        self.directory.join(format!("{}.{}", self.stem, ext))
    }

    /// yt-dlp output template for this location (`<dir>/<stem>.%(ext)s`)
    pub fn output_template(&self) -> PathBuf {
        self.directory.join(format!("{}.%(ext)s", self.stem))
    }
}

/// Compute the directory and file stem for an upload
///
/// Pure: no directories are created here.
///
/// With `organize_by_season` and a parsed episode, the result is
/// `base/<series>/Season NN` and `"<series> - SNNEMM - <title>"`. Otherwise it is
/// `base/<series>` and the sanitized title.
pub fn build_target(item: &CandidateItem, base: &Path, organize_by_season: bool) -> TargetLocation {
    let parsed = parse_episode(&item.title);

    let series = match &parsed {
        Some(m) => m.series.clone(),
        None if item.channel_label.is_empty() => UNKNOWN_CHANNEL.to_string(),
        None => item.channel_label.clone(),
    };
    let series_dir = sanitize(&series);

    match parsed {
        Some(m) if organize_by_season => TargetLocation {
            directory: base.join(&series_dir).join(format!("Season {:02}", m.season)),
            stem: format!(
                "{} - S{:02}E{:02} - {}",
                series_dir,
                m.season,
                m.episode,
                sanitize(&item.title)
            ),
        },
        _ => TargetLocation {
            directory: base.join(&series_dir),
            stem: sanitize(&item.title),
        },
    }
}

/// Look for a non-empty media file at the target stem
///
/// Returns the first match in [`MEDIA_EXTENSIONS`] order.
pub async fn find_existing_media(target: &TargetLocation) -> Option<PathBuf> {
    if fs::metadata(&target.directory).await.is_err() {
        return None;
    }

    for ext in MEDIA_EXTENSIONS {
        let candidate = target.file_with_extension(ext);
        if let Ok(meta) = fs::metadata(&candidate).await
            && meta.is_file()
            && meta.len() > 0
        {
            debug!(path = ?candidate, "found existing media file");
            return Some(candidate);
        }
    }

    None
}

/// Locate the media file produced by a finished download
///
/// First looks for `<stem>.<media ext>` (allowing format suffixes such as
/// `<stem>.f137.mp4`), then for any media file whose name starts with the first
/// 20 characters of the stem.
pub async fn locate_downloaded_media(target: &TargetLocation) -> Option<PathBuf> {
    let files = list_media_files(&target.directory).await;

    let exact_prefix = format!("{}.", target.stem);
    if let Some((path, _)) = files.iter().find(|(_, name)| name.starts_with(&exact_prefix)) {
        return Some(path.clone());
    }

    let loose_prefix: String = target.stem.chars().take(LOOSE_PREFIX_CHARS).collect();
    files
        .into_iter()
        .find(|(_, name)| name.starts_with(&loose_prefix))
        .map(|(path, _)| path)
}

/// Whether a path has one of the recognised media extensions (case-insensitive)
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| MEDIA_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext)))
}

/// Media files directly inside `dir`, sorted by name for stable results
async fn list_media_files(dir: &Path) -> Vec<(PathBuf, String)> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(?dir, error = %e, "cannot read target directory");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file
            && is_media_file(&path)
            && let Some(name) = path.file_name().and_then(|n| n.to_str())
        {
            let name = name.to_string();
            files.push((path, name));
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}
