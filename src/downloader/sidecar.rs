//! `.nfo` sidecar files read by the media server

use crate::error::Result;
use crate::types::CandidateItem;
use quick_xml::escape::escape;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters of description kept in `<plot>`
pub const PLOT_MAX_CHARS: usize = 500;

/// Sidecar path for a media file (same stem, `.nfo` extension)
pub fn nfo_path(media_path: &Path) -> PathBuf {
    media_path.with_extension("nfo")
}

/// Render the episode descriptor for an upload
///
/// The plot is the first 500 characters of the description followed by `...`, whether or
/// not anything was cut.
pub fn render_nfo(item: &CandidateItem) -> String {
    let plot: String = item.description.chars().take(PLOT_MAX_CHARS).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<episodedetails>
    <title>{title}</title>
    <plot>{plot}...</plot>
    <aired>{aired}</aired>
    <studio>YouTube</studio>
    <tag>YouTube</tag>
    <uniqueid type="youtube">{id}</uniqueid>
    <runtime>{runtime}</runtime>
</episodedetails>"#,
        title = escape(&item.title),
        plot = escape(&plot),
        aired = item.published.format("%Y-%m-%d"),
        id = escape(&item.id),
        runtime = item.duration_minutes().unwrap_or(0),
    )
}

/// Write the sidecar next to `media_path`, returning its path
pub async fn write_nfo(item: &CandidateItem, media_path: &Path) -> Result<PathBuf> {
    let path = nfo_path(media_path);
    tokio::fs::write(&path, render_nfo(item)).await?;
    debug!(?path, video_id = %item.id, "created NFO file");
    Ok(path)
}
