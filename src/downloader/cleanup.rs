//! Removal of partial download artifacts

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, info, warn};

/// Suffixes of files left behind by interrupted downloads
pub const PARTIAL_SUFFIXES: &[&str] = &["part", "tmp", "ytdl"];

/// Recursively delete partial download files under `root`
///
/// Best effort: unreadable directories and failed deletions are logged and skipped.
/// Returns the number of files removed.
pub async fn cleanup_partial_downloads(root: &Path) -> usize {
    if fs::metadata(root).await.is_err() {
        debug!(?root, "library root does not exist, skipping cleanup");
        return 0;
    }

    let mut files_to_delete = Vec::new();
    collect_partial_files(root, &mut files_to_delete).await;

    let mut removed = 0;
    for file in &files_to_delete {
        match fs::remove_file(file).await {
            Ok(()) => {
                debug!(?file, "cleaned up partial download");
                removed += 1;
            }
            Err(e) => {
                warn!(?file, error = %e, "failed to delete partial download");
            }
        }
    }

    if removed > 0 {
        info!(removed, "cleaned up partial download files");
    }
    removed
}

/// Whether a file name ends in one of the [`PARTIAL_SUFFIXES`]
pub fn is_partial_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PARTIAL_SUFFIXES.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

fn collect_partial_files<'a>(
    path: &'a Path,
    files_to_delete: &'a mut Vec<PathBuf>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(?path, error = %e, "failed to read directory during cleanup");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let entry_path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(_) => continue,
            };

            if file_type.is_file() && is_partial_file(&entry_path) {
                files_to_delete.push(entry_path);
            } else if file_type.is_dir() {
                collect_partial_files(&entry_path, files_to_delete).await;
            }
        }
    })
}
