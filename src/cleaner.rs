/* src/cleaner.rs */

use fancy_log::{LogLevel, log};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Deletes every regular file below `output_dir`, leaving directories in place.
/// Failures are logged and skipped. Returns the number of files removed.
pub async fn clean_all(output_dir: &Path) -> usize {
    log(
        LogLevel::Info,
        &format!("Cleaning dns zone files from {}", output_dir.display()),
    );

    if !fs::metadata(output_dir).await.is_ok_and(|m| m.is_dir()) {
        return 0;
    }

    let files = collect_files(output_dir).await;
    remove_files(&files).await
}

// Walks the tree with an explicit stack; unreadable directories are skipped.
async fn collect_files(output_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending: Vec<PathBuf> = vec![output_dir.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                log(
                    LogLevel::Warn,
                    &format!("Cannot read {}: {}", dir.display(), e),
                );
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    log(
                        LogLevel::Warn,
                        &format!("Cannot list {}: {}", dir.display(), e),
                    );
                    break;
                }
            };
            let path = entry.path();
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => pending.push(path),
                Ok(kind) if kind.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => log(
                    LogLevel::Warn,
                    &format!("Cannot stat {}: {}", path.display(), e),
                ),
            }
        }
    }

    files
}

async fn remove_files(files: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in files {
        match fs::remove_file(path).await {
            Ok(()) => {
                log(LogLevel::Debug, &format!("Removed {}", path.display()));
                removed += 1;
            }
            Err(e) => log(
                LogLevel::Warn,
                &format!("Failed to remove {}: {}", path.display(), e),
            ),
        }
    }
    removed
}
