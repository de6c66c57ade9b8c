use std::path::{Path, PathBuf};

/// Regular files in `dir` whose name starts with `prefix`, sorted by name.
pub async fn list_with_prefix(dir: &Path, prefix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut out = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let is_match = entry.file_name().to_str().is_some_and(|n| n.starts_with(prefix));
        if is_match && entry.file_type().await?.is_file() {
            out.push(entry.path());
        }
    }

    out.sort();
    Ok(out)
}

/// Delete every regular file in `dir`. Errors are logged, never returned.
pub async fn clear(dir: &Path) {
    let files = match staged_files(dir).await {
        Ok(files) => files,
        Err(e) => {
            metrics::counter!("staging_cleanup_errors_total").increment(1);
            tracing::error!(dir = %dir.display(), error = %e, "failed to clear staging directory");
            return;
        }
    };

    let (removed, failed) = remove_each(&files).await;
    if failed > 0 {
        tracing::warn!(dir = %dir.display(), removed, failed, "staging directory partly cleared");
    } else {
        tracing::info!(dir = %dir.display(), removed, "staging directory cleared");
    }
}

async fn staged_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut out = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            out.push(entry.path());
        }
    }

    Ok(out)
}

/// Remove each path, carrying on past failures. Returns `(removed, failed)`.
async fn remove_each(paths: &[PathBuf]) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => removed += 1,
            Err(e) => {
                failed += 1;
                metrics::counter!("staging_cleanup_errors_total").increment(1);
                tracing::error!(file = %path.display(), error = %e, "failed to remove staged file");
            }
        }
    }

    (removed, failed)
}
