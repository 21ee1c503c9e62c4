//! File catalog
//!
//! The catalog is read from disk every time it is needed; nothing is cached.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Names of the regular files in `dir`, sorted
///
/// A missing or unreadable directory yields an empty catalog.
pub async fn list_files(dir: &Path) -> Vec<String> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read file directory {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_file = entry
                    .file_type()
                    .await
                    .map(|t| t.is_file())
                    .unwrap_or(false);
                if !is_file {
                    continue;
                }
                match entry.file_name().into_string() {
                    Ok(name) => names.push(name),
                    Err(name) => debug!("Skipping non UTF-8 file name {:?}", name),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error while listing {:?}: {}", dir, e);
                break;
            }
        }
    }

    names.sort();
    names
}

/// Resolve a requested name to a regular file inside `root`
///
/// Only bare file names are accepted. The joined path is canonicalized and
/// must still lie under the canonical root, so symlinks cannot escape it.
pub async fn resolve_file(root: &Path, name: &str) -> Option<PathBuf> {
    if !is_plain_name(name) {
        debug!("Refusing file name {:?}", name);
        return None;
    }

    let root = fs::canonicalize(root).await.ok()?;
    let path = fs::canonicalize(root.join(name)).await.ok()?;
    if !path.starts_with(&root) {
        warn!("Refusing {:?}: resolves outside {:?}", name, root);
        return None;
    }

    let metadata = fs::metadata(&path).await.ok()?;
    metadata.is_file().then_some(path)
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c| matches!(c, '/' | '\\' | '\0'))
}
