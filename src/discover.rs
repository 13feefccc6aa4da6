use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{RepeciError, Result};

/// Lists the files below `root` whose extension matches, ignoring case.
/// Entries that cannot be read are logged and passed over. The result is
/// sorted so that imports run in a stable order.
pub fn discover(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(RepeciError::InvalidArgument(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    let extension = extension.trim_start_matches('.');
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    files.sort();
    tracing::debug!(root = %root.display(), files = files.len(), "discovered record files");
    Ok(files)
}
