use crate::error::SortError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Lists the image files under `root` whose extension is in `extensions`.
///
/// Non-recursive scans only look at the immediate entries of `root`; recursive
/// scans walk the whole tree and follow symbolic links. Unreadable entries are
/// skipped with a warning. A file reachable through several links is listed
/// once, under the first path the walk reaches it by. Paths come back absolute
/// and sorted by file name per directory, which gives later stages a stable
/// scan order.
pub fn scan_image_files(
    root: &Path,
    recursive: bool,
    extensions: &[String],
) -> Result<Vec<PathBuf>, SortError> {
    let root = fs::canonicalize(root).map_err(|_| SortError::PathNotFound {
        path: root.to_path_buf(),
    })?;
    if !root.is_dir() {
        return Err(SortError::PathNotFound { path: root });
    }

    let extensions = normalize_extensions(extensions);
    let mut walker = WalkDir::new(&root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut skipped = 0usize;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let at = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                warn!(path = %at, error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !has_allowed_extension(path, &extensions) {
            skipped += 1;
            continue;
        }

        let physical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !seen.insert(physical) {
            debug!(path = %path.display(), "already found through another link");
            continue;
        }
        debug!(path = %path.display(), "found image");
        out.push(path.to_path_buf());
    }

    info!(
        root = %root.display(),
        recursive,
        found = out.len(),
        skipped,
        "scan finished"
    );
    Ok(out)
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    let source: Vec<String> = if extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|v| v.to_string()).collect()
    } else {
        extensions.to_vec()
    };
    source
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}
