//! Markdown file discovery.

use anyhow::Result;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names never scanned: dependency managers and version control.
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git"];

/// Scan filters applied while walking the repository.
#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Relative prefix holding a checkout of the published branch.
    pub reserved_prefix: Option<PathBuf>,
    /// Relative or absolute output directory of the current run.
    pub output_dir: Option<PathBuf>,
    /// Extra directory names to skip anywhere in the tree.
    pub extra_excludes: Vec<String>,
}

impl DiscoverOptions {
    fn is_excluded(&self, root: &Path, entry: &DirEntry) -> bool {
        let Ok(rel) = entry.path().strip_prefix(root) else {
            return false;
        };

        let excluded_name = rel.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_some_and(|n| {
                EXCLUDED_DIRS.contains(&n) || self.extra_excludes.iter().any(|e| e == n)
            }),
            _ => false,
        });
        if excluded_name {
            return true;
        }

        if let Some(prefix) = &self.reserved_prefix
            && rel.starts_with(prefix)
        {
            return true;
        }

        match &self.output_dir {
            Some(out) if out.is_absolute() => entry.path() == out,
            Some(out) => rel.starts_with(out),
            None => false,
        }
    }
}

/// Whether path has a `.md` extension.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

/// Finds Markdown files below `root`.
///
/// Returned paths are relative to `root` and sorted. Unreadable entries are
/// logged and skipped, so an empty vector is the only "nothing found"
/// signal.
///
/// # Errors
///
/// Currently infallible.
pub fn find_markdown_files(root: impl AsRef<Path>, options: &DiscoverOptions) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !options.is_excluded(root, e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }

        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_path_buf());
        }
    }

    files.sort();

    debug!(count = files.len(), "markdown files discovered");
    for file in &files {
        debug!("  - {}", file.display());
    }

    Ok(files)
}
