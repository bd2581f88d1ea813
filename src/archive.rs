use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tar::Builder;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::ArchiveConfig;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },

    #[error("failed to add {path} to archive: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to finish archive: {0}")]
    Finish(#[from] std::io::Error),
}

/// Decides which files of a project tree end up in the archive
#[derive(Debug, Clone, Default)]
pub struct ArchiveFilter {
    exclude_dirs: HashSet<OsString>,
    exclude_extensions: HashSet<OsString>,
    exclude_files: HashSet<OsString>,
    /// Root-relative subtrees skipped as a whole
    exclude_subtrees: Vec<PathBuf>,
}

impl ArchiveFilter {
    pub fn new<D, E, F>(exclude_dirs: D, exclude_extensions: E, exclude_files: F) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            exclude_dirs: exclude_dirs.into_iter().map(|d| OsString::from(d.into())).collect(),
            // Stored without the leading dot, matching `Path::extension`
            exclude_extensions: exclude_extensions
                .into_iter()
                .map(|ext| {
                    let ext: String = ext.into();
                    OsString::from(ext.trim_start_matches('.'))
                })
                .collect(),
            exclude_files: exclude_files.into_iter().map(|f| OsString::from(f.into())).collect(),
            exclude_subtrees: Vec::new(),
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(
            config.exclude_dirs.iter().cloned(),
            config.exclude_extensions.iter().cloned(),
            config.exclude_files.iter().cloned(),
        )
    }

    /// Also skip `dir` when it lives under `root`. Both must exist.
    pub fn excluding_dir_under(mut self, root: &Path, dir: &Path) -> Self {
        let (Ok(root), Ok(dir)) = (root.canonicalize(), dir.canonicalize()) else {
            return self;
        };
        match dir.strip_prefix(&root) {
            Ok(relative) if !relative.as_os_str().is_empty() => {
                debug!(dir = %relative.display(), "Excluding directory from archive");
                self.exclude_subtrees.push(relative.to_path_buf());
            }
            // The whole root would be excluded; keep the name-based rules only
            _ => {}
        }
        self
    }

    fn is_excluded_dir(&self, relative: &Path) -> bool {
        relative.file_name().is_some_and(|name| self.exclude_dirs.contains(name))
            || self.exclude_subtrees.iter().any(|sub| relative.starts_with(sub))
    }

    /// Whether the file at `relative` (relative to the archive root) is kept
    pub fn includes(&self, relative: &Path) -> bool {
        let Some(file_name) = relative.file_name() else {
            return false;
        };
        if self.exclude_files.contains(file_name) {
            return false;
        }

        if let Some(ext) = relative.extension() {
            if self.exclude_extensions.contains(ext) {
                return false;
            }
        }

        if self.exclude_subtrees.iter().any(|sub| relative.starts_with(sub)) {
            return false;
        }

        let in_excluded_dir = relative
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .any(|c| match c {
                Component::Normal(name) => self.exclude_dirs.contains(name),
                _ => false,
            });
        !in_excluded_dir
    }
}

/// Walk `root` and pack every file the filter keeps into a gzip-compressed
/// tar archive held in memory. Entry names are relative to `root`.
pub fn build_project_archive(root: &Path, filter: &ArchiveFilter) -> Result<Vec<u8>, ArchiveError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    let mut files = 0usize;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry
                    .path()
                    .strip_prefix(root)
                    .is_ok_and(|relative| filter.is_excluded_dir(relative))
        });

    for entry in walker {
        let entry = entry.map_err(|source| ArchiveError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if !filter.includes(relative) {
            debug!(path = %relative.display(), "Skipping excluded file");
            continue;
        }

        builder
            .append_path_with_name(entry.path(), relative)
            .map_err(|source| ArchiveError::Append {
                path: entry.path().to_path_buf(),
                source,
            })?;
        files += 1;
    }

    let bytes = builder.into_inner()?.finish()?;

    info!(root = %root.display(), files, bytes = bytes.len(), "Project archive built");
    Ok(bytes)
}
