//! The ordered list of media files in one folder.
//!
//! Scanning is non-recursive and keeps files whose extension is on the
//! allow-list (case-insensitive). Entries are sorted by file name so the
//! listing order is stable between scans.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::task;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ViewerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "bmp" | "gif" => Some(Self::Image),
            "mp4" | "avi" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn of(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Index reached by moving `step` positions from `position`, wrapping in
/// both directions. `len` must be non-zero.
pub fn wrap_index(position: usize, step: isize, len: usize) -> usize {
    debug_assert!(len > 0);
    let len = len as i128;
    (position as i128 + step as i128).rem_euclid(len) as usize
}

/// Ordered, duplicate-free sequence of media paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaList {
    paths: Vec<PathBuf>,
}

impl MediaList {
    /// Build a list from paths, dropping later duplicates.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let mut seen = HashSet::with_capacity(paths.len());
        let paths = paths
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();
        Self { paths }
    }

    /// Lists `folder` for supported media files.
    pub fn scan(folder: &Path) -> Result<Self> {
        info!(?folder, "Scanning folder");

        let walker = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(ViewerError::Scan {
                        path: folder.to_path_buf(),
                        source: e.into(),
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable entry in {:?}: {}", folder, e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            if MediaKind::of(entry.path()).is_some() {
                paths.push(entry.into_path());
            }
        }

        info!("Found {} media files", paths.len());
        Ok(Self::new(paths))
    }

    /// Runs [`MediaList::scan`] on the blocking pool.
    pub async fn scan_async(folder: PathBuf) -> Result<Self> {
        let path = folder.clone();
        task::spawn_blocking(move || Self::scan(&folder))
            .await
            .map_err(|e| {
                warn!("Scan task panicked: {}", e);
                ViewerError::Scan {
                    path,
                    source: std::io::Error::other(e),
                }
            })?
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(PathBuf::as_path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Position of `path`, or `NotFound`.
    pub fn position_of(&self, path: &Path) -> Result<usize> {
        self.paths
            .iter()
            .position(|p| p == path)
            .ok_or_else(|| ViewerError::NotFound(path.to_path_buf()))
    }

    /// Removes and returns the path at `index`.
    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        if index >= self.paths.len() {
            return None;
        }
        let removed = self.paths.remove(index);
        debug!(?removed, index, remaining = self.paths.len(), "Removed from media list");
        Some(removed)
    }
}
