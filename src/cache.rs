//! In-memory store of decoded images around the current position.
//!
//! - Bounded by entry count, not bytes
//! - Entries within `radius` list positions of the current index are never
//!   evicted, so the store may exceed capacity while they pile up
//! - Insert and eviction happen in one write section; lookups only take the
//!   read lock and have no side effects
//!
//! Eviction walks entries from the oldest insertion to the newest and drops
//! the first non-adjacent ones until the store is back at capacity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::decoder::SharedImage;
use crate::generation::RoundToken;
use crate::media::MediaList;

/// Why a round-scoped insert was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The round was superseded by a navigation.
    Stale,
    /// The path left the media list while the decode was running.
    Removed,
}

struct CacheInner {
    entries: LruCache<PathBuf, SharedImage>,
    /// Index of each listed path, used for O(1) proximity checks.
    positions: HashMap<PathBuf, usize>,
    center: Option<usize>,
}

impl CacheInner {
    fn is_adjacent(&self, path: &Path, radius: usize) -> bool {
        match (self.positions.get(path), self.center) {
            (Some(&index), Some(center)) => index.abs_diff(center) <= radius,
            _ => false,
        }
    }

    fn evict(&mut self, capacity: usize, radius: usize) -> Vec<PathBuf> {
        let count = self.entries.len();
        if count <= capacity {
            return Vec::new();
        }

        let victims: Vec<PathBuf> = self
            .entries
            .iter()
            .rev()
            .map(|(path, _)| path)
            .filter(|path| !self.is_adjacent(path, radius))
            .take(count - capacity)
            .cloned()
            .collect();

        for path in &victims {
            self.entries.pop(path);
        }

        if self.entries.len() > capacity {
            debug!(
                entries = self.entries.len(),
                capacity, "Cache over capacity with only adjacent entries left"
            );
        }
        victims
    }
}

pub struct CacheStore {
    capacity: usize,
    radius: usize,
    inner: RwLock<CacheInner>,
}

impl CacheStore {
    pub fn new(capacity: usize, radius: usize) -> Self {
        Self {
            capacity,
            radius,
            inner: RwLock::new(CacheInner {
                entries: LruCache::unbounded(),
                positions: HashMap::new(),
                center: None,
            }),
        }
    }

    pub fn get(&self, path: &Path) -> Option<SharedImage> {
        self.inner.read().entries.peek(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.read().entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached paths from the oldest insertion to the newest.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.inner
            .read()
            .entries
            .iter()
            .rev()
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Inserts or overwrites `path`, then evicts. Returns evicted paths.
    pub fn insert(&self, path: PathBuf, image: SharedImage) -> Vec<PathBuf> {
        let mut inner = self.inner.write();
        inner.entries.put(path, image);
        let evicted = inner.evict(self.capacity, self.radius);
        if !evicted.is_empty() {
            trace!(?evicted, "Evicted distant images");
        }
        evicted
    }

    /// Inserts on behalf of a preload round.
    ///
    /// The token and the path's membership are re-checked inside the write
    /// section, so a result from a superseded round can never land.
    pub fn insert_for_round(
        &self,
        path: PathBuf,
        image: SharedImage,
        token: &RoundToken,
    ) -> Result<Vec<PathBuf>, Rejection> {
        let mut inner = self.inner.write();
        if token.is_cancelled() {
            return Err(Rejection::Stale);
        }
        if !inner.positions.contains_key(&path) {
            return Err(Rejection::Removed);
        }

        inner.entries.put(path, image);
        Ok(inner.evict(self.capacity, self.radius))
    }

    pub fn remove(&self, path: &Path) -> Option<SharedImage> {
        self.inner.write().entries.pop(path)
    }

    /// Moves the protected window to `center`.
    pub fn recenter(&self, center: usize) {
        self.inner.write().center = Some(center);
    }

    /// Rebuilds the proximity index from `list` and drops entries for paths
    /// that are no longer listed.
    pub fn reindex(&self, list: &MediaList, center: Option<usize>) {
        let mut inner = self.inner.write();
        inner.positions = list
            .paths()
            .iter()
            .enumerate()
            .map(|(index, path)| (path.clone(), index))
            .collect();
        inner.center = center;

        let unlisted: Vec<PathBuf> = inner
            .entries
            .iter()
            .map(|(path, _)| path)
            .filter(|path| !inner.positions.contains_key(*path))
            .cloned()
            .collect();
        for path in &unlisted {
            inner.entries.pop(path);
        }
    }
}
