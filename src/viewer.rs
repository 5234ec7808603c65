//! Navigation controller.
//!
//! Owns the media list and the current position. Every position change
//! starts a new preload round: the previous round's token goes stale, the
//! target is resolved synchronously for display, and the neighbours are
//! queued for background decoding.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::ViewerConfig;
use crate::decoder::{Decode, DecodeMode, SharedImage};
use crate::error::{Result, ViewerError};
use crate::generation::{CancellationCoordinator, RoundToken};
use crate::media::{wrap_index, MediaKind, MediaList};
use crate::preload::{PreloadOutcome, PreloadRound, PreloadScheduler};
use crate::refresh::{FullResRefresher, RefreshResult};

/// Where resolved media ends up. Rendering and video playback live behind
/// this trait.
pub trait DisplaySurface {
    fn show(&mut self, image: SharedImage);
    fn show_video_at(&mut self, path: &Path);
    /// The current item could not be decoded.
    fn show_unavailable(&mut self, path: &Path);
    /// The list is empty.
    fn clear(&mut self);
}

pub struct Viewer<D: DisplaySurface> {
    config: ViewerConfig,
    list: MediaList,
    position: Option<usize>,
    cache: Arc<CacheStore>,
    coordinator: CancellationCoordinator,
    scheduler: PreloadScheduler,
    refresher: FullResRefresher,
    decoder: Arc<dyn Decode>,
    display: D,
    round: Option<PreloadRound>,
}

impl<D: DisplaySurface> Viewer<D> {
    pub fn new(config: ViewerConfig, decoder: Arc<dyn Decode>, display: D) -> Result<Self> {
        let cache = Arc::new(CacheStore::new(config.cache_capacity, config.radius));
        let scheduler = PreloadScheduler::new(
            config.max_concurrent,
            config.radius,
            Arc::clone(&cache),
            Arc::clone(&decoder),
        )?;
        let refresher = FullResRefresher::new(Arc::clone(&cache), Arc::clone(&decoder))?;

        Ok(Self {
            config,
            list: MediaList::default(),
            position: None,
            cache,
            coordinator: CancellationCoordinator::new(),
            scheduler,
            refresher,
            decoder,
            display,
            round: None,
        })
    }

    /// Scans `folder` and opens `start`.
    ///
    /// On `NotFound` the list stays loaded with nothing selected; callers
    /// usually follow up with [`Viewer::jump_to`]`(0)`.
    pub fn select_initial(&mut self, folder: &Path, start: &Path) -> Result<usize> {
        let list = MediaList::scan(folder)?;
        self.select_in(list, start)
    }

    /// Like [`Viewer::select_initial`] for an already scanned list.
    pub fn select_in(&mut self, list: MediaList, start: &Path) -> Result<usize> {
        self.coordinator.begin_new_round();
        self.list = list;
        self.position = None;
        self.round = None;
        self.cache.reindex(&self.list, None);

        let index = self.list.position_of(start)?;
        info!(?start, index, total = self.list.len(), "Opened media list");
        self.go_to(index);
        Ok(index)
    }

    /// Selects `index`, clamped into the list.
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        if self.list.is_empty() {
            return Err(ViewerError::NoSelection);
        }
        let index = index.min(self.list.len() - 1);
        self.go_to(index);
        Ok(())
    }

    /// Moves `step` positions, wrapping at both ends. No-op on an empty list.
    pub fn navigate(&mut self, step: isize) {
        if self.list.is_empty() {
            return;
        }
        let from = self.position.unwrap_or(0);
        let index = wrap_index(from, step, self.list.len());
        debug!(from, to = index, step, "Navigate");
        self.go_to(index);
    }

    /// Deletes the current file from disk and from the list.
    ///
    /// The file is removed first; if that fails nothing in memory changes.
    pub fn delete_current(&mut self) -> Result<PathBuf> {
        let index = self
            .position
            .filter(|i| *i < self.list.len())
            .ok_or(ViewerError::NoSelection)?;
        let path = self
            .list
            .get(index)
            .map(Path::to_path_buf)
            .ok_or(ViewerError::NoSelection)?;

        std::fs::remove_file(&path).map_err(|source| ViewerError::Storage {
            path: path.clone(),
            source,
        })?;
        info!(?path, "Deleted file");

        self.list.remove(index);
        self.cache.remove(&path);

        if self.list.is_empty() {
            self.coordinator.begin_new_round();
            self.position = None;
            self.round = None;
            self.cache.reindex(&self.list, None);
            self.display.clear();
            return Ok(path);
        }

        let index = index.min(self.list.len() - 1);
        self.coordinator.begin_new_round();
        self.cache.reindex(&self.list, Some(index));
        self.go_to(index);
        Ok(path)
    }

    fn go_to(&mut self, index: usize) {
        self.position = Some(index);

        // Recentering takes the cache's write lock after the bump, so once it
        // returns no insert from the old round can still be in progress.
        let token = self.coordinator.begin_new_round();
        self.cache.recenter(index);

        self.resolve(index, &token);
        self.round = Some(self.scheduler.schedule_preload(index, &self.list, token));
    }

    fn resolve(&mut self, index: usize, token: &RoundToken) {
        let Some(path) = self.list.get(index).map(Path::to_path_buf) else {
            self.display.clear();
            return;
        };

        if let Some(image) = self.cache.get(&path) {
            debug!(?path, index, "Cache hit");
            self.display.show(image);
            return;
        }

        if MediaKind::of(&path) == Some(MediaKind::Video) {
            self.display.show_video_at(&path);
            return;
        }

        let mode = DecodeMode::Preview {
            max_width: self.config.preview_width,
        };
        match self.decoder.decode(&path, mode) {
            Ok(preview) => {
                self.display.show(Arc::new(preview));
                self.refresher.request(index, path, token.clone());
            }
            Err(e) => {
                warn!(?path, error = %e, "No image available");
                self.display.show_unavailable(&path);
            }
        }
    }

    /// Applies finished full-resolution refreshes. Returns how many were
    /// shown.
    pub fn pump(&mut self) -> usize {
        let results = self.refresher.poll();
        results
            .into_iter()
            .filter(|result| self.apply_refresh(result))
            .count()
    }

    /// Waits for the next full-resolution refresh and applies it.
    pub fn wait_for_refresh(&mut self, timeout: Duration) -> bool {
        match self.refresher.wait(timeout) {
            Some(result) => self.apply_refresh(&result),
            None => false,
        }
    }

    fn apply_refresh(&mut self, result: &RefreshResult) -> bool {
        let still_shown = self.position == Some(result.index)
            && result.token.is_current()
            && self.list.get(result.index) == Some(result.path.as_path());
        if still_shown {
            self.display.show(Arc::clone(&result.image));
        }
        still_shown
    }

    /// Waits for the latest preload round to settle.
    pub fn wait_for_preload(&self, timeout: Duration) -> Vec<PreloadOutcome> {
        self.round
            .as_ref()
            .map(|round| round.wait(timeout))
            .unwrap_or_default()
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.position.and_then(|i| self.list.get(i))
    }

    pub fn list(&self) -> &MediaList {
        &self.list
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn current_round(&self) -> Option<&PreloadRound> {
        self.round.as_ref()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }
}
