//! Test decoders that never touch the disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use parking_lot::Mutex;

use crate::decoder::{Decode, DecodeError, DecodeMode, DecodedImage};

/// Returns a 4x2 image for every path, optionally sleeping first, and records
/// call counts and peak concurrency.
#[derive(Default)]
pub struct StubDecoder {
    delay: Duration,
    failing: HashSet<PathBuf>,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: Mutex<Vec<(PathBuf, DecodeMode)>>,
}

impl StubDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    pub fn full_decodes_of(&self, path: &Path) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(p, mode)| p == path && mode.is_full())
            .count()
    }

    pub fn full_decode_count(&self) -> usize {
        self.calls.lock().iter().filter(|(_, m)| m.is_full()).count()
    }
}

impl Decode for StubDecoder {
    fn decode(&self, path: &Path, mode: DecodeMode) -> Result<DecodedImage, DecodeError> {
        self.calls.lock().push((path.to_path_buf(), mode));
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(path) {
            return Err(DecodeError::UnsupportedFormat(path.to_path_buf()));
        }
        Ok(DecodedImage::new(RgbaImage::new(4, 2), 4, 2, mode))
    }
}

/// Blocks inside `decode` until released, announcing each entry.
pub struct GateDecoder {
    entered: flume::Sender<PathBuf>,
    release: flume::Receiver<()>,
    pub calls: AtomicUsize,
}

impl GateDecoder {
    /// Returns the decoder, a receiver of entered paths and the release
    /// handle. Dropping the handle lets every blocked decode finish.
    pub fn new() -> (Arc<Self>, flume::Receiver<PathBuf>, flume::Sender<()>) {
        let (entered_tx, entered_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        let decoder = Arc::new(Self {
            entered: entered_tx,
            release: release_rx,
            calls: AtomicUsize::new(0),
        });
        (decoder, entered_rx, release_tx)
    }
}

impl Decode for GateDecoder {
    fn decode(&self, path: &Path, mode: DecodeMode) -> Result<DecodedImage, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.entered.send(path.to_path_buf());
        let _ = self.release.recv();
        Ok(DecodedImage::new(RgbaImage::new(1, 1), 1, 1, mode))
    }
}
