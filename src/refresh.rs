//! Full-resolution refresh of the visible image.
//!
//! Navigation shows a quick preview first. A single worker then decodes the
//! full image, keeping only the latest request when several pile up, and
//! hands the result back to the controller thread, which swaps it in only if
//! the same index is still displayed.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::cache::CacheStore;
use crate::decoder::{Decode, DecodeMode, SharedImage};
use crate::error::{Result, ViewerError};
use crate::generation::RoundToken;

struct RefreshRequest {
    index: usize,
    path: PathBuf,
    token: RoundToken,
}

/// A finished full-resolution decode for a displayed index.
pub struct RefreshResult {
    pub index: usize,
    pub path: PathBuf,
    pub token: RoundToken,
    pub image: SharedImage,
}

pub struct FullResRefresher {
    request_tx: Option<Sender<RefreshRequest>>,
    result_rx: Receiver<RefreshResult>,
    worker: Option<JoinHandle<()>>,
}

impl FullResRefresher {
    pub fn new(cache: Arc<CacheStore>, decoder: Arc<dyn Decode>) -> Result<Self> {
        let (request_tx, request_rx) = flume::unbounded::<RefreshRequest>();
        let (result_tx, result_rx) = flume::unbounded::<RefreshResult>();

        let worker = thread::Builder::new()
            .name("full-res".into())
            .spawn(move || {
                while let Ok(mut req) = request_rx.recv() {
                    while let Ok(next) = request_rx.try_recv() {
                        req = next;
                    }

                    if req.token.is_cancelled() {
                        continue;
                    }

                    let image = match decoder.decode(&req.path, DecodeMode::Full) {
                        Ok(image) => Arc::new(image),
                        Err(e) => {
                            warn!(path = ?req.path, error = %e, "Full-resolution decode failed");
                            continue;
                        }
                    };

                    if let Err(rejection) =
                        cache.insert_for_round(req.path.clone(), Arc::clone(&image), &req.token)
                    {
                        trace!(path = ?req.path, ?rejection, "Dropping full-resolution result");
                        continue;
                    }

                    let result = RefreshResult {
                        index: req.index,
                        path: req.path,
                        token: req.token,
                        image,
                    };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
                debug!("Full-resolution worker stopped");
            })
            .map_err(ViewerError::Spawn)?;

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            worker: Some(worker),
        })
    }

    pub fn request(&self, index: usize, path: PathBuf, token: RoundToken) {
        if let Some(tx) = &self.request_tx {
            let _ = tx.send(RefreshRequest { index, path, token });
        }
    }

    /// Drains finished results without blocking.
    pub fn poll(&self) -> Vec<RefreshResult> {
        self.result_rx.try_iter().collect()
    }

    /// Blocks for the next finished result.
    pub fn wait(&self, timeout: Duration) -> Option<RefreshResult> {
        self.result_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for FullResRefresher {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.request_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
