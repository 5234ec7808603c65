//! Background preloading of the images around the current position.
//!
//! - Fixed pool of worker threads fed from a flume channel; the pool size is
//!   the admission gate, so at most that many decodes run at once
//! - Each job carries the round token captured at dispatch and checks it
//!   before and after decoding; stale results are dropped, not reported as
//!   errors
//! - Failed decodes are logged and skipped
//! - Outcomes are sent back on a per-round channel so a caller can wait for
//!   a round to settle

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::cache::CacheStore;
use crate::decoder::{Decode, DecodeError, DecodeMode, SharedImage};
use crate::error::{Result, ViewerError};
use crate::generation::RoundToken;
use crate::media::{wrap_index, MediaKind, MediaList};

/// Terminal state of one preload job.
#[derive(Debug)]
pub enum TaskState {
    Completed(SharedImage),
    Failed(DecodeError),
    Cancelled,
}

#[derive(Debug)]
pub struct PreloadOutcome {
    pub path: PathBuf,
    pub state: TaskState,
}

impl PreloadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.state, TaskState::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, TaskState::Cancelled)
    }
}

struct PreloadJob {
    path: PathBuf,
    token: RoundToken,
    reply: Sender<PreloadOutcome>,
}

/// Handle on the jobs dispatched for one round.
pub struct PreloadRound {
    candidates: Vec<PathBuf>,
    dispatched: Vec<PathBuf>,
    outcomes: Receiver<PreloadOutcome>,
}

impl PreloadRound {
    /// Neighbours considered for this round, nearest first.
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Candidates that were actually queued for decoding.
    pub fn dispatched(&self) -> &[PathBuf] {
        &self.dispatched
    }

    /// Collects outcomes until every dispatched job reported or `timeout`
    /// elapsed.
    pub fn wait(&self, timeout: Duration) -> Vec<PreloadOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = Vec::with_capacity(self.dispatched.len());
        while outcomes.len() < self.dispatched.len() {
            match self.outcomes.recv_deadline(deadline) {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => break,
            }
        }
        outcomes
    }
}

/// Neighbour paths within `radius` of `center`, alternating forward and
/// backward and wrapping at both ends. The centre itself and duplicates on
/// short lists are left out.
pub fn preload_candidates(center: usize, radius: usize, list: &MediaList) -> Vec<PathBuf> {
    let len = list.len();
    // Distances past len / 2 only revisit indices already covered.
    let reach = radius.min(len / 2);
    let mut candidates: Vec<PathBuf> = Vec::with_capacity(reach * 2);

    for distance in 1..=reach as isize {
        for index in [
            wrap_index(center, distance, len),
            wrap_index(center, -distance, len),
        ] {
            if index == center {
                continue;
            }
            if let Some(path) = list.get(index) {
                if !candidates.iter().any(|p| p == path) {
                    candidates.push(path.to_path_buf());
                }
            }
        }
    }
    candidates
}

pub struct PreloadScheduler {
    request_tx: Sender<PreloadJob>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    /// Queued or running paths, tagged with the round that queued them.
    pending: Arc<Mutex<HashMap<PathBuf, u64>>>,
    cache: Arc<CacheStore>,
    radius: usize,
}

impl PreloadScheduler {
    pub fn new(
        workers: usize,
        radius: usize,
        cache: Arc<CacheStore>,
        decoder: Arc<dyn Decode>,
    ) -> Result<Self> {
        let num_workers = workers.max(1);
        let (request_tx, request_rx) = flume::unbounded::<PreloadJob>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(Mutex::new(HashMap::new()));

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let rx = request_rx.clone();
            let shutdown = Arc::clone(&shutdown);
            let pending = Arc::clone(&pending);
            let cache = Arc::clone(&cache);
            let decoder = Arc::clone(&decoder);

            let handle = thread::Builder::new()
                .name(format!("preload-{}", worker_id))
                .spawn(move || {
                    worker_loop(worker_id, rx, shutdown, pending, cache, decoder);
                })
                .map_err(ViewerError::Spawn)?;
            handles.push(handle);
        }

        debug!(num_workers, radius, "Started preload workers");

        Ok(Self {
            request_tx,
            workers: handles,
            shutdown,
            pending,
            cache,
            radius,
        })
    }

    /// Queues decodes for the uncached neighbours of `center`.
    ///
    /// `list` is snapshotted into the jobs; later list mutations are caught by
    /// the cache's membership check at insert time.
    pub fn schedule_preload(
        &self,
        center: usize,
        list: &MediaList,
        token: RoundToken,
    ) -> PreloadRound {
        let candidates = preload_candidates(center, self.radius, list);
        let (reply_tx, reply_rx) = flume::unbounded();
        let mut dispatched = Vec::with_capacity(candidates.len());

        for path in &candidates {
            if MediaKind::of(path) == Some(MediaKind::Video) {
                trace!(?path, "Skipping video candidate");
                continue;
            }
            if self.cache.contains(path) {
                trace!(?path, "Already cached");
                continue;
            }

            {
                let mut pending = self.pending.lock();
                if pending.get(path) == Some(&token.id()) {
                    trace!(?path, "Already queued for this round");
                    continue;
                }
                pending.insert(path.clone(), token.id());
            }

            let job = PreloadJob {
                path: path.clone(),
                token: token.clone(),
                reply: reply_tx.clone(),
            };
            if self.request_tx.send(job).is_err() {
                error!("Preload queue disconnected");
                self.pending.lock().remove(path);
                break;
            }
            dispatched.push(path.clone());
        }

        debug!(
            generation = token.id(),
            center,
            candidates = candidates.len(),
            dispatched = dispatched.len(),
            pending = self.pending_count(),
            "Scheduled preload round"
        );

        PreloadRound {
            candidates,
            dispatched,
            outcomes: reply_rx,
        }
    }

    /// Number of queued or running jobs across all rounds.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("Preload workers stopped");
    }
}

impl Drop for PreloadScheduler {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Receiver<PreloadJob>,
    shutdown: Arc<AtomicBool>,
    pending: Arc<Mutex<HashMap<PathBuf, u64>>>,
    cache: Arc<CacheStore>,
    decoder: Arc<dyn Decode>,
) {
    trace!(worker_id, "Preload worker started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                let state = run_job(&job, &cache, decoder.as_ref());

                {
                    let mut pending = pending.lock();
                    if pending.get(&job.path) == Some(&job.token.id()) {
                        pending.remove(&job.path);
                    }
                }

                let _ = job.reply.send(PreloadOutcome {
                    path: job.path,
                    state,
                });
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    trace!(worker_id, "Preload worker stopped");
}

fn run_job(job: &PreloadJob, cache: &CacheStore, decoder: &dyn Decode) -> TaskState {
    let generation = job.token.id();
    if job.token.is_cancelled() {
        trace!(?job.path, generation, "Preload cancelled before decode");
        return TaskState::Cancelled;
    }

    let image = match decoder.decode(&job.path, DecodeMode::Full) {
        Ok(image) => Arc::new(image),
        Err(e) => {
            warn!(?job.path, error = %e, "Preload decode failed");
            return TaskState::Failed(e);
        }
    };

    if job.token.is_cancelled() {
        trace!(?job.path, generation, "Preload result discarded");
        return TaskState::Cancelled;
    }

    match cache.insert_for_round(job.path.clone(), Arc::clone(&image), &job.token) {
        Ok(_) => TaskState::Completed(image),
        Err(rejection) => {
            trace!(?job.path, generation, ?rejection, "Preload insert refused");
            TaskState::Cancelled
        }
    }
}
