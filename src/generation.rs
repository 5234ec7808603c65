//! Generation tokens scoping one preload round.
//!
//! The coordinator owns a single counter. Starting a round bumps it, which
//! makes every token handed out earlier stale. Tokens are immutable and only
//! ever compared against the live counter; cancellation is cooperative.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    current: Arc<AtomicU64>,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes the current round and returns a token for the new one.
    pub fn begin_new_round(&self) -> RoundToken {
        let id = self.current.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        trace!(generation = id, "Started preload round");
        RoundToken {
            id,
            current: Arc::clone(&self.current),
        }
    }
}

/// Captured at dispatch, checked before and after each decode.
#[derive(Debug, Clone)]
pub struct RoundToken {
    id: u64,
    current: Arc<AtomicU64>,
}

impl RoundToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.id
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_current()
    }
}
