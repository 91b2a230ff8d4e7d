//! Shared clip distribution
//!
//! The [`ClipDistributor`] is the single meeting point between every source's
//! window assembler and every viewer session. It keeps a FIFO ready queue of
//! fresh clips and a [`ReplayPool`] of recent ones.
//!
//! ## Delivery
//!
//! [`ClipDistributor::next`] hands out the oldest fresh clip when one is
//! pending. When none is pending but the replay pool holds anything, the
//! waiting caller receives a random recent clip instead of stalling. Only when
//! both are empty does the caller suspend until something is published.
//!
//! All state lives behind one mutex, so "queue empty and a consumer is
//! waiting" is decided atomically with the dequeue or replay that follows.
//! Wakeups go through a [`Notify`] that is armed before the state check, so a
//! publish racing with a consumer going to sleep is never missed.

mod pool;

pub use pool::{DEFAULT_REPLAY_CAPACITY, ReplayPool};

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::types::Clip;

/// Default cap on clips waiting for their first delivery
pub const DEFAULT_MAX_READY: usize = 64;

/// Counters describing distributor activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DistributorStats {
    /// Clips accepted by `publish`
    pub published: u64,
    /// Fresh clips handed out from the ready queue
    pub delivered: u64,
    /// Clips handed out from the replay pool
    pub replayed: u64,
    /// Fresh clips discarded because the ready queue was full
    pub dropped: u64,
    /// Fresh clips discarded by an explicit drain
    pub drained: u64,
}

#[derive(Debug)]
struct DistributorState {
    ready: VecDeque<Clip>,
    pool: ReplayPool,
    waiting: usize,
    stats: DistributorStats,
}

impl DistributorState {
    fn take_next(&mut self) -> Option<Clip> {
        if let Some(clip) = self.ready.pop_front() {
            self.stats.delivered += 1;
            return Some(clip);
        }
        let clip = self.pool.sample()?;
        self.stats.replayed += 1;
        trace!(path = %clip.source().display(), window = clip.window(), "Replaying clip");
        Some(clip)
    }
}

/// Process-wide clip sink shared by all sources and sessions
#[derive(Debug)]
pub struct ClipDistributor {
    state: Mutex<DistributorState>,
    notify: Notify,
    max_ready: usize,
}

impl Default for ClipDistributor {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_CAPACITY, DEFAULT_MAX_READY)
    }
}

impl ClipDistributor {
    /// Create a distributor with the given replay pool size and ready-queue cap
    pub fn new(replay_capacity: usize, max_ready: usize) -> Self {
        Self {
            state: Mutex::new(DistributorState {
                ready: VecDeque::new(),
                pool: ReplayPool::new(replay_capacity),
                waiting: 0,
                stats: DistributorStats::default(),
            }),
            notify: Notify::new(),
            max_ready: max_ready.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DistributorState> {
        // State stays consistent across a panicking holder: every mutation is a single push/pop
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a sealed clip for delivery and remember it for replay.
    ///
    /// Never blocks. Empty clips are ignored. When the ready queue is at its
    /// cap the oldest undelivered clip is dropped.
    pub fn publish(&self, clip: Clip) {
        if clip.is_empty() {
            debug!(path = %clip.source().display(), "Ignoring empty clip");
            return;
        }

        {
            let mut state = self.lock();
            if state.ready.len() >= self.max_ready {
                if let Some(stale) = state.ready.pop_front() {
                    state.stats.dropped += 1;
                    warn!(
                        path = %stale.source().display(),
                        window = stale.window(),
                        "Ready queue full, dropping oldest clip"
                    );
                }
            }
            trace!(
                path = %clip.source().display(),
                window = clip.window(),
                frames = clip.len(),
                depth = state.ready.len() + 1,
                "Publishing clip"
            );
            state.ready.push_back(clip.clone());
            state.pool.insert(clip);
            state.stats.published += 1;
        }

        self.notify.notify_waiters();
    }

    /// Get the next clip for a session, waiting if nothing at all is available
    pub async fn next(&self) -> Clip {
        let mut registration: Option<WaitRegistration<'_>> = None;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(clip) = state.take_next() {
                    if let Some(registration) = registration.as_mut() {
                        registration.release(&mut state);
                    }
                    return clip;
                }
                if registration.is_none() {
                    state.waiting += 1;
                    registration = Some(WaitRegistration { distributor: self, active: true });
                }
            }

            notified.await;
        }
    }

    /// Get the next clip without waiting
    pub fn try_next(&self) -> Option<Clip> {
        self.lock().take_next()
    }

    /// Clips awaiting first delivery
    pub fn queue_depth(&self) -> usize {
        self.lock().ready.len()
    }

    /// Sessions currently suspended in [`ClipDistributor::next`]
    pub fn waiting(&self) -> usize {
        self.lock().waiting
    }

    pub fn pool_len(&self) -> usize {
        self.lock().pool.len()
    }

    /// Replay pool contents, oldest first
    pub fn pool_snapshot(&self) -> Vec<Clip> {
        self.lock().pool.iter().cloned().collect()
    }

    pub fn stats(&self) -> DistributorStats {
        self.lock().stats
    }

    /// Discard every clip awaiting first delivery, returning how many were dropped.
    ///
    /// The replay pool is left intact so viewers keep receiving content.
    pub fn drain(&self) -> usize {
        let mut state = self.lock();
        let count = state.ready.len();
        state.ready.clear();
        state.stats.drained += count as u64;
        debug!(count, "Drained ready queue");
        count
    }
}

/// Tracks one suspended consumer; unregisters when `next()` returns or is dropped
struct WaitRegistration<'a> {
    distributor: &'a ClipDistributor,
    active: bool,
}

impl WaitRegistration<'_> {
    fn release(&mut self, state: &mut DistributorState) {
        if self.active {
            state.waiting = state.waiting.saturating_sub(1);
            self.active = false;
        }
    }
}

impl Drop for WaitRegistration<'_> {
    fn drop(&mut self) {
        if self.active {
            let mut state = self.distributor.lock();
            state.waiting = state.waiting.saturating_sub(1);
        }
    }
}
