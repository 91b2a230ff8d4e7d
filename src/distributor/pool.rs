//! Bounded replay pool

use rand::Rng;
use std::collections::VecDeque;

use crate::types::Clip;

/// Default number of recent clips kept for replay
pub const DEFAULT_REPLAY_CAPACITY: usize = 8;

/// Ring of the most recently published clips
///
/// Oldest entries are evicted first. Sampling is uniform so idle viewers do
/// not replay in lock-step.
#[derive(Debug)]
pub struct ReplayPool {
    clips: VecDeque<Clip>,
    capacity: usize,
}

impl ReplayPool {
    /// Create a pool; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { clips: VecDeque::with_capacity(capacity), capacity }
    }

    /// Insert a clip, returning the evicted entry if the pool was full
    pub fn insert(&mut self, clip: Clip) -> Option<Clip> {
        let evicted = if self.clips.len() >= self.capacity { self.clips.pop_front() } else { None };
        self.clips.push_back(clip);
        evicted
    }

    /// Pick a uniformly random clip
    pub fn sample(&self) -> Option<Clip> {
        if self.clips.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.clips.len());
        self.clips.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clips oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }
}
