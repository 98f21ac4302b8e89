//! Per-poster counters.

use crate::mode::ExecutionMode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for one poster.
#[derive(Debug, Default)]
pub struct PosterMetrics {
    posted: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
}

impl PosterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_posted(&self) {
        self.posted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Undo a `record_posted` for a task that never got queued.
    pub(crate) fn revert_posted(&self) {
        self.posted.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, mode: ExecutionMode) -> PosterSnapshot {
        PosterSnapshot {
            mode,
            posted: self.posted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.posted.store(0, Ordering::Relaxed);
        self.executed.store(0, Ordering::Relaxed);
        self.panicked.store(0, Ordering::Relaxed);
        self.discarded.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of one poster's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosterSnapshot {
    pub mode: ExecutionMode,
    pub posted: u64,
    /// Tasks that ran to completion.
    pub executed: u64,
    pub panicked: u64,
    /// Tasks dropped by a clear before they started.
    pub discarded: u64,
}

impl PosterSnapshot {
    /// Tasks posted but not yet finished, panicked or discarded.
    pub fn in_flight(&self) -> u64 {
        self.posted
            .saturating_sub(self.executed + self.panicked + self.discarded)
    }
}

/// Counters of every poster owned by a dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherStats {
    pub timestamp: Instant,
    pub uptime: Duration,
    pub immediate: PosterSnapshot,
    pub background: PosterSnapshot,
    pub main: PosterSnapshot,
    pub asynchronous: PosterSnapshot,
}

impl DispatcherStats {
    pub fn get(&self, mode: ExecutionMode) -> Option<&PosterSnapshot> {
        match mode {
            ExecutionMode::Immediate => Some(&self.immediate),
            ExecutionMode::Background => Some(&self.background),
            ExecutionMode::Main => Some(&self.main),
            ExecutionMode::Async => Some(&self.asynchronous),
            ExecutionMode::Unspecified => None,
        }
    }

    pub fn total_executed(&self) -> u64 {
        self.posters().map(|s| s.executed).sum()
    }

    pub fn total_panicked(&self) -> u64 {
        self.posters().map(|s| s.panicked).sum()
    }

    fn posters(&self) -> impl Iterator<Item = &PosterSnapshot> {
        [&self.immediate, &self.background, &self.main, &self.asynchronous].into_iter()
    }
}
